//! Background jobs
//!
//! Long-running imports, exports and catalog maintenance run outside the
//! request path. Status lives in the `jobs` table; payloads travel over an
//! in-process queue to a bounded worker pool.

pub mod dispatcher;
pub mod maintenance;
pub mod worker;

pub use dispatcher::{JobDispatcher, JobError, JobSpec, CANCELLED_BY_OPERATOR};
pub use maintenance::{
    purge_expired, recover_interrupted, spawn_maintenance, INTERRUPTED_BY_RESTART,
};
pub use worker::JobContext;
