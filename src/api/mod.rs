pub mod auth;
pub mod books;
pub mod error;
pub mod export;
pub mod health;
pub mod import;
pub mod jobs;
pub mod library;
pub mod user;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::infrastructure::AppState;

pub fn api_router(state: AppState) -> Router {
    // Reading the upload is also time-limited, inside the handler
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me).put(auth::update_profile))
        .route("/auth/me/password", put(auth::change_password))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route(
            "/books/:id/libraries/:library_id",
            post(books::assign_library).delete(books::unassign_library),
        )
        // Libraries
        .route(
            "/libraries",
            get(library::list_libraries).post(library::create_library),
        )
        .route(
            "/libraries/:id",
            get(library::get_library)
                .put(library::update_library)
                .delete(library::delete_library),
        )
        .route("/libraries/:id/books", get(library::library_books))
        // Users (admin)
        .route("/users", get(user::list_users))
        .route("/users/:id", axum::routing::delete(user::delete_user))
        // Import / export (admin)
        .route(
            "/admin/import/:kind",
            post(import::import_file).layer(upload_limit),
        )
        .route(
            "/admin/import/template/:kind",
            get(import::import_template),
        )
        .route("/admin/export/:target", get(export::export_records))
        // Own records (any user)
        .route("/user/export/:what", get(export::export_own))
        // Jobs
        .route("/admin/jobs", get(jobs::list_jobs).post(jobs::submit_job))
        .route("/admin/jobs/:id/cancel", post(jobs::cancel_job))
        .route("/jobs/:id", get(jobs::job_status))
        .route("/jobs/:id/download", get(jobs::download_export))
        .with_state(state)
}
