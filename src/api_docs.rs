use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::auth::register,
        api::auth::login,
        api::auth::update_profile,
        api::auth::change_password,
        api::books::list_books,
        api::books::create_book,
        api::books::update_book,
        api::books::delete_book,
        api::import::import_file,
        api::import::import_template,
        api::export::export_records,
        api::export::export_own,
        api::jobs::submit_job,
        api::jobs::cancel_job,
        api::jobs::job_status,
    ),
    tags(
        (name = "libris", description = "Libris catalog API")
    )
)]
pub struct ApiDoc;
