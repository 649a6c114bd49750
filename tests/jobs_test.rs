mod common;

use axum::http::StatusCode;
use serde_json::json;
use tempfile::TempDir;

use common::{get, post_json, TestApp};
use libris::config::Config;
use libris::domain::{NewBook, NewLibrary};
use libris::jobs::{purge_expired, recover_interrupted, INTERRUPTED_BY_RESTART};
use libris::models::JobStatus;

async fn app_with_export_dir() -> (TestApp, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = Config {
        export_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    (TestApp::with_config(config).await, dir)
}

#[tokio::test]
async fn test_async_import_reports_through_the_job() {
    let (app, _dir) = app_with_export_dir().await;
    let (_, token) = app.admin().await;
    let csv = "title,author,isbn,published_year\nDune,Frank Herbert,9780441013593,1965\nBad,Nobody,123,soon\n";

    let (status, accepted) = app
        .upload("/api/admin/import/books?mode=async", &token, "books.csv", csv.as_bytes())
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(accepted["status"], "pending");
    let job_id = accepted["job_id"].as_str().unwrap().to_string();

    let job = app.wait_for_job(&job_id, &token).await;
    assert_eq!(job["status"], "succeeded");
    assert_eq!(job["kind"], "import");
    assert_eq!(job["target"], "books");
    assert_eq!(job["result"]["accepted"], 1);
    assert_eq!(
        job["result"]["rejected"],
        json!([{ "row": 2, "reasons": ["published_year must be integer"] }])
    );
    assert_eq!(app.state.book_repo.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_large_files_go_to_the_background_automatically() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        export_dir: dir.path().to_path_buf(),
        async_import_row_threshold: 2,
        ..Config::default()
    };
    let app = TestApp::with_config(config).await;
    let (_, token) = app.admin().await;
    let csv = "name,address\nA,1 Road\nB,2 Road\nC,3 Road\n";

    let (status, body) = app
        .upload("/api/admin/import/libraries", &token, "libraries.csv", csv.as_bytes())
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let job = app
        .wait_for_job(body["job_id"].as_str().unwrap(), &token)
        .await;
    assert_eq!(job["result"]["accepted"], 3);

    let (status, report) = app
        .upload("/api/admin/import/libraries?mode=sync", &token, "libraries.csv", csv.as_bytes())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["duplicates"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_schema_errors_are_reported_before_queueing() {
    let (app, _dir) = app_with_export_dir().await;
    let (_, token) = app.admin().await;

    let (status, body) = app
        .upload("/api/admin/import/books?mode=async", &token, "books.csv", b"title\nDune\n")
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "SCHEMA_ERROR");
    assert!(app.state.jobs.list(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_export_job_produces_a_downloadable_file() {
    let (app, dir) = app_with_export_dir().await;
    let (_, token) = app.admin().await;

    let (status, body) = app
        .json(post_json(
            "/api/admin/jobs",
            Some(&token),
            json!({ "kind": "export", "target": "users", "format": "csv" }),
        ))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let job = app.wait_for_job(&job_id, &token).await;
    assert_eq!(job["status"], "succeeded");
    assert_eq!(job["target"], "users.csv");
    assert!(dir.path().join(format!("{}.csv", job_id)).exists());

    let (status, file, disposition) = app
        .send(get(&format!("/api/jobs/{}/download", job_id), &token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(disposition.unwrap().contains("users_"));
    assert!(String::from_utf8(file).unwrap().contains("admin@example.com"));
}

#[tokio::test]
async fn test_statistics_and_health_check_jobs() {
    let (app, _dir) = app_with_export_dir().await;
    let (_, token) = app.admin().await;

    let (_, stats) = app
        .json(post_json("/api/admin/jobs", Some(&token), json!({ "kind": "statistics" })))
        .await;
    let (_, health) = app
        .json(post_json("/api/admin/jobs", Some(&token), json!({ "kind": "health_check" })))
        .await;

    let stats = app
        .wait_for_job(stats["job_id"].as_str().unwrap(), &token)
        .await;
    assert_eq!(stats["status"], "succeeded");
    assert_eq!(stats["result"]["total_users"], 1);
    assert_eq!(stats["result"]["total_books"], 0);

    let health = app
        .wait_for_job(health["job_id"].as_str().unwrap(), &token)
        .await;
    assert_eq!(health["status"], "succeeded");
    assert_eq!(health["result"]["store"], "ok");

    let (status, listing) = app.json(get("/api/admin/jobs", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["jobs"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_finished_jobs_cannot_be_cancelled() {
    let (app, _dir) = app_with_export_dir().await;
    let (_, token) = app.admin().await;

    let (_, body) = app
        .json(post_json("/api/admin/jobs", Some(&token), json!({ "kind": "statistics" })))
        .await;
    let job_id = body["job_id"].as_str().unwrap().to_string();
    app.wait_for_job(&job_id, &token).await;

    let (status, body) = app
        .json(post_json(&format!("/api/admin/jobs/{}/cancel", job_id), Some(&token), json!({})))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "JOB_FINISHED");
}

#[tokio::test]
async fn test_cancelled_job_ends_failed() {
    let (app, _dir) = app_with_export_dir().await;
    let (admin, _) = app.admin().await;

    // Nothing consumes a job recorded straight in the store
    let id = uuid::Uuid::new_v4();
    app.state
        .job_repo
        .create(libris::domain::NewJob {
            id,
            kind: "statistics".to_string(),
            target: "catalog".to_string(),
            submitted_by: Some(admin.id),
        })
        .await
        .unwrap();

    let record = app.state.jobs.cancel(id).await.unwrap();

    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.error.as_deref(), Some(libris::jobs::CANCELLED_BY_OPERATOR));
    assert!(record.finished_at.is_some());
}

#[tokio::test]
async fn test_members_see_only_their_own_jobs() {
    let (app, _dir) = app_with_export_dir().await;
    let (_, admin_token) = app.admin().await;
    let (_, member_token) = app.member().await;

    let (_, body) = app
        .json(post_json("/api/admin/jobs", Some(&admin_token), json!({ "kind": "statistics" })))
        .await;
    let job_id = body["job_id"].as_str().unwrap();

    let (status, _) = app
        .json(get(&format!("/api/jobs/{}", job_id), &member_token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json(post_json("/api/admin/jobs", Some(&member_token), json!({ "kind": "statistics" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_restart_recovery_and_purge() {
    let (app, dir) = app_with_export_dir().await;
    let (_, token) = app.admin().await;

    let stale = uuid::Uuid::new_v4();
    app.state
        .job_repo
        .create(libris::domain::NewJob {
            id: stale,
            kind: "import".to_string(),
            target: "books".to_string(),
            submitted_by: None,
        })
        .await
        .unwrap();
    assert_eq!(recover_interrupted(app.state.job_repo.as_ref()).await.unwrap(), 1);
    let record = app.state.jobs.status(stale).await.unwrap();
    assert_eq!(record.error.as_deref(), Some(INTERRUPTED_BY_RESTART));

    let (_, body) = app
        .json(post_json(
            "/api/admin/jobs",
            Some(&token),
            json!({ "kind": "export", "target": "books" }),
        ))
        .await;
    let export_id = body["job_id"].as_str().unwrap().to_string();
    app.wait_for_job(&export_id, &token).await;
    let file = dir.path().join(format!("{}.xlsx", export_id));
    assert!(file.exists());

    // Zero retention expires everything already finished
    let purged = purge_expired(app.state.job_repo.as_ref(), chrono::Duration::zero())
        .await
        .unwrap();

    assert_eq!(purged, 2);
    assert!(!file.exists());
    assert!(app.state.jobs.list(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_library_report_job_lists_holdings() {
    let (app, _dir) = app_with_export_dir().await;
    let (_, token) = app.admin().await;
    let library = app
        .state
        .library_repo
        .create(NewLibrary {
            name: "Central".to_string(),
            address: "1 Main Street".to_string(),
            description: None,
            owner_id: None,
        })
        .await
        .unwrap();
    let book = app
        .state
        .book_repo
        .create(NewBook {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: "9780441013593".to_string(),
            published_year: Some(1965),
            description: None,
            owner_id: None,
        })
        .await
        .unwrap();
    app.state
        .book_repo
        .assign_library(book.id, library.id)
        .await
        .unwrap();

    let (status, body) = app
        .json(post_json(
            "/api/admin/jobs",
            Some(&token),
            json!({ "kind": "library_report", "library_id": library.id }),
        ))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let job = app
        .wait_for_job(body["job_id"].as_str().unwrap(), &token)
        .await;
    assert_eq!(job["status"], "succeeded");
    assert_eq!(job["kind"], "library_report");
    assert_eq!(job["target"], format!("library:{}", library.id));
    assert_eq!(job["result"]["library_name"], "Central");
    assert_eq!(job["result"]["total_books"], 1);
    assert_eq!(
        job["result"]["books"],
        json!([{ "id": book.id, "title": "Dune", "author": "Frank Herbert" }])
    );

    let (status, body) = app
        .json(post_json(
            "/api/admin/jobs",
            Some(&token),
            json!({ "kind": "library_report", "library_id": 9999 }),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Library not found");
}
