mod common;

use axum::http::StatusCode;
use calamine::{open_workbook_auto_from_rs, Reader};
use std::io::Cursor;

use common::{get, TestApp};
use libris::models::User;
use libris::domain::{NewBook, NewLibrary};
use libris::models::Role;

async fn seed_catalog(app: &TestApp) {
    for (title, isbn, year) in [
        ("Dune", "9780441013593", Some(1965)),
        ("Neuromancer", "9780441569595", None),
    ] {
        app.state
            .book_repo
            .create(NewBook {
                title: title.to_string(),
                author: "Someone".to_string(),
                isbn: isbn.to_string(),
                published_year: year,
                description: None,
                owner_id: None,
            })
            .await
            .unwrap();
    }
    app.state
        .library_repo
        .create(NewLibrary {
            name: "Central".to_string(),
            address: "1 Main Street".to_string(),
            description: None,
            owner_id: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_members_cannot_export_users() {
    let app = TestApp::new().await;
    let (_, token) = app.member().await;

    let (status, body, disposition) = app
        .send(get("/api/admin/export/users?format=csv", &token))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(disposition.is_none());
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_anonymous_export_is_unauthorized() {
    let app = TestApp::new().await;
    let request = axum::http::Request::builder()
        .uri("/api/admin/export/books")
        .body(axum::body::Body::empty())
        .unwrap();

    let (status, _) = app.json(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_export_has_one_row_per_user_and_no_credentials() {
    let app = TestApp::new().await;
    let (_, token) = app.admin().await;
    app.member().await;
    app.create_user("third@example.com", "third", Role::Member).await;

    let (status, body, disposition) = app
        .send(get("/api/admin/export/users?format=csv", &token))
        .await;

    assert_eq!(status, StatusCode::OK);
    let disposition = disposition.unwrap();
    assert!(disposition.starts_with("attachment; filename=\"users_"));
    assert!(disposition.ends_with(".csv\""));

    let text = String::from_utf8(body).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "email,username,full_name,role,is_active,is_verified");
    assert_eq!(lines.len(), 4);
    assert!(!text.contains("password"));
    assert!(!text.contains("$argon2"));
}

#[tokio::test]
async fn test_export_then_reimport_yields_only_duplicates() {
    let app = TestApp::new().await;
    let (_, token) = app.admin().await;
    seed_catalog(&app).await;

    for (kind, rows) in [("books", 2), ("libraries", 1), ("users", 1)] {
        let (status, file, _) = app
            .send(get(&format!("/api/admin/export/{}", kind), &token))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, report) = app
            .upload(
                &format!("/api/admin/import/{}", kind),
                &token,
                &format!("{}.xlsx", kind),
                &file,
            )
            .await;

        assert_eq!(status, StatusCode::OK, "{}", kind);
        assert_eq!(report["total"], rows, "{}", kind);
        assert_eq!(report["accepted"], 0, "{}", kind);
        assert!(report["rejected"].as_array().unwrap().is_empty(), "{}", kind);
        assert_eq!(report["duplicates"].as_array().unwrap().len(), rows, "{}", kind);
    }

    assert_eq!(app.state.book_repo.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_complete_report_has_statistics_and_entity_sheets() {
    let app = TestApp::new().await;
    let (_, token) = app.admin().await;
    seed_catalog(&app).await;

    let (status, file, disposition) = app
        .send(get("/api/admin/export/complete-report", &token))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(disposition.unwrap().contains("complete-report_"));

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(file)).unwrap();
    assert_eq!(
        workbook.sheet_names(),
        vec!["Statistics", "Books", "Libraries", "Users"]
    );
    let books = workbook.worksheet_range("Books").unwrap();
    assert_eq!(books.height(), 3);
}

#[tokio::test]
async fn test_complete_report_is_xlsx_only() {
    let app = TestApp::new().await;
    let (_, token) = app.admin().await;

    let (status, body) = app
        .json(get("/api/admin/export/complete-report?format=csv", &token))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_templates_follow_the_schema() {
    let app = TestApp::new().await;
    let (_, token) = app.admin().await;

    let (status, file, _) = app
        .send(get("/api/admin/import/template/books", &token))
        .await;
    assert_eq!(status, StatusCode::OK);

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(file)).unwrap();
    let range = workbook.worksheet_range("Books").unwrap();
    let header: Vec<String> = range.rows().next().unwrap().iter().map(|c| c.to_string()).collect();
    assert_eq!(
        header,
        vec!["title", "author", "isbn", "published_year", "description"]
    );
    assert_eq!(range.height(), 1);

    let (_, member_token) = app.member().await;
    let (status, _, _) = app
        .send(get("/api/admin/import/template/books", &member_token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

async fn book_owned_by(app: &TestApp, owner: &User, title: &str, isbn: &str) {
    app.state
        .book_repo
        .create(NewBook {
            title: title.to_string(),
            author: "Someone".to_string(),
            isbn: isbn.to_string(),
            published_year: None,
            description: None,
            owner_id: Some(owner.id),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_members_export_only_their_own_books() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin().await;
    let (member, token) = app.member().await;
    book_owned_by(&app, &member, "Dune", "9780441013593").await;
    book_owned_by(&app, &admin, "Neuromancer", "9780441569595").await;

    let (status, file, disposition) = app
        .send(get("/api/user/export/my-books?format=csv", &token))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(disposition.unwrap().contains("my_books_"));
    let text = String::from_utf8(file).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("title,author,isbn,published_year,description")
    );
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].starts_with("Dune,"));
}

#[tokio::test]
async fn test_my_data_bundles_profile_summary_and_records() {
    let app = TestApp::new().await;
    let (member, token) = app.member().await;
    book_owned_by(&app, &member, "Dune", "9780441013593").await;
    seed_catalog(&app).await;

    let (status, file, disposition) = app.send(get("/api/user/export/my-data", &token)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(disposition.unwrap().contains("my_data_"));
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(file)).unwrap();
    assert_eq!(
        workbook.sheet_names(),
        vec!["My Profile", "Summary", "My Books", "My Libraries"]
    );
    let profile = workbook.worksheet_range("My Profile").unwrap();
    let cells: Vec<String> = profile.rows().flatten().map(|c| c.to_string()).collect();
    assert!(cells.contains(&"reader@example.com".to_string()));
    assert!(!cells.iter().any(|c| c.contains("argon2")));

    assert_eq!(workbook.worksheet_range("My Books").unwrap().height(), 2);
    assert_eq!(workbook.worksheet_range("My Libraries").unwrap().height(), 1);
}

#[tokio::test]
async fn test_user_export_rejects_unknown_names_and_csv_bundles() {
    let app = TestApp::new().await;
    let (_, token) = app.member().await;

    let (status, body) = app
        .json(get("/api/user/export/my-data?format=csv", &token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = app.json(get("/api/user/export/everything", &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
