mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{get, TestApp};
use libris::config::Config;
use libris::domain::{BookFilter, KeyMatch, NewBook, NewLibrary};
use libris::models::Role;

const FIVE_ROWS: &str = "\
title,author,isbn,published_year
Dune,Frank Herbert,9780441013593,1965
Neuromancer,William Gibson,9780441569595,1984
Hyperion,Dan Simmons,9780553283686,nineteen eighty-nine
Foundation,Isaac Asimov,9780553293357,1951
The Hobbit,J.R.R. Tolkien,9780547928227,1937
";

async fn seed_hobbit(app: &TestApp) -> i32 {
    app.state
        .book_repo
        .create(NewBook {
            title: "The Hobbit".to_string(),
            author: "J.R.R. Tolkien".to_string(),
            isbn: "9780547928227".to_string(),
            published_year: Some(1937),
            description: None,
            owner_id: None,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_five_row_scenario() {
    let app = TestApp::new().await;
    let (_, token) = app.admin().await;
    let existing = seed_hobbit(&app).await;

    let (status, report) = app
        .upload("/api/admin/import/books", &token, "books.csv", FIVE_ROWS.as_bytes())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        report,
        json!({
            "total": 5,
            "accepted": 3,
            "rejected": [{ "row": 3, "reasons": ["published_year must be integer"] }],
            "duplicates": [{ "row": 5, "matched_existing_id": existing }]
        })
    );
    assert_eq!(app.state.book_repo.count().await.unwrap(), 4);

    let titles: Vec<String> = app
        .state
        .book_repo
        .find_all(BookFilter::default())
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.title)
        .collect();
    assert!(titles.contains(&"Dune".to_string()));
    assert!(!titles.contains(&"Hyperion".to_string()));
}

#[tokio::test]
async fn test_reimport_creates_nothing_and_rejects_the_same_rows() {
    let app = TestApp::new().await;
    let (_, token) = app.admin().await;

    let (_, first) = app
        .upload("/api/admin/import/books", &token, "books.csv", FIVE_ROWS.as_bytes())
        .await;
    let count = app.state.book_repo.count().await.unwrap();
    let (status, second) = app
        .upload("/api/admin/import/books", &token, "books.csv", FIVE_ROWS.as_bytes())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["accepted"], 4);
    assert_eq!(second["accepted"], 0);
    assert_eq!(second["rejected"], first["rejected"]);
    assert_eq!(second["duplicates"].as_array().unwrap().len(), 4);
    assert_eq!(app.state.book_repo.count().await.unwrap(), count);
}

#[tokio::test]
async fn test_bad_rows_do_not_block_good_ones() {
    let app = TestApp::new().await;
    let (_, token) = app.admin().await;
    let csv = "\
email,username,role,is_active
ada@example.com,ada,member,true
not-an-email,bob,member,true
carol@example.com,carol,librarian,yes
dave@example.com,,member,no
erin@example.com,erin,admin,0
ADA@example.com,ada2,member,true
frank@example.com,erin,member,true
";

    let (status, report) = app
        .upload("/api/admin/import/users", &token, "users.csv", csv.as_bytes())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["total"], 7);
    assert_eq!(report["accepted"], 2);

    let rejected = report["rejected"].as_array().unwrap();
    let rows: Vec<u64> = rejected.iter().map(|r| r["row"].as_u64().unwrap()).collect();
    assert_eq!(rows, vec![2, 3, 4, 6, 7]);
    assert_eq!(
        rejected[0]["reasons"],
        json!(["email must be a valid email address"])
    );
    assert_eq!(
        rejected[1]["reasons"],
        json!(["role must be one of: admin, member"])
    );
    assert_eq!(rejected[2]["reasons"], json!(["username is required"]));

    // admin + ada + erin
    assert_eq!(app.state.user_repo.count().await.unwrap(), 3);
    let erin = app
        .state
        .user_repo
        .find_by_email("erin@example.com", KeyMatch::Exact)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(erin.role, Role::Admin.as_str());
    assert!(!erin.is_active);
}

#[tokio::test]
async fn test_missing_required_columns_is_a_schema_error() {
    let app = TestApp::new().await;
    let (_, token) = app.admin().await;

    let (status, body) = app
        .upload(
            "/api/admin/import/books",
            &token,
            "books.csv",
            b"title,published_year\nDune,1965\n",
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "SCHEMA_ERROR");
    assert_eq!(
        body["error"]["details"]["missing_columns"],
        json!(["author", "isbn"])
    );
    assert_eq!(app.state.book_repo.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_headers_are_matched_loosely() {
    let app = TestApp::new().await;
    let (_, token) = app.admin().await;
    let csv = "\u{feff} Title ,AUTHOR,Isbn,Published Year,notes\nDune,Frank Herbert,9780441013593,1965,signed\n";

    let (status, report) = app
        .upload("/api/admin/import/books", &token, "books.csv", csv.as_bytes())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["accepted"], 1);
}

#[tokio::test]
async fn test_unsupported_file_type_is_refused() {
    let app = TestApp::new().await;
    let (_, token) = app.admin().await;

    let (status, body) = app
        .upload("/api/admin/import/books", &token, "books.pdf", b"%PDF-1.4")
        .await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"]["code"], "UNSUPPORTED_FILE_TYPE");
}

#[tokio::test]
async fn test_unknown_entity_is_not_found() {
    let app = TestApp::new().await;
    let (_, token) = app.admin().await;

    let (status, _) = app
        .upload("/api/admin/import/authors", &token, "a.csv", b"name\nX\n")
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_members_cannot_import() {
    let app = TestApp::new().await;
    let (_, token) = app.member().await;

    let (status, body) = app
        .upload("/api/admin/import/books", &token, "books.csv", FIVE_ROWS.as_bytes())
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    assert_eq!(app.state.book_repo.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_filled_template_imports() {
    let app = TestApp::new().await;
    let (_, token) = app.admin().await;

    let (status, template, disposition) = app
        .send(get("/api/admin/import/template/libraries?example=true", &token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(disposition.unwrap().contains("libraries_import_template.xlsx"));

    let (status, report) = app
        .upload("/api/admin/import/libraries", &token, "libraries.xlsx", &template)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["total"], 1);
    assert_eq!(report["accepted"], 1);
    assert_eq!(app.state.library_repo.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_oversized_upload_is_refused() {
    let mut config = libris::config::Config::default();
    config.max_upload_bytes = 64;
    let app = TestApp::with_config(config).await;
    let (_, token) = app.admin().await;

    let (status, body) = app
        .upload("/api/admin/import/books", &token, "books.csv", FIVE_ROWS.as_bytes())
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn test_accented_capitals_are_still_duplicates() {
    let app = TestApp::new().await;
    let (_, token) = app.admin().await;
    let existing = app
        .state
        .library_repo
        .create(NewLibrary {
            name: "Bibliothèque ÉTOILE".to_string(),
            address: "1 Rue de l'Été".to_string(),
            description: None,
            owner_id: None,
        })
        .await
        .unwrap();
    let csv = "name,address\nbibliothèque étoile,1 rue de l'été\n";

    let (status, report) = app
        .upload("/api/admin/import/libraries", &token, "libraries.csv", csv.as_bytes())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["accepted"], 0);
    assert_eq!(
        report["duplicates"],
        json!([{ "row": 1, "matched_existing_id": existing.id }])
    );
    assert_eq!(app.state.library_repo.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_blank_lines_in_csv_keep_file_row_numbers() {
    let app = TestApp::new().await;
    let (_, token) = app.admin().await;
    let csv = "name,address\nA,1 Road\n\n\n,2 Road\n";

    let (status, report) = app
        .upload("/api/admin/import/libraries", &token, "libraries.csv", csv.as_bytes())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["total"], 2);
    assert_eq!(report["rejected"][0]["row"], 4);
}

#[tokio::test]
async fn test_exact_matching_still_treats_accounts_case_insensitively() {
    let app = TestApp::with_config(Config {
        duplicate_matching: KeyMatch::Exact,
        ..Config::default()
    })
    .await;
    let (admin, token) = app.admin().await;
    app.state
        .book_repo
        .create(NewBook {
            title: "Proof".to_string(),
            author: "Printer".to_string(),
            isbn: "isbn-abc".to_string(),
            published_year: None,
            description: None,
            owner_id: None,
        })
        .await
        .unwrap();

    let (status, report) = app
        .upload(
            "/api/admin/import/books",
            &token,
            "books.csv",
            b"title,author,isbn\nProof,Printer,ISBN-ABC\n",
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["accepted"], 1);

    let (status, report) = app
        .upload(
            "/api/admin/import/users",
            &token,
            "users.csv",
            b"email,username\nADMIN@example.com,someone\n",
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["accepted"], 0);
    assert_eq!(
        report["duplicates"],
        json!([{ "row": 1, "matched_existing_id": admin.id }])
    );
    assert_eq!(app.state.user_repo.count().await.unwrap(), 1);
}
