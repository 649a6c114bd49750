use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;

    Ok(db)
}

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        email_key TEXT NOT NULL,
        username TEXT NOT NULL UNIQUE,
        username_key TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        full_name TEXT,
        role TEXT NOT NULL DEFAULT 'member' CHECK (role IN ('admin', 'member')),
        is_active BOOLEAN NOT NULL DEFAULT 1,
        is_verified BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS books (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        author TEXT NOT NULL,
        isbn TEXT NOT NULL UNIQUE,
        isbn_key TEXT NOT NULL,
        description TEXT,
        published_year INTEGER,
        owner_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS libraries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        name_key TEXT NOT NULL,
        address TEXT NOT NULL,
        address_key TEXT NOT NULL,
        description TEXT,
        owner_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_libraries_name_address ON libraries(name, address)",
    // Folded natural keys for case-insensitive lookups. Account keys are
    // unique; books and libraries may hold case variants in exact mode.
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email_key ON users(email_key)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username_key ON users(username_key)",
    "CREATE INDEX IF NOT EXISTS idx_books_isbn_key ON books(isbn_key)",
    "CREATE INDEX IF NOT EXISTS idx_libraries_keys ON libraries(name_key, address_key)",
    r#"
    CREATE TABLE IF NOT EXISTS book_libraries (
        book_id INTEGER NOT NULL REFERENCES books(id) ON UPDATE CASCADE ON DELETE CASCADE,
        library_id INTEGER NOT NULL REFERENCES libraries(id) ON UPDATE CASCADE ON DELETE CASCADE,
        assigned_at TEXT NOT NULL,
        PRIMARY KEY (book_id, library_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_book_libraries_library ON book_libraries(library_id)",
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY NOT NULL,
        kind TEXT NOT NULL,
        target TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        submitted_by INTEGER,
        result TEXT,
        error TEXT,
        attempts INTEGER NOT NULL DEFAULT 0,
        max_attempts INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        started_at TEXT,
        finished_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at)",
];

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Link rows rely on cascading deletes
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA foreign_keys = ON".to_owned(),
    ))
    .await?;

    for sql in MIGRATIONS {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            sql.to_string(),
        ))
        .await?;
    }

    tracing::debug!("Database migrations applied ({} statements)", MIGRATIONS.len());
    Ok(())
}
