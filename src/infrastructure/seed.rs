use crate::auth::hash_password;
use crate::domain::{DomainError, KeyMatch, NewBook, NewLibrary, NewUser};
use crate::infrastructure::AppState;
use crate::models::Role;

/// Demo catalog for local development. Does nothing once any user exists.
pub async fn seed_demo_data(state: &AppState) -> Result<(), DomainError> {
    if state.user_repo.count().await? > 0 {
        tracing::debug!("Users present, skipping demo data");
        return Ok(());
    }

    let demo_user = |email: &str, username: &str, password: &str, role: Role| {
        Ok::<_, DomainError>(NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: hash_password(password).map_err(DomainError::Internal)?,
            full_name: None,
            role: role.as_str().to_string(),
            is_active: true,
            is_verified: true,
        })
    };

    let admin = state
        .user_repo
        .create(demo_user("admin@example.com", "admin", "admin1234", Role::Admin)?)
        .await?;
    state
        .user_repo
        .create(demo_user("reader@example.com", "reader", "reader1234", Role::Member)?)
        .await?;

    let central = state
        .library_repo
        .create(NewLibrary {
            name: "Central Library".to_string(),
            address: "1 Main Street".to_string(),
            description: Some("Main branch".to_string()),
            owner_id: Some(admin.id),
        })
        .await?;
    state
        .library_repo
        .create(NewLibrary {
            name: "Riverside Branch".to_string(),
            address: "12 River Road".to_string(),
            description: None,
            owner_id: Some(admin.id),
        })
        .await?;

    let books = [
        ("Dune", "Frank Herbert", "9780441013593", 1965),
        ("Neuromancer", "William Gibson", "9780441569595", 1984),
        ("The Left Hand of Darkness", "Ursula K. Le Guin", "9780441478125", 1969),
    ];
    let inputs = books
        .iter()
        .map(|(title, author, isbn, year)| NewBook {
            title: title.to_string(),
            author: author.to_string(),
            isbn: isbn.to_string(),
            published_year: Some(*year),
            description: None,
            owner_id: Some(admin.id),
        })
        .collect();
    state.book_repo.bulk_create(inputs).await?;

    if let Some(dune) = state
        .book_repo
        .find_by_isbn("9780441013593", KeyMatch::Exact)
        .await?
    {
        state.book_repo.assign_library(dune.id, central.id).await?;
    }

    tracing::info!("Demo data seeded (admin@example.com / admin1234)");
    Ok(())
}
