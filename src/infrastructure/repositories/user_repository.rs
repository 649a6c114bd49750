//! SeaORM implementation of UserRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};

use super::{key_eq, BULK_CHUNK};
use crate::domain::{
    fold_key, DomainError, KeyMatch, NewUser, ProfileUpdate, UserFilter, UserRepository,
};
use crate::models::User;
use crate::models::user::{ActiveModel, Column, Entity as UserEntity};

/// SeaORM-based implementation of UserRepository
pub struct SeaOrmUserRepository {
    db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_model(&self, id: i32) -> Result<ActiveModel, DomainError> {
        Ok(UserEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound)?
            .into())
    }
}

fn active_model(input: NewUser, now: &str) -> ActiveModel {
    ActiveModel {
        email_key: Set(fold_key(&input.email)),
        email: Set(input.email),
        username_key: Set(fold_key(&input.username)),
        username: Set(input.username),
        password_hash: Set(input.password_hash),
        full_name: Set(input.full_name),
        role: Set(input.role),
        is_active: Set(input.is_active),
        is_verified: Set(input.is_verified),
        created_at: Set(now.to_string()),
        updated_at: Set(now.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn find_all(&self, filter: UserFilter) -> Result<Vec<User>, DomainError> {
        let mut query = UserEntity::find();

        if let Some(role) = &filter.role
            && !role.is_empty()
        {
            query = query.filter(Column::Role.eq(role));
        }

        if let Some(active) = filter.active {
            query = query.filter(Column::IsActive.eq(active));
        }

        query = query.order_by_asc(Column::Id);
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        let users = query.all(&self.db).await?;
        Ok(users.into_iter().map(User::from).collect())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, DomainError> {
        let user = UserEntity::find_by_id(id).one(&self.db).await?;
        Ok(user.map(User::from))
    }

    async fn find_by_email(
        &self,
        email: &str,
        matching: KeyMatch,
    ) -> Result<Option<User>, DomainError> {
        let user = UserEntity::find()
            .filter(key_eq(Column::Email, Column::EmailKey, email, matching))
            .one(&self.db)
            .await?;
        Ok(user.map(User::from))
    }

    async fn find_by_username(
        &self,
        username: &str,
        matching: KeyMatch,
    ) -> Result<Option<User>, DomainError> {
        let user = UserEntity::find()
            .filter(key_eq(Column::Username, Column::UsernameKey, username, matching))
            .one(&self.db)
            .await?;
        Ok(user.map(User::from))
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<(User, String)>, DomainError> {
        let user = UserEntity::find()
            .filter(key_eq(Column::Email, Column::EmailKey, email, KeyMatch::CaseInsensitive))
            .one(&self.db)
            .await?;

        Ok(user.map(|model| {
            let hash = model.password_hash.clone();
            (User::from(model), hash)
        }))
    }

    async fn create(&self, input: NewUser) -> Result<User, DomainError> {
        let now = chrono::Utc::now().to_rfc3339();
        let user = active_model(input, &now).insert(&self.db).await?;
        Ok(User::from(user))
    }

    async fn bulk_create(&self, inputs: Vec<NewUser>) -> Result<u64, DomainError> {
        if inputs.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().to_rfc3339();
        let models: Vec<ActiveModel> = inputs
            .into_iter()
            .map(|input| active_model(input, &now))
            .collect();

        let txn = self.db.begin().await?;
        let mut inserted = 0;
        for chunk in models.chunks(BULK_CHUNK) {
            inserted += UserEntity::insert_many(chunk.to_vec())
                .exec_without_returning(&txn)
                .await?;
        }
        txn.commit().await?;

        Ok(inserted)
    }

    async fn update_profile(&self, id: i32, changes: ProfileUpdate) -> Result<User, DomainError> {
        let mut user = self.find_model(id).await?;

        if let Some(email) = changes.email {
            user.email_key = Set(fold_key(&email));
            user.email = Set(email);
        }
        if let Some(username) = changes.username {
            user.username_key = Set(fold_key(&username));
            user.username = Set(username);
        }
        if let Some(full_name) = changes.full_name {
            user.full_name = Set(Some(full_name).filter(|n| !n.trim().is_empty()));
        }
        user.updated_at = Set(chrono::Utc::now().to_rfc3339());

        Ok(User::from(user.update(&self.db).await?))
    }

    async fn update_password(&self, id: i32, password_hash: String) -> Result<(), DomainError> {
        let mut user = self.find_model(id).await?;
        user.password_hash = Set(password_hash);
        user.updated_at = Set(chrono::Utc::now().to_rfc3339());
        user.update(&self.db).await?;
        Ok(())
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let result = UserEntity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound);
        }

        Ok(())
    }

    async fn count(&self) -> Result<u64, DomainError> {
        Ok(UserEntity::find().count(&self.db).await?)
    }

    async fn count_active(&self) -> Result<u64, DomainError> {
        Ok(UserEntity::find()
            .filter(Column::IsActive.eq(true))
            .count(&self.db)
            .await?)
    }

    async fn count_verified(&self) -> Result<u64, DomainError> {
        Ok(UserEntity::find()
            .filter(Column::IsVerified.eq(true))
            .count(&self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::init_db;

    fn user(email: &str, username: &str, active: bool) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "x".to_string(),
            full_name: None,
            role: "member".to_string(),
            is_active: active,
            is_verified: false,
        }
    }

    #[tokio::test]
    async fn test_counts_and_lookups() {
        let db = init_db("sqlite::memory:").await.unwrap();
        let repo = SeaOrmUserRepository::new(db);

        repo.bulk_create(vec![
            user("ann@example.com", "ann", true),
            user("bob@example.com", "bob", false),
        ])
        .await
        .unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(repo.count_active().await.unwrap(), 1);
        assert_eq!(repo.count_verified().await.unwrap(), 0);

        let ann = repo
            .find_by_email("ANN@example.com", KeyMatch::CaseInsensitive)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ann.username, "ann");

        let (bob, hash) = repo.find_credentials("bob@example.com").await.unwrap().unwrap();
        assert_eq!(bob.username, "bob");
        assert_eq!(hash, "x");
    }

    #[tokio::test]
    async fn test_profile_and_password_updates() {
        let db = init_db("sqlite::memory:").await.unwrap();
        let repo = SeaOrmUserRepository::new(db);
        let ann = repo.create(user("ann@example.com", "ann", true)).await.unwrap();

        let updated = repo
            .update_profile(
                ann.id,
                ProfileUpdate {
                    email: Some("Ännie@Example.com".to_string()),
                    full_name: Some("Ann Example".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.username, "ann");
        assert_eq!(updated.full_name.as_deref(), Some("Ann Example"));
        assert!(repo
            .find_by_email("ännie@example.com", KeyMatch::CaseInsensitive)
            .await
            .unwrap()
            .is_some());

        repo.update_password(ann.id, "new-hash".to_string()).await.unwrap();
        let (_, hash) = repo
            .find_credentials("ännie@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hash, "new-hash");
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let db = init_db("sqlite::memory:").await.unwrap();
        let repo = SeaOrmUserRepository::new(db);

        repo.create(user("a@example.com", "same", true)).await.unwrap();
        let err = repo
            .create(user("b@example.com", "same", true))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_accounts_differing_only_in_case_conflict() {
        let db = init_db("sqlite::memory:").await.unwrap();
        let repo = SeaOrmUserRepository::new(db);

        repo.create(user("zoë@example.com", "zoë", true)).await.unwrap();

        let err = repo
            .create(user("ZOË@example.com", "other", true))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        let err = repo
            .create(user("else@example.com", "ZOË", true))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
