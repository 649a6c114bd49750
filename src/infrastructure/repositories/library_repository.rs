//! SeaORM implementation of LibraryRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use super::{key_eq, BULK_CHUNK};
use crate::domain::{
    fold_key, DomainError, KeyMatch, LibraryFilter, LibraryRepository, LibraryUpdate, NewLibrary,
};
use crate::models::book::Entity as BookEntity;
use crate::models::library::{ActiveModel, Column, Entity as LibraryEntity};
use crate::models::{Book, Library};

/// SeaORM-based implementation of LibraryRepository
pub struct SeaOrmLibraryRepository {
    db: DatabaseConnection,
}

impl SeaOrmLibraryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn active_model(input: NewLibrary, now: &str) -> ActiveModel {
    ActiveModel {
        name_key: Set(fold_key(&input.name)),
        name: Set(input.name),
        address_key: Set(fold_key(&input.address)),
        address: Set(input.address),
        description: Set(input.description),
        owner_id: Set(input.owner_id),
        created_at: Set(now.to_string()),
        updated_at: Set(now.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl LibraryRepository for SeaOrmLibraryRepository {
    async fn find_all(&self, filter: LibraryFilter) -> Result<Vec<Library>, DomainError> {
        let mut query = LibraryEntity::find();

        if let Some(name) = &filter.name
            && !name.is_empty()
        {
            query = query.filter(Column::Name.contains(name));
        }

        if let Some(owner_id) = filter.owner_id {
            query = query.filter(Column::OwnerId.eq(owner_id));
        }

        query = query.order_by_asc(Column::Id);
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        let libraries = query.all(&self.db).await?;
        Ok(libraries.into_iter().map(Library::from).collect())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Library>, DomainError> {
        let library = LibraryEntity::find_by_id(id).one(&self.db).await?;
        Ok(library.map(Library::from))
    }

    async fn find_by_name_and_address(
        &self,
        name: &str,
        address: &str,
        matching: KeyMatch,
    ) -> Result<Option<Library>, DomainError> {
        let library = LibraryEntity::find()
            .filter(key_eq(Column::Name, Column::NameKey, name, matching))
            .filter(key_eq(Column::Address, Column::AddressKey, address, matching))
            .one(&self.db)
            .await?;
        Ok(library.map(Library::from))
    }

    async fn create(&self, input: NewLibrary) -> Result<Library, DomainError> {
        let now = chrono::Utc::now().to_rfc3339();
        let library = active_model(input, &now).insert(&self.db).await?;
        Ok(Library::from(library))
    }

    async fn bulk_create(&self, inputs: Vec<NewLibrary>) -> Result<u64, DomainError> {
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
            inserted += LibraryEntity::insert_many(chunk.to_vec())
                .exec_without_returning(&txn)
                .await?;
        }
        txn.commit().await?;

        Ok(inserted)
    }

    async fn update(&self, id: i32, changes: LibraryUpdate) -> Result<Library, DomainError> {
        let mut library: ActiveModel = LibraryEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound)?
            .into();

        if let Some(name) = changes.name {
            library.name_key = Set(fold_key(&name));
            library.name = Set(name);
        }
        if let Some(address) = changes.address {
            library.address_key = Set(fold_key(&address));
            library.address = Set(address);
        }
        if let Some(description) = changes.description {
            library.description = Set(Some(description));
        }
        library.updated_at = Set(chrono::Utc::now().to_rfc3339());

        Ok(Library::from(library.update(&self.db).await?))
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let result = LibraryEntity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound);
        }

        Ok(())
    }

    async fn count(&self) -> Result<u64, DomainError> {
        Ok(LibraryEntity::find().count(&self.db).await?)
    }

    async fn books_in(&self, library_id: i32) -> Result<Vec<Book>, DomainError> {
        let library = LibraryEntity::find_by_id(library_id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound)?;

        let books = library.find_related(BookEntity).all(&self.db).await?;
        Ok(books.into_iter().map(Book::from).collect())
    }
}
