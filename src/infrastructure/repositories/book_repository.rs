//! SeaORM implementation of BookRepository

use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use super::{key_eq, BULK_CHUNK};
use crate::domain::{
    fold_key, BookFilter, BookRepository, BookUpdate, DomainError, KeyMatch, NewBook,
};
use crate::models::book::{ActiveModel, Column, Entity as BookEntity};
use crate::models::book_library::{self, Entity as BookLibraryEntity};
use crate::models::library::Entity as LibraryEntity;
use crate::models::{Book, Library};

/// SeaORM-based implementation of BookRepository
pub struct SeaOrmBookRepository {
    db: DatabaseConnection,
}

impl SeaOrmBookRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn active_model(input: NewBook, now: &str) -> ActiveModel {
    ActiveModel {
        title: Set(input.title),
        author: Set(input.author),
        isbn_key: Set(fold_key(&input.isbn)),
        isbn: Set(input.isbn),
        published_year: Set(input.published_year),
        description: Set(input.description),
        owner_id: Set(input.owner_id),
        created_at: Set(now.to_string()),
        updated_at: Set(now.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl BookRepository for SeaOrmBookRepository {
    async fn find_all(&self, filter: BookFilter) -> Result<Vec<Book>, DomainError> {
        let mut query = BookEntity::find();

        if let Some(title) = &filter.title
            && !title.is_empty()
        {
            query = query.filter(Column::Title.contains(title));
        }

        if let Some(author) = &filter.author
            && !author.is_empty()
        {
            query = query.filter(Column::Author.contains(author));
        }

        if let Some(owner_id) = filter.owner_id {
            query = query.filter(Column::OwnerId.eq(owner_id));
        }

        query = query.order_by_asc(Column::Id);
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        let books = query.all(&self.db).await?;
        Ok(books.into_iter().map(Book::from).collect())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Book>, DomainError> {
        let book = BookEntity::find_by_id(id).one(&self.db).await?;
        Ok(book.map(Book::from))
    }

    async fn find_by_isbn(
        &self,
        isbn: &str,
        matching: KeyMatch,
    ) -> Result<Option<Book>, DomainError> {
        let book = BookEntity::find()
            .filter(key_eq(Column::Isbn, Column::IsbnKey, isbn, matching))
            .one(&self.db)
            .await?;
        Ok(book.map(Book::from))
    }

    async fn create(&self, input: NewBook) -> Result<Book, DomainError> {
        let now = chrono::Utc::now().to_rfc3339();
        let book = active_model(input, &now).insert(&self.db).await?;
        Ok(Book::from(book))
    }

    async fn bulk_create(&self, inputs: Vec<NewBook>) -> Result<u64, DomainError> {
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
            inserted += BookEntity::insert_many(chunk.to_vec())
                .exec_without_returning(&txn)
                .await?;
        }
        txn.commit().await?;

        Ok(inserted)
    }

    async fn update(&self, id: i32, changes: BookUpdate) -> Result<Book, DomainError> {
        let mut book: ActiveModel = BookEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound)?
            .into();

        if let Some(title) = changes.title {
            book.title = Set(title);
        }
        if let Some(author) = changes.author {
            book.author = Set(author);
        }
        if let Some(isbn) = changes.isbn {
            book.isbn_key = Set(fold_key(&isbn));
            book.isbn = Set(isbn);
        }
        if let Some(year) = changes.published_year {
            book.published_year = Set(Some(year));
        }
        if let Some(description) = changes.description {
            book.description = Set(Some(description));
        }
        book.updated_at = Set(chrono::Utc::now().to_rfc3339());

        Ok(Book::from(book.update(&self.db).await?))
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let result = BookEntity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound);
        }

        Ok(())
    }

    async fn count(&self) -> Result<u64, DomainError> {
        Ok(BookEntity::find().count(&self.db).await?)
    }

    async fn assign_library(&self, book_id: i32, library_id: i32) -> Result<(), DomainError> {
        if BookEntity::find_by_id(book_id).one(&self.db).await?.is_none()
            || LibraryEntity::find_by_id(library_id)
                .one(&self.db)
                .await?
                .is_none()
        {
            return Err(DomainError::NotFound);
        }

        let link = book_library::ActiveModel {
            book_id: Set(book_id),
            library_id: Set(library_id),
            assigned_at: Set(chrono::Utc::now().to_rfc3339()),
        };

        // Assigning twice is a no-op
        BookLibraryEntity::insert(link)
            .on_conflict(
                OnConflict::columns([
                    book_library::Column::BookId,
                    book_library::Column::LibraryId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }

    async fn unassign_library(&self, book_id: i32, library_id: i32) -> Result<(), DomainError> {
        let result = BookLibraryEntity::delete_many()
            .filter(book_library::Column::BookId.eq(book_id))
            .filter(book_library::Column::LibraryId.eq(library_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound);
        }

        Ok(())
    }

    async fn libraries_of(&self, book_id: i32) -> Result<Vec<Library>, DomainError> {
        let book = BookEntity::find_by_id(book_id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound)?;

        let libraries = book.find_related(LibraryEntity).all(&self.db).await?;
        Ok(libraries.into_iter().map(Library::from).collect())
    }

    async fn count_links(&self) -> Result<u64, DomainError> {
        Ok(BookLibraryEntity::find().count(&self.db).await?)
    }
}
