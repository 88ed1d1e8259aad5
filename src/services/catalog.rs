//! Catalog management service: books, their lifecycle, and categories

use std::collections::HashMap;
use std::sync::Arc;

use validator::Validate;

use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    models::{
        book::{
            check_release_date, AgeFilter, Book, BookDetails, BookQuery, BookSearch, BookState,
            CreateBook, StateChange, UpdateBook,
        },
        category::{BookCategory, CategoryTree, CreateCategory},
        partner::PartnerShort,
        rental::{RentalQuery, RentalState},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    clock: Arc<dyn Clock>,
    default_currency: String,
}

impl CatalogService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>, default_currency: String) -> Self {
        Self {
            repository,
            clock,
            default_currency,
        }
    }

    /// Search books with filters and pagination
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 200);

        let release = match (query.age_op, query.age_days) {
            (Some(op), Some(days)) => {
                Some(AgeFilter { op, days }.to_release_filter(self.clock.today()))
            }
            (None, None) => None,
            _ => {
                return Err(AppError::Validation(
                    "age_op and age_days must be given together".to_string(),
                ))
            }
        };

        let search = BookSearch {
            name: query.name.clone(),
            state: query.state,
            author_id: query.author_id,
            publisher_id: query.publisher_id,
            active_only: !query.include_archived.unwrap_or(false),
            release,
            limit: Some(per_page),
            offset: (page - 1) * per_page,
        };
        self.repository.books.search(&search).await
    }

    /// Every active book, in catalog order
    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        let (books, _) = self.repository.books.search(&BookSearch::all_active()).await?;
        Ok(books)
    }

    /// Active books authored by a party
    pub async fn books_by_author(&self, partner_id: i32) -> AppResult<Vec<Book>> {
        let search = BookSearch {
            author_id: Some(partner_id),
            ..BookSearch::all_active()
        };
        let (books, _) = self.repository.books.search(&search).await?;
        Ok(books)
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Get a book with authors, publisher and computed fields
    pub async fn get_book_details(&self, id: i32) -> AppResult<BookDetails> {
        let book = self.repository.books.get_by_id(id).await?;
        let mut details = self.details(vec![book]).await?;
        details
            .pop()
            .ok_or_else(|| AppError::Internal(format!("Lost details of book {}", id)))
    }

    /// Resolve relations and computed fields for a batch of books
    pub async fn details(&self, books: Vec<Book>) -> AppResult<Vec<BookDetails>> {
        let mut partner_ids: Vec<i32> = books
            .iter()
            .flat_map(|b| b.author_ids.iter().copied().chain(b.publisher_id))
            .collect();
        partner_ids.sort_unstable();
        partner_ids.dedup();

        let partners: HashMap<i32, _> = self
            .repository
            .partners
            .get_many(&partner_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let today = self.clock.today();
        Ok(books
            .into_iter()
            .map(|book| {
                let authors = book
                    .author_ids
                    .iter()
                    .filter_map(|id| partners.get(id))
                    .map(PartnerShort::from)
                    .collect();
                let publisher = book.publisher_id.and_then(|id| partners.get(&id));
                BookDetails {
                    display_name: book.display_name(),
                    age_days: book.age_days(today),
                    authors,
                    publisher: publisher.map(PartnerShort::from),
                    publisher_city: publisher.and_then(|p| p.city.clone()),
                    book,
                }
            })
            .collect())
    }

    /// Create a new book in `draft` state
    pub async fn create_book(&self, mut book: CreateBook) -> AppResult<Book> {
        book.validate()?;
        check_release_date(book.date_release, self.clock.today())?;

        if self.repository.books.name_exists(&book.name, None).await? {
            return Err(AppError::Conflict("Book title must be unique".to_string()));
        }
        self.check_relations(&book.author_ids, book.publisher_id, book.category_id)
            .await?;

        let priced = book.cost_price.is_some() || book.retail_price.is_some();
        if priced && book.currency.is_none() {
            book.currency = Some(self.default_currency.clone());
        }

        let created = self.repository.books.create(&book, self.clock.now()).await?;
        tracing::info!("Book {} created: {}", created.id, created.name);
        Ok(created)
    }

    /// Update an existing book
    pub async fn update_book(&self, id: i32, book: UpdateBook) -> AppResult<Book> {
        book.validate()?;
        check_release_date(book.date_release, self.clock.today())?;

        self.repository.books.get_by_id(id).await?;
        if let Some(ref name) = book.name {
            if self.repository.books.name_exists(name, Some(id)).await? {
                return Err(AppError::Conflict("Book title must be unique".to_string()));
            }
        }
        self.check_relations(
            book.author_ids.as_deref().unwrap_or_default(),
            book.publisher_id,
            book.category_id,
        )
        .await?;

        self.repository.books.update(id, &book, self.clock.now()).await
    }

    /// Move a book to `new_state` through the workflow
    pub async fn change_state(&self, id: i32, new_state: BookState) -> AppResult<Book> {
        let mut book = self.repository.books.get_by_id(id).await?;
        let from = book.state;

        if let Err(e) = book.change_state(new_state) {
            tracing::warn!("Book {}: {}", id, e);
            return Err(e.into());
        }

        // An ongoing rental can only be closed through the ledger
        if new_state == BookState::Available {
            let ongoing = self
                .repository
                .rentals
                .list(&RentalQuery {
                    book_id: Some(id),
                    state: Some(RentalState::Ongoing),
                    ..Default::default()
                })
                .await?;
            if let Some(rental) = ongoing.first() {
                tracing::warn!("Book {} has ongoing rental {}", id, rental.id);
                return Err(AppError::Conflict(format!(
                    "Book {} has ongoing rental {}; return it through /rentals/{}/return",
                    id, rental.id, rental.id
                )));
            }
        }

        let change = StateChange {
            book_id: id,
            from,
            to: new_state,
        };
        self.repository.books.set_state(&change, self.clock.now()).await?;
        tracing::info!("Book {} moved from {} to {}", id, from, new_state);
        Ok(book)
    }

    pub async fn make_available(&self, id: i32) -> AppResult<Book> {
        self.change_state(id, BookState::Available).await
    }

    pub async fn make_borrowed(&self, id: i32) -> AppResult<Book> {
        self.change_state(id, BookState::Borrowed).await
    }

    pub async fn make_lost(&self, id: i32) -> AppResult<Book> {
        self.change_state(id, BookState::Lost).await
    }

    /// Flip the archive flag of each book
    pub async fn toggle_archive(&self, ids: &[i32]) -> AppResult<Vec<Book>> {
        let mut books = Vec::with_capacity(ids.len());
        for &id in ids {
            books.push(self.repository.books.get_by_id(id).await?);
        }

        for book in books.iter_mut() {
            book.active = !book.active;
        }
        let flags: Vec<(i32, bool)> = books.iter().map(|b| (b.id, b.active)).collect();
        self.repository
            .books
            .set_active_many(&flags, self.clock.now())
            .await?;

        for book in &books {
            tracing::info!(
                "Book {} {}",
                book.id,
                if book.active { "restored" } else { "archived" }
            );
        }
        Ok(books)
    }

    /// Set the book's age in days by moving its release date
    pub async fn set_age_days(&self, id: i32, days: i64) -> AppResult<Book> {
        let mut book = self.repository.books.get_by_id(id).await?;
        let today = self.clock.today();
        book.set_age_days(days, today);
        check_release_date(book.date_release, today)?;

        self.repository
            .books
            .set_release_date(id, book.date_release, self.clock.now())
            .await?;
        Ok(book)
    }

    /// Create a category together with its children
    pub async fn create_category(&self, category: CreateCategory) -> AppResult<Vec<BookCategory>> {
        category.validate()?;
        if let Some(parent_id) = category.parent_id {
            self.repository.categories.get_by_id(parent_id).await?;
        }
        let created = self.repository.categories.create_tree(&category).await?;
        tracing::info!("Created {} categories under {}", created.len(), category.name);
        Ok(created)
    }

    pub async fn list_categories(&self) -> AppResult<Vec<BookCategory>> {
        self.repository.categories.list().await
    }

    pub async fn get_category(&self, id: i32) -> AppResult<CategoryTree> {
        let category = self.repository.categories.get_by_id(id).await?;
        let children = self.repository.categories.children(id).await?;
        Ok(CategoryTree { category, children })
    }

    async fn check_relations(
        &self,
        author_ids: &[i32],
        publisher_id: Option<i32>,
        category_id: Option<i32>,
    ) -> AppResult<()> {
        if !author_ids.is_empty() {
            let found = self.repository.partners.get_many(author_ids).await?;
            if let Some(missing) = author_ids.iter().find(|id| !found.iter().any(|p| p.id == **id)) {
                return Err(AppError::NotFound(format!(
                    "Partner with id {} not found",
                    missing
                )));
            }
        }
        if let Some(id) = publisher_id {
            self.repository.partners.get_by_id(id).await?;
        }
        if let Some(id) = category_id {
            self.repository.categories.get_by_id(id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tokio_test::assert_ok;

    use crate::{
        clock::FixedClock,
        models::{book::CompareOp, partner::CreatePartner, rental::CreateRental},
        repository::books::MockBookRepository,
        services::rentals::RentalsService,
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn service() -> CatalogService {
        CatalogService::new(
            Repository::in_memory(),
            Arc::new(FixedClock::on(today())),
            "EUR".to_string(),
        )
    }

    fn sample_book(id: i32) -> Book {
        Book {
            id,
            name: format!("Book {}", id),
            short_name: None,
            notes: None,
            description: None,
            state: BookState::Draft,
            date_release: None,
            date_updated: None,
            pages: None,
            out_of_print: false,
            reader_rating: None,
            cost_price: None,
            retail_price: None,
            currency: None,
            publisher_id: None,
            category_id: None,
            active: true,
            author_ids: vec![],
        }
    }

    fn dune() -> CreateBook {
        CreateBook {
            name: "Dune".to_string(),
            date_release: NaiveDate::from_ymd_opt(1965, 8, 1),
            pages: Some(412),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_book_starts_in_draft() {
        let catalog = service();
        let book = assert_ok!(catalog.create_book(dune()).await);
        assert_eq!(book.state, BookState::Draft);
        assert!(book.active);
    }

    #[tokio::test]
    async fn test_create_book_rejects_future_release() {
        let catalog = service();
        let mut book = dune();
        book.date_release = today().succ_opt();
        assert!(matches!(
            catalog.create_book(book).await,
            Err(AppError::Validation(_))
        ));

        let mut book = dune();
        book.date_release = Some(today());
        assert_ok!(catalog.create_book(book).await);
    }

    #[tokio::test]
    async fn test_create_book_rejects_bad_pages_and_duplicates() {
        let catalog = service();
        let mut book = dune();
        book.pages = Some(0);
        assert!(matches!(
            catalog.create_book(book).await,
            Err(AppError::Validation(_))
        ));

        assert_ok!(catalog.create_book(dune()).await);
        assert!(matches!(
            catalog.create_book(dune()).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_priced_book_gets_default_currency() {
        let catalog = service();
        let mut book = dune();
        book.retail_price = Some(Decimal::new(1250, 2));
        let created = catalog.create_book(book).await.unwrap();
        assert_eq!(created.currency.as_deref(), Some("EUR"));

        let mut book = dune();
        book.name = "Dune Messiah".to_string();
        let created = catalog.create_book(book).await.unwrap();
        assert_eq!(created.currency, None);
    }

    #[tokio::test]
    async fn test_create_book_checks_authors() {
        let catalog = service();
        let mut book = dune();
        book.author_ids = vec![42];
        assert!(matches!(
            catalog.create_book(book).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_change_state_follows_workflow() {
        let catalog = service();
        let book = catalog.create_book(dune()).await.unwrap();

        let err = catalog.make_lost(book.id).await.unwrap_err();
        assert!(matches!(err, AppError::Transition(_)));
        assert_eq!(catalog.get_book(book.id).await.unwrap().state, BookState::Draft);

        let available = catalog.make_available(book.id).await.unwrap();
        assert_eq!(available.state, BookState::Available);
        assert_eq!(
            catalog.get_book(book.id).await.unwrap().state,
            BookState::Available
        );

        assert_ok!(catalog.make_lost(book.id).await);
        assert_ok!(catalog.make_available(book.id).await);
    }

    #[tokio::test]
    async fn test_change_state_does_not_write_rejected_moves() {
        let mut books = MockBookRepository::new();
        books.expect_get_by_id().returning(|id| {
            Ok(Book {
                state: BookState::Borrowed,
                ..sample_book(id)
            })
        });
        books.expect_set_state().never();

        let mut repository = Repository::in_memory();
        repository.books = Arc::new(books);
        let catalog =
            CatalogService::new(repository, Arc::new(FixedClock::on(today())), "EUR".to_string());

        let err = catalog.make_borrowed(3).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Moving from borrowed to borrowed is not allowed"
        );
    }

    #[tokio::test]
    async fn test_release_with_ongoing_rental_goes_through_ledger() {
        let repository = Repository::in_memory();
        let clock = Arc::new(FixedClock::on(today()));
        let catalog = CatalogService::new(repository.clone(), clock.clone(), "EUR".to_string());
        let rentals = RentalsService::new(repository.clone(), clock);

        let borrower = repository
            .partners
            .create(&CreatePartner {
                name: "Paul Atreides".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let book = catalog.create_book(dune()).await.unwrap();
        catalog.make_available(book.id).await.unwrap();
        let rental = rentals
            .create(CreateRental {
                book_id: book.id,
                borrower_id: borrower.id,
                rent_date: None,
                stage_id: None,
            })
            .await
            .unwrap();

        assert!(matches!(
            catalog.make_available(book.id).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(catalog.get_book(book.id).await.unwrap().state, BookState::Borrowed);

        assert_ok!(rentals.book_return(&[rental.id]).await);
        assert_eq!(catalog.get_book(book.id).await.unwrap().state, BookState::Available);

        assert_ok!(catalog.make_borrowed(book.id).await);
        assert_ok!(catalog.make_available(book.id).await);
    }

    #[tokio::test]
    async fn test_toggle_archive_hides_books() {
        let catalog = service();
        let book = catalog.create_book(dune()).await.unwrap();

        let archived = catalog.toggle_archive(&[book.id]).await.unwrap();
        assert!(!archived[0].active);
        assert!(catalog.list_books().await.unwrap().is_empty());

        let (all, total) = catalog
            .search_books(&BookQuery {
                include_archived: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(all[0].id, book.id);

        catalog.toggle_archive(&[book.id]).await.unwrap();
        assert_eq!(catalog.list_books().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_archive_writes_once() {
        let mut books = MockBookRepository::new();
        books.expect_get_by_id().returning(|id| {
            let mut book = sample_book(id);
            book.active = id % 2 == 0;
            Ok(book)
        });
        books
            .expect_set_active_many()
            .withf(|flags, _| flags.to_vec() == vec![(1, true), (2, false)])
            .times(1)
            .returning(|_, _| Ok(()));

        let mut repository = Repository::in_memory();
        repository.books = Arc::new(books);
        let catalog =
            CatalogService::new(repository, Arc::new(FixedClock::on(today())), "EUR".to_string());

        let toggled = catalog.toggle_archive(&[1, 2]).await.unwrap();
        assert!(toggled[0].active);
        assert!(!toggled[1].active);
    }

    #[tokio::test]
    async fn test_archive_flags_are_all_or_nothing() {
        let catalog = service();
        let book = catalog.create_book(dune()).await.unwrap();

        let now = FixedClock::on(today()).0;
        assert!(matches!(
            catalog
                .repository
                .books
                .set_active_many(&[(book.id, false), (999, false)], now)
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(catalog.get_book(book.id).await.unwrap().active);
    }

    #[tokio::test]
    async fn test_age_days_search_and_inverse() {
        let catalog = service();
        let mut old = dune();
        old.date_release = NaiveDate::from_ymd_opt(2024, 5, 1);
        let old = catalog.create_book(old).await.unwrap();

        let mut recent = dune();
        recent.name = "Children of Dune".to_string();
        recent.date_release = NaiveDate::from_ymd_opt(2024, 5, 29);
        let recent = catalog.create_book(recent).await.unwrap();

        let (older_than_week, _) = catalog
            .search_books(&BookQuery {
                age_op: Some(CompareOp::Gt),
                age_days: Some(7),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(older_than_week.len(), 1);
        assert_eq!(older_than_week[0].id, old.id);

        let moved = catalog.set_age_days(recent.id, 100).await.unwrap();
        assert_eq!(moved.age_days(today()), 100);

        let (older_than_week, _) = catalog
            .search_books(&BookQuery {
                age_op: Some(CompareOp::Ge),
                age_days: Some(7),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(older_than_week.len(), 2);

        assert!(matches!(
            catalog.set_age_days(recent.id, -3).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_book_details_resolve_relations() {
        let repository = Repository::in_memory();
        let author = repository
            .partners
            .create(&CreatePartner {
                name: "Frank Herbert".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let publisher = repository
            .partners
            .create(&CreatePartner {
                name: "Chilton Books".to_string(),
                city: Some("Philadelphia".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let catalog =
            CatalogService::new(repository, Arc::new(FixedClock::on(today())), "EUR".to_string());

        let mut book = dune();
        book.author_ids = vec![author.id];
        book.publisher_id = Some(publisher.id);
        let book = catalog.create_book(book).await.unwrap();

        let details = catalog.get_book_details(book.id).await.unwrap();
        assert_eq!(details.display_name, "Dune (1965-08-01)");
        assert_eq!(details.authors[0].name, "Frank Herbert");
        assert_eq!(details.publisher_city.as_deref(), Some("Philadelphia"));
        assert_eq!(catalog.books_by_author(author.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_category_tree() {
        let catalog = service();
        let created = catalog
            .create_category(CreateCategory {
                name: "Parent category".to_string(),
                children: vec![
                    CreateCategory {
                        name: "Child category 1".to_string(),
                        ..Default::default()
                    },
                    CreateCategory {
                        name: "Child category 2".to_string(),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.len(), 3);

        let tree = catalog.get_category(created[0].id).await.unwrap();
        assert_eq!(tree.children.len(), 2);
        assert!(tree.children.iter().all(|c| c.parent_id == Some(created[0].id)));
    }
}
