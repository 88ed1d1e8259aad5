//! Rental ledger service

use std::sync::Arc;

use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    models::{
        book::StateChange,
        partner::PartnerShort,
        rental::{CreateRental, NewRental, Rental, RentalDetails, RentalQuery, RentalState},
        stage::default_stage,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct RentalsService {
    repository: Repository,
    clock: Arc<dyn Clock>,
}

impl RentalsService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// List rentals matching the query, newest first
    pub async fn list(&self, query: &RentalQuery) -> AppResult<Vec<Rental>> {
        self.repository.rentals.list(query).await
    }

    pub async fn get(&self, id: i32) -> AppResult<Rental> {
        self.repository.rentals.get_by_id(id).await
    }

    /// Get a rental with its book, borrower and stage
    pub async fn get_details(&self, id: i32) -> AppResult<RentalDetails> {
        let rental = self.repository.rentals.get_by_id(id).await?;
        let book = self.repository.books.get_by_id(rental.book_id).await?;
        let borrower = self.repository.partners.get_by_id(rental.borrower_id).await?;
        let stage = match rental.stage_id {
            Some(stage_id) => Some(self.repository.stages.get_by_id(stage_id).await?),
            None => None,
        };

        Ok(RentalDetails {
            book_name: book.name,
            book_state: book.state,
            borrower: PartnerShort::from(&borrower),
            stage,
            rental,
        })
    }

    /// Lend a book: the book moves to `borrowed` and an ongoing rental is recorded
    pub async fn create(&self, rental: CreateRental) -> AppResult<Rental> {
        self.repository.partners.get_by_id(rental.borrower_id).await?;
        let mut book = self.repository.books.get_by_id(rental.book_id).await?;

        let from = book.state;
        if let Err(e) = book.make_borrowed() {
            tracing::warn!("Cannot lend book {}: {}", book.id, e);
            return Err(e.into());
        }

        let stage_id = match rental.stage_id {
            Some(id) => Some(self.repository.stages.get_by_id(id).await?.id),
            None => {
                let stages = self.repository.stages.list().await?;
                default_stage(&stages).map(|s| s.id)
            }
        };

        let new_rental = NewRental {
            book_id: book.id,
            borrower_id: rental.borrower_id,
            rent_date: rental.rent_date.unwrap_or_else(|| self.clock.today()),
            stage_id,
        };
        let change = StateChange {
            book_id: book.id,
            from,
            to: book.state,
        };

        let created = self
            .repository
            .rentals
            .open(&new_rental, &change, self.clock.now())
            .await?;
        tracing::info!(
            "Rental {} opened: book {} lent to partner {}",
            created.id,
            created.book_id,
            created.borrower_id
        );
        Ok(created)
    }

    /// Return the book of exactly one rental
    pub async fn book_return(&self, ids: &[i32]) -> AppResult<Rental> {
        let id = match ids {
            [id] => *id,
            _ => {
                return Err(AppError::Arity {
                    expected: 1,
                    got: ids.len(),
                })
            }
        };

        let rental = self.repository.rentals.get_by_id(id).await?;
        let mut book = self.repository.books.get_by_id(rental.book_id).await?;

        let from = book.state;
        if let Err(e) = book.make_available() {
            tracing::warn!("Cannot return rental {}: {}", id, e);
            return Err(e.into());
        }
        if rental.state == RentalState::Returned {
            tracing::warn!("Rental {} was already returned", id);
            return Err(AppError::Conflict(format!(
                "Rental {} was already returned",
                id
            )));
        }

        let change = StateChange {
            book_id: book.id,
            from,
            to: book.state,
        };
        let closed = self
            .repository
            .rentals
            .close(id, &change, self.clock.today(), self.clock.now())
            .await?;
        tracing::info!("Rental {} returned: book {} available", closed.id, closed.book_id);
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tokio_test::assert_ok;

    use crate::{
        clock::FixedClock,
        models::{
            book::{BookState, CreateBook},
            partner::CreatePartner,
            stage::CreateStage,
        },
        repository::rentals::MockRentalRepository,
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    struct Fixture {
        repository: Repository,
        rentals: RentalsService,
        book_id: i32,
        borrower_id: i32,
    }

    async fn fixture(state: BookState) -> Fixture {
        let repository = Repository::in_memory();
        let now = FixedClock::on(today()).0;

        let borrower = repository
            .partners
            .create(&CreatePartner {
                name: "Paul Atreides".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let book = repository
            .books
            .create(
                &CreateBook {
                    name: "Dune".to_string(),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();

        let path: &[BookState] = match state {
            BookState::Draft => &[],
            BookState::Available => &[BookState::Available],
            BookState::Borrowed => &[BookState::Available, BookState::Borrowed],
            BookState::Lost => &[BookState::Available, BookState::Lost],
        };
        let mut from = BookState::Draft;
        for &to in path {
            repository
                .books
                .set_state(
                    &StateChange {
                        book_id: book.id,
                        from,
                        to,
                    },
                    now,
                )
                .await
                .unwrap();
            from = to;
        }

        Fixture {
            rentals: RentalsService::new(repository.clone(), Arc::new(FixedClock::on(today()))),
            repository,
            book_id: book.id,
            borrower_id: borrower.id,
        }
    }

    fn rent(f: &Fixture) -> CreateRental {
        CreateRental {
            book_id: f.book_id,
            borrower_id: f.borrower_id,
            rent_date: None,
            stage_id: None,
        }
    }

    async fn book_state(f: &Fixture) -> BookState {
        f.repository.books.get_by_id(f.book_id).await.unwrap().state
    }

    #[tokio::test]
    async fn test_lend_and_return_cycle() {
        let f = fixture(BookState::Available).await;

        let rental = assert_ok!(f.rentals.create(rent(&f)).await);
        assert_eq!(rental.state, RentalState::Ongoing);
        assert_eq!(rental.rent_date, today());
        assert_eq!(book_state(&f).await, BookState::Borrowed);

        let returned = assert_ok!(f.rentals.book_return(&[rental.id]).await);
        assert_eq!(returned.state, RentalState::Returned);
        assert_eq!(returned.return_date, Some(today()));
        assert_eq!(book_state(&f).await, BookState::Available);

        let err = f.rentals.book_return(&[rental.id]).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Moving from available to available is not allowed"
        );
    }

    #[tokio::test]
    async fn test_cannot_lend_unavailable_books() {
        for state in [BookState::Draft, BookState::Borrowed, BookState::Lost] {
            let f = fixture(state).await;
            let err = f.rentals.create(rent(&f)).await.unwrap_err();
            assert!(matches!(err, AppError::Transition(_)), "{:?}", state);
            assert_eq!(book_state(&f).await, state);

            let ledger = f.rentals.list(&RentalQuery::default()).await.unwrap();
            assert!(ledger.is_empty());
        }
    }

    #[tokio::test]
    async fn test_unknown_borrower() {
        let f = fixture(BookState::Available).await;
        let mut rental = rent(&f);
        rental.borrower_id = 999;
        assert!(matches!(
            f.rentals.create(rental).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(book_state(&f).await, BookState::Available);
    }

    #[tokio::test]
    async fn test_default_stage_is_first_in_order() {
        let f = fixture(BookState::Available).await;
        for (name, sequence) in [("Late", 3), ("Borrowed", 1), ("Overdue", 2)] {
            f.repository
                .stages
                .create(&CreateStage {
                    name: name.to_string(),
                    sequence,
                    fold: false,
                    book_state: None,
                })
                .await
                .unwrap();
        }

        let rental = f.rentals.create(rent(&f)).await.unwrap();
        let details = f.rentals.get_details(rental.id).await.unwrap();
        assert_eq!(details.stage.map(|s| s.name).as_deref(), Some("Borrowed"));
        assert_eq!(details.borrower.name, "Paul Atreides");
        assert_eq!(details.book_state, BookState::Borrowed);
    }

    #[tokio::test]
    async fn test_return_requires_exactly_one_rental() {
        let f = fixture(BookState::Available).await;
        let rental = f.rentals.create(rent(&f)).await.unwrap();

        for ids in [vec![], vec![rental.id, rental.id]] {
            match f.rentals.book_return(&ids).await {
                Err(AppError::Arity { expected, got }) => {
                    assert_eq!(expected, 1);
                    assert_eq!(got, ids.len());
                }
                other => panic!("expected arity error, got {:?}", other),
            }
        }
        assert_eq!(book_state(&f).await, BookState::Borrowed);
        assert_eq!(
            f.rentals.get(rental.id).await.unwrap().state,
            RentalState::Ongoing
        );
    }

    #[tokio::test]
    async fn test_rejected_rental_is_never_written() {
        let mut f = fixture(BookState::Lost).await;
        let mut rentals = MockRentalRepository::new();
        rentals.expect_open().never();
        f.repository.rentals = Arc::new(rentals);
        let service = RentalsService::new(f.repository.clone(), Arc::new(FixedClock::on(today())));

        assert!(service.create(rent(&f)).await.is_err());
    }

    #[tokio::test]
    async fn test_stale_return_leaves_new_rental_alone() {
        let f = fixture(BookState::Available).await;
        let first = f.rentals.create(rent(&f)).await.unwrap();
        f.rentals.book_return(&[first.id]).await.unwrap();
        let second = f.rentals.create(rent(&f)).await.unwrap();

        assert!(matches!(
            f.rentals.book_return(&[first.id]).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(book_state(&f).await, BookState::Borrowed);
        assert_eq!(
            f.rentals.get(second.id).await.unwrap().state,
            RentalState::Ongoing
        );

        assert_ok!(f.rentals.book_return(&[second.id]).await);
        assert_eq!(book_state(&f).await, BookState::Available);
        assert_ok!(f.rentals.create(rent(&f)).await);
    }

    #[tokio::test]
    async fn test_store_refuses_to_close_returned_rental() {
        let f = fixture(BookState::Available).await;
        let rental = f.rentals.create(rent(&f)).await.unwrap();
        f.rentals.book_return(&[rental.id]).await.unwrap();
        f.rentals.create(rent(&f)).await.unwrap();

        let change = StateChange {
            book_id: f.book_id,
            from: BookState::Borrowed,
            to: BookState::Available,
        };
        let now = FixedClock::on(today()).0;
        assert!(matches!(
            f.repository.rentals.close(rental.id, &change, today(), now).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(book_state(&f).await, BookState::Borrowed);
    }

    #[tokio::test]
    async fn test_lost_book_comes_back() {
        let f = fixture(BookState::Available).await;
        let rental = f.rentals.create(rent(&f)).await.unwrap();

        let now = FixedClock::on(today()).0;
        f.repository
            .books
            .set_state(
                &StateChange {
                    book_id: f.book_id,
                    from: BookState::Borrowed,
                    to: BookState::Lost,
                },
                now,
            )
            .await
            .unwrap();

        let returned = f.rentals.book_return(&[rental.id]).await.unwrap();
        assert_eq!(returned.state, RentalState::Returned);
        assert_eq!(book_state(&f).await, BookState::Available);
    }
}
