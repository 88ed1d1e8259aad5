//! In-memory store used by tests and local tooling.
//!
//! Mirrors the PostgreSQL schema constraints that the services rely on:
//! unique book titles, positive page counts, at most one ongoing rental per
//! book, and compare-and-set state changes.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{BookRepository, CategoryRepository, PartnerRepository, RentalRepository, StageRepository};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{
            is_allowed_transition, Book, BookSearch, BookState, CreateBook, StateChange,
            TransitionError, UpdateBook,
        },
        category::{BookCategory, CreateCategory},
        member::{CreateMember, LibraryMember},
        partner::{CreatePartner, Partner},
        rental::{NewRental, Rental, RentalQuery, RentalState},
        stage::{CreateStage, RentalStage, UpdateStage},
    },
};

#[derive(Default)]
struct Tables {
    next_id: i32,
    books: BTreeMap<i32, Book>,
    rentals: BTreeMap<i32, Rental>,
    stages: BTreeMap<i32, RentalStage>,
    partners: BTreeMap<i32, Partner>,
    members: BTreeMap<i32, (i32, CreateMember)>,
    categories: BTreeMap<i32, BookCategory>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn book_mut(&mut self, id: i32) -> AppResult<&mut Book> {
        self.books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    fn check_title(&self, name: &str, exclude_id: Option<i32>) -> AppResult<()> {
        if self
            .books
            .values()
            .any(|b| b.name == name && Some(b.id) != exclude_id)
        {
            return Err(AppError::Conflict("Book title must be unique".to_string()));
        }
        Ok(())
    }

    fn apply_state_change(&mut self, change: &StateChange, now: DateTime<Utc>) -> AppResult<()> {
        let book = self.book_mut(change.book_id)?;
        if book.state != change.from {
            if is_allowed_transition(book.state, change.to) {
                return Err(AppError::Conflict(format!(
                    "Book {} was modified concurrently",
                    change.book_id
                )));
            }
            return Err(TransitionError {
                from: book.state,
                to: change.to,
            }
            .into());
        }
        book.state = change.to;
        book.date_updated = Some(now);
        Ok(())
    }

    fn member(&self, id: i32) -> AppResult<LibraryMember> {
        let (partner_id, data) = self
            .members
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))?;
        let name = self
            .partners
            .get(partner_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        Ok(LibraryMember {
            id,
            partner_id: *partner_id,
            name,
            date_start: data.date_start,
            date_end: data.date_end,
            member_number: data.member_number.clone(),
            date_of_birth: data.date_of_birth,
        })
    }
}

fn check_pages(pages: Option<i32>) -> AppResult<()> {
    match pages {
        Some(p) if p <= 0 => Err(AppError::Validation(
            "No of pages must be positive".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Single-process store guarded by one mutex
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn lock(&self) -> AppResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("In-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl BookRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        let mut tables = self.lock()?;
        let book = tables.book_mut(id)?.clone();
        Ok(book)
    }

    async fn search(&self, search: &BookSearch) -> AppResult<(Vec<Book>, i64)> {
        let tables = self.lock()?;
        let needle = search.name.as_ref().map(|n| n.to_lowercase());

        let mut books: Vec<Book> = tables
            .books
            .values()
            .filter(|b| {
                needle
                    .as_ref()
                    .map(|n| b.name.to_lowercase().contains(n))
                    .unwrap_or(true)
            })
            .filter(|b| search.state.map(|s| b.state == s).unwrap_or(true))
            .filter(|b| {
                search
                    .author_id
                    .map(|a| b.author_ids.contains(&a))
                    .unwrap_or(true)
            })
            .filter(|b| {
                search
                    .publisher_id
                    .map(|p| b.publisher_id == Some(p))
                    .unwrap_or(true)
            })
            .filter(|b| !search.active_only || b.active)
            .filter(|b| {
                search
                    .release
                    .map(|r| r.matches(b.date_release))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        // date_release DESC NULLS LAST, name
        books.sort_by(|a, b| {
            b.date_release
                .is_some()
                .cmp(&a.date_release.is_some())
                .then_with(|| b.date_release.cmp(&a.date_release))
                .then_with(|| a.name.cmp(&b.name))
        });

        let total = books.len() as i64;
        let offset = search.offset.max(0) as usize;
        let page = books
            .into_iter()
            .skip(offset)
            .take(search.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX))
            .collect();

        Ok((page, total))
    }

    async fn name_exists(&self, name: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let tables = self.lock()?;
        Ok(tables.check_title(name, exclude_id).is_err())
    }

    async fn create(&self, book: &CreateBook, now: DateTime<Utc>) -> AppResult<Book> {
        let mut tables = self.lock()?;
        tables.check_title(&book.name, None)?;
        check_pages(book.pages)?;

        let id = tables.next_id();
        let mut author_ids = book.author_ids.clone();
        author_ids.sort_unstable();
        author_ids.dedup();

        let created = Book {
            id,
            name: book.name.clone(),
            short_name: book.short_name.clone(),
            notes: book.notes.clone(),
            description: book.description.clone(),
            state: BookState::Draft,
            date_release: book.date_release,
            date_updated: Some(now),
            pages: book.pages,
            out_of_print: book.out_of_print.unwrap_or(false),
            reader_rating: book.reader_rating,
            cost_price: book.cost_price,
            retail_price: book.retail_price,
            currency: book.currency.clone(),
            publisher_id: book.publisher_id,
            category_id: book.category_id,
            active: true,
            author_ids,
        };
        tables.books.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i32, update: &UpdateBook, now: DateTime<Utc>) -> AppResult<Book> {
        let mut tables = self.lock()?;
        if let Some(ref name) = update.name {
            tables.check_title(name, Some(id))?;
        }
        check_pages(update.pages)?;

        let book = tables.book_mut(id)?;

        macro_rules! set_field {
            ($field:ident) => {
                if let Some(ref val) = update.$field {
                    book.$field = val.clone();
                }
            };
            ($field:ident, optional) => {
                if let Some(ref val) = update.$field {
                    book.$field = Some(val.clone());
                }
            };
        }

        set_field!(name);
        set_field!(short_name, optional);
        set_field!(notes, optional);
        set_field!(description, optional);
        set_field!(date_release, optional);
        set_field!(pages, optional);
        set_field!(out_of_print);
        set_field!(reader_rating, optional);
        set_field!(cost_price, optional);
        set_field!(retail_price, optional);
        set_field!(currency, optional);
        set_field!(publisher_id, optional);
        set_field!(category_id, optional);

        if let Some(ref author_ids) = update.author_ids {
            let mut ids = author_ids.clone();
            ids.sort_unstable();
            ids.dedup();
            book.author_ids = ids;
        }
        book.date_updated = Some(now);
        Ok(book.clone())
    }

    async fn set_state(&self, change: &StateChange, now: DateTime<Utc>) -> AppResult<()> {
        self.lock()?.apply_state_change(change, now)
    }

    async fn set_active_many(&self, flags: &[(i32, bool)], now: DateTime<Utc>) -> AppResult<()> {
        let mut tables = self.lock()?;
        if let Some(&(id, _)) = flags.iter().find(|(id, _)| !tables.books.contains_key(id)) {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        for &(id, active) in flags {
            let book = tables.book_mut(id)?;
            book.active = active;
            book.date_updated = Some(now);
        }
        Ok(())
    }

    async fn set_release_date(
        &self,
        id: i32,
        date_release: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut tables = self.lock()?;
        let book = tables.book_mut(id)?;
        book.date_release = date_release;
        book.date_updated = Some(now);
        Ok(())
    }
}

#[async_trait]
impl RentalRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<Rental> {
        self.lock()?
            .rentals
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Rental with id {} not found", id)))
    }

    async fn list(&self, query: &RentalQuery) -> AppResult<Vec<Rental>> {
        let tables = self.lock()?;
        let mut rentals: Vec<Rental> = tables
            .rentals
            .values()
            .filter(|r| query.book_id.map(|id| r.book_id == id).unwrap_or(true))
            .filter(|r| query.borrower_id.map(|id| r.borrower_id == id).unwrap_or(true))
            .filter(|r| query.state.map(|s| r.state == s).unwrap_or(true))
            .cloned()
            .collect();
        rentals.sort_by(|a, b| b.rent_date.cmp(&a.rent_date).then_with(|| b.id.cmp(&a.id)));
        Ok(rentals)
    }

    async fn open(
        &self,
        rental: &NewRental,
        change: &StateChange,
        now: DateTime<Utc>,
    ) -> AppResult<Rental> {
        let mut tables = self.lock()?;
        if tables
            .rentals
            .values()
            .any(|r| r.book_id == rental.book_id && r.state == RentalState::Ongoing)
        {
            return Err(AppError::Conflict(
                "Book already has an ongoing rental".to_string(),
            ));
        }
        tables.apply_state_change(change, now)?;

        let id = tables.next_id();
        let created = Rental {
            id,
            book_id: rental.book_id,
            borrower_id: rental.borrower_id,
            state: RentalState::Ongoing,
            rent_date: rental.rent_date,
            return_date: None,
            stage_id: rental.stage_id,
        };
        tables.rentals.insert(id, created.clone());
        Ok(created)
    }

    async fn close(
        &self,
        id: i32,
        change: &StateChange,
        return_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> AppResult<Rental> {
        let mut tables = self.lock()?;
        match tables.rentals.get(&id) {
            None => {
                return Err(AppError::NotFound(format!("Rental with id {} not found", id)));
            }
            Some(r) if r.state != RentalState::Ongoing => {
                return Err(AppError::Conflict(format!(
                    "Rental {} was already returned",
                    id
                )));
            }
            Some(_) => {}
        }
        tables.apply_state_change(change, now)?;

        let rental = tables
            .rentals
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Rental with id {} not found", id)))?;
        rental.state = RentalState::Returned;
        rental.return_date = Some(return_date);
        Ok(rental.clone())
    }
}

#[async_trait]
impl StageRepository for MemoryStore {
    async fn list(&self) -> AppResult<Vec<RentalStage>> {
        let mut stages: Vec<RentalStage> = self.lock()?.stages.values().cloned().collect();
        stages.sort_by(RentalStage::display_order);
        Ok(stages)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<RentalStage> {
        self.lock()?
            .stages
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Stage {} not found", id)))
    }

    async fn create(&self, stage: &CreateStage) -> AppResult<RentalStage> {
        let mut tables = self.lock()?;
        let id = tables.next_id();
        let created = RentalStage {
            id,
            name: stage.name.clone(),
            sequence: stage.sequence,
            fold: stage.fold,
            book_state: stage.book_state.unwrap_or(BookState::Available),
        };
        tables.stages.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i32, update: &UpdateStage) -> AppResult<RentalStage> {
        let mut tables = self.lock()?;
        let stage = tables
            .stages
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Stage {} not found", id)))?;
        if let Some(ref name) = update.name {
            stage.name = name.clone();
        }
        if let Some(sequence) = update.sequence {
            stage.sequence = sequence;
        }
        if let Some(fold) = update.fold {
            stage.fold = fold;
        }
        if let Some(book_state) = update.book_state {
            stage.book_state = book_state;
        }
        Ok(stage.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tables = self.lock()?;
        if tables.stages.remove(&id).is_none() {
            return Err(AppError::NotFound(format!("Stage {} not found", id)));
        }
        for rental in tables.rentals.values_mut() {
            if rental.stage_id == Some(id) {
                rental.stage_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PartnerRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<Partner> {
        self.lock()?
            .partners
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Partner with id {} not found", id)))
    }

    async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<Partner>> {
        let tables = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.partners.get(id).cloned())
            .collect())
    }

    async fn list(&self) -> AppResult<Vec<Partner>> {
        let mut partners: Vec<Partner> = self.lock()?.partners.values().cloned().collect();
        partners.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(partners)
    }

    async fn create(&self, partner: &CreatePartner) -> AppResult<Partner> {
        let mut tables = self.lock()?;
        let id = tables.next_id();
        let created = Partner {
            id,
            name: partner.name.clone(),
            email: partner.email.clone(),
            city: partner.city.clone(),
        };
        tables.partners.insert(id, created.clone());
        Ok(created)
    }

    async fn authored_book_ids(&self, id: i32) -> AppResult<Vec<i32>> {
        Ok(self
            .lock()?
            .books
            .values()
            .filter(|b| b.author_ids.contains(&id))
            .map(|b| b.id)
            .collect())
    }

    async fn published_book_ids(&self, id: i32) -> AppResult<Vec<i32>> {
        Ok(self
            .lock()?
            .books
            .values()
            .filter(|b| b.publisher_id == Some(id))
            .map(|b| b.id)
            .collect())
    }

    async fn list_members(&self) -> AppResult<Vec<LibraryMember>> {
        let tables = self.lock()?;
        let mut members = tables
            .members
            .keys()
            .map(|id| tables.member(*id))
            .collect::<AppResult<Vec<_>>>()?;
        members.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(members)
    }

    async fn get_member(&self, id: i32) -> AppResult<LibraryMember> {
        self.lock()?.member(id)
    }

    async fn create_member(&self, member: &CreateMember) -> AppResult<LibraryMember> {
        let mut tables = self.lock()?;
        let partner_id = match (member.partner_id, &member.partner) {
            (Some(id), _) => {
                if !tables.partners.contains_key(&id) {
                    return Err(AppError::NotFound(format!("Partner with id {} not found", id)));
                }
                id
            }
            (None, Some(partner)) => {
                let id = tables.next_id();
                tables.partners.insert(
                    id,
                    Partner {
                        id,
                        name: partner.name.clone(),
                        email: partner.email.clone(),
                        city: partner.city.clone(),
                    },
                );
                id
            }
            (None, None) => {
                return Err(AppError::Validation(
                    "partner_id or partner is required".to_string(),
                ))
            }
        };

        if tables.members.values().any(|(p, _)| *p == partner_id) {
            return Err(AppError::Conflict("Party is already a member".to_string()));
        }

        let id = tables.next_id();
        tables.members.insert(id, (partner_id, member.clone()));
        tables.member(id)
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn list(&self) -> AppResult<Vec<BookCategory>> {
        let mut rows: Vec<BookCategory> = self.lock()?.categories.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<BookCategory> {
        self.lock()?
            .categories
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))
    }

    async fn children(&self, id: i32) -> AppResult<Vec<BookCategory>> {
        let mut rows: Vec<BookCategory> = self
            .lock()?
            .categories
            .values()
            .filter(|c| c.parent_id == Some(id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn create_tree(&self, category: &CreateCategory) -> AppResult<Vec<BookCategory>> {
        let mut tables = self.lock()?;
        let mut created = Vec::new();
        let mut pending = vec![(category, category.parent_id)];
        while !pending.is_empty() {
            let mut next = Vec::new();
            for (node, parent_id) in pending {
                let id = tables.next_id();
                let row = BookCategory {
                    id,
                    name: node.name.clone(),
                    description: node.description.clone(),
                    parent_id,
                };
                tables.categories.insert(id, row.clone());
                next.extend(node.children.iter().map(|child| (child, Some(id))));
                created.push(row);
            }
            pending = next;
        }
        Ok(created)
    }
}
