//! Server-rendered HTML listings.
//!
//! Templates live in `templates/` and are auto-escaped by askama, so titles
//! and author names are safe to embed as-is.

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::Html,
};
use serde::Deserialize;

use crate::{
    error::AppResult,
    models::book::{Book, BookDetails},
    AppState,
};

use super::{AuthenticatedUser, OptionalUser};

/// Book as shown in the catalog pages
pub struct BookRow {
    pub id: i32,
    pub name: String,
    pub date_release: String,
    pub authors: String,
    pub publisher: String,
    pub state: &'static str,
    pub pages: String,
    pub age_days: i64,
}

impl From<&BookDetails> for BookRow {
    fn from(details: &BookDetails) -> Self {
        let book = &details.book;
        Self {
            id: book.id,
            name: book.name.clone(),
            date_release: book
                .date_release
                .map(|d| d.to_string())
                .unwrap_or_default(),
            authors: author_names(details),
            publisher: details
                .publisher
                .as_ref()
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            state: book.state.label(),
            pages: book.pages.map(|p| p.to_string()).unwrap_or_default(),
            age_days: details.age_days,
        }
    }
}

/// Title entry of the plain listings; `mine` renders it bold
pub struct ListedBook {
    pub name: String,
    pub mine: bool,
}

#[derive(Template)]
#[template(path = "books.html")]
pub struct BooksPage {
    pub books: Vec<BookRow>,
}

#[derive(Template)]
#[template(path = "book_detail.html")]
pub struct BookDetailPage {
    pub book: BookRow,
    pub description: String,
}

#[derive(Template)]
#[template(path = "book_list.html")]
pub struct BookListPage {
    pub books: Vec<ListedBook>,
}

#[derive(Template)]
#[template(path = "book_details.html")]
pub struct BookDetailsPage {
    pub name: String,
    pub authors: String,
}

#[derive(Deserialize)]
pub struct BookDetailsQuery {
    pub book_id: i32,
}

fn author_names(details: &BookDetails) -> String {
    details
        .authors
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn listed(books: Vec<Book>, partner_id: Option<i32>) -> BookListPage {
    BookListPage {
        books: books
            .into_iter()
            .map(|book| ListedBook {
                mine: partner_id.is_some_and(|id| book.author_ids.contains(&id)),
                name: book.name,
            })
            .collect(),
    }
}

/// `GET /books`: catalog table
pub async fn books(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Html<String>> {
    let books = state.services.catalog.list_books().await?;
    let details = state.services.catalog.details(books).await?;

    let page = BooksPage {
        books: details.iter().map(BookRow::from).collect(),
    };
    Ok(Html(page.render()?))
}

/// `GET /books/:id`
pub async fn book_detail(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Html<String>> {
    let details = state.services.catalog.get_book_details(id).await?;

    let page = BookDetailPage {
        book: BookRow::from(&details),
        description: details.book.description.clone().unwrap_or_default(),
    };
    Ok(Html(page.render()?))
}

/// `GET /my_library/all-books`: every active title, no login
pub async fn all_books(State(state): State<AppState>) -> AppResult<Html<String>> {
    let books = state.services.catalog.list_books().await?;
    Ok(Html(listed(books, None).render()?))
}

/// `GET /my_library/all-books/mark-mine`: titles authored by the caller in bold
pub async fn all_books_mark_mine(
    State(state): State<AppState>,
    OptionalUser(claims): OptionalUser,
) -> AppResult<Html<String>> {
    let books = state.services.catalog.list_books().await?;
    let partner_id = claims.map(|c| c.partner_id);
    Ok(Html(listed(books, partner_id).render()?))
}

/// `GET /my_library/all-books/mine`
pub async fn all_books_mine(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Html<String>> {
    let books = state
        .services
        .catalog
        .books_by_author(claims.partner_id)
        .await?;
    Ok(Html(listed(books, None).render()?))
}

/// `GET /my_library/book_details?book_id=N`
pub async fn book_details(
    State(state): State<AppState>,
    Query(query): Query<BookDetailsQuery>,
) -> AppResult<Html<String>> {
    render_book_details(&state, query.book_id).await
}

/// `GET /my_library/book_details/:id`
pub async fn book_details_in_path(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Html<String>> {
    render_book_details(&state, id).await
}

async fn render_book_details(state: &AppState, id: i32) -> AppResult<Html<String>> {
    let details = state.services.catalog.get_book_details(id).await?;

    let mut authors = author_names(&details);
    if authors.is_empty() {
        authors = "none".to_string();
    }
    let page = BookDetailsPage {
        name: details.book.name,
        authors,
    };
    Ok(Html(page.render()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::book::BookState;

    fn book(name: &str, author_ids: Vec<i32>) -> Book {
        Book {
            id: 1,
            name: name.to_string(),
            short_name: None,
            notes: None,
            description: None,
            state: BookState::Available,
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
            author_ids,
        }
    }

    #[test]
    fn test_mark_mine_bolds_own_titles() {
        let html = listed(
            vec![book("Dune", vec![7]), book("Solaris", vec![8])],
            Some(7),
        )
        .render()
        .unwrap();

        assert!(html.contains("<li> <b>Dune</b> </li>"));
        assert!(html.contains("<li> Solaris </li>"));
        assert!(html.starts_with("<html><body><ul>"));
        assert!(html.trim_end().ends_with("</ul></body></html>"));
    }

    #[test]
    fn test_listing_escapes_titles() {
        let html = listed(vec![book("<script>alert(1)</script>", vec![])], None)
            .render()
            .unwrap();
        assert!(!html.contains("<script>"));
        assert!(!html.contains("</script>"));
        assert!(html.contains("alert(1)"));
    }

    #[test]
    fn test_book_details_page() {
        let html = BookDetailsPage {
            name: "Dune".to_string(),
            authors: "none".to_string(),
        }
        .render()
        .unwrap();
        assert_eq!(
            html.trim_end(),
            "<html><body><h1>Dune</h1>Authors: none</body></html>"
        );
    }
}
