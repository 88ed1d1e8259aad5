//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, partners, rentals, stages};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shelfmark API",
        version = "0.1.0",
        description = "Library book inventory and rental ledger REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::change_state,
        books::make_available,
        books::make_borrowed,
        books::make_lost,
        books::set_age_days,
        books::toggle_archive,
        // Rentals
        rentals::list_rentals,
        rentals::get_rental,
        rentals::create_rental,
        rentals::return_rentals,
        rentals::return_rental,
        // Stages
        stages::list_stages,
        stages::get_stage,
        stages::create_stage,
        stages::update_stage,
        stages::delete_stage,
        // Parties
        partners::list_partners,
        partners::get_partner,
        partners::create_partner,
        partners::list_members,
        partners::get_member,
        partners::create_member,
        partners::list_categories,
        partners::get_category,
        partners::create_category,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::BookState,
            crate::models::book::BookDetails,
            crate::models::book::BookQuery,
            crate::models::book::CompareOp,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            books::BookPage,
            books::ChangeStateRequest,
            books::ArchiveRequest,
            books::SetAgeRequest,
            // Rentals
            crate::models::rental::Rental,
            crate::models::rental::RentalState,
            crate::models::rental::RentalDetails,
            crate::models::rental::RentalQuery,
            crate::models::rental::CreateRental,
            crate::models::rental::ReturnRentals,
            // Stages
            crate::models::stage::RentalStage,
            crate::models::stage::CreateStage,
            crate::models::stage::UpdateStage,
            // Parties
            crate::models::partner::Partner,
            crate::models::partner::PartnerShort,
            crate::models::partner::PartnerDetails,
            crate::models::partner::CreatePartner,
            crate::models::member::LibraryMember,
            crate::models::member::CreateMember,
            crate::models::category::BookCategory,
            crate::models::category::CategoryTree,
            crate::models::category::CreateCategory,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book catalog and lifecycle"),
        (name = "rentals", description = "Rental ledger"),
        (name = "stages", description = "Rental stages"),
        (name = "partners", description = "Authors, publishers and borrowers"),
        (name = "members", description = "Library members"),
        (name = "categories", description = "Book categories")
    )
)]
pub struct ApiDoc;

pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
