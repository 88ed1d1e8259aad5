//! Business logic services

pub mod catalog;
pub mod partners;
pub mod rentals;
pub mod stages;

use std::sync::Arc;

use crate::{clock::Clock, config::LibraryConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub rentals: rentals::RentalsService,
    pub stages: stages::StagesService,
    pub partners: partners::PartnersService,
}

impl Services {
    /// Create all services over the given repository and clock
    pub fn new(repository: Repository, clock: Arc<dyn Clock>, library: &LibraryConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(
                repository.clone(),
                clock.clone(),
                library.default_currency.clone(),
            ),
            rentals: rentals::RentalsService::new(repository.clone(), clock),
            stages: stages::StagesService::new(repository.clone()),
            partners: partners::PartnersService::new(repository),
        }
    }
}
