//! Bookshelf server
//!
//! REST JSON API for a shared personal library: users catalogue their books,
//! track reading progress and lend books to each other through borrow
//! requests that the owner accepts, rejects and finally closes on return.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    /// Build the services over `store` from the loaded configuration
    pub fn new(config: AppConfig, store: Arc<dyn repository::LibraryStore>) -> Self {
        let services = services::Services::new(store, config.email.clone(), config.reminders.clone());
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
