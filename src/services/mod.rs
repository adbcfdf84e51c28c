//! Business logic services

pub mod borrows;
pub mod catalog;
pub mod email;
pub mod notifications;
pub mod reminders;
pub mod users;

use std::sync::Arc;

use crate::{
    config::{EmailConfig, ReminderConfig},
    repository::LibraryStore,
};

use notifications::{LogSink, NotificationSink};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn LibraryStore>,
    pub borrows: borrows::BorrowsService,
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub reminders: reminders::ReminderService,
}

impl Services {
    /// Create all services over the given store
    pub fn new(
        store: Arc<dyn LibraryStore>,
        email_config: EmailConfig,
        reminder_config: ReminderConfig,
    ) -> Self {
        let sink: Arc<dyn NotificationSink> = if email_config.enabled {
            Arc::new(email::EmailService::new(email_config))
        } else {
            Arc::new(LogSink)
        };

        Self {
            borrows: borrows::BorrowsService::new(store.clone()),
            catalog: catalog::CatalogService::new(store.clone()),
            users: users::UsersService::new(store.clone()),
            reminders: reminders::ReminderService::new(store.clone(), sink, reminder_config),
            store,
        }
    }
}
