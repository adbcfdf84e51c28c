//! User accounts and ledger reads

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::user::{DashboardStats, ProvisionUser, User, UserLedger},
    repository::LibraryStore,
};

#[derive(Clone)]
pub struct UsersService {
    store: Arc<dyn LibraryStore>,
}

impl UsersService {
    pub fn new(store: Arc<dyn LibraryStore>) -> Self {
        Self { store }
    }

    /// Register a user handed over by the identity provider
    pub async fn provision(&self, data: ProvisionUser) -> AppResult<User> {
        let user = data.into_user()?;
        self.store.insert_user(&user).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "User provisioned");
        Ok(user)
    }

    /// Remove a user with their books and requests (admin).
    /// Refused while the user is party to an open loan.
    pub async fn admin_delete(&self, user_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let user = tx.lock_user(user_id).await?;
        if !user.books_lent.is_empty() || !user.books_borrowed.is_empty() {
            return Err(AppError::Conflict(
                "User has books currently lent or borrowed".to_string(),
            ));
        }

        tx.delete_user(user_id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, books = user.books_owned.len(), "User deleted");
        Ok(())
    }

    pub async fn get(&self, user_id: Uuid) -> AppResult<User> {
        self.store.get_user(user_id).await
    }

    pub async fn ledger(&self, user_id: Uuid) -> AppResult<UserLedger> {
        Ok(self.store.get_user(user_id).await?.ledger())
    }

    pub async fn stats(&self, user_id: Uuid) -> AppResult<DashboardStats> {
        Ok(self.store.get_user(user_id).await?.stats())
    }

    /// All users (admin)
    pub async fn list(&self) -> AppResult<Vec<User>> {
        self.store.list_users().await
    }
}
