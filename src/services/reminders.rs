//! Due-date reminders
//!
//! Read-only over the store: finds approved loans due on a target day and
//! hands a message per borrower to the notification sink.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::notifications::NotificationSink;
use crate::{
    config::ReminderConfig,
    error::{AppError, AppResult},
    models::borrow::BorrowRequestDetails,
    repository::LibraryStore,
};

const SUBJECT: &str = "Borrowed book due soon";

#[derive(Clone)]
pub struct ReminderService {
    store: Arc<dyn LibraryStore>,
    sink: Arc<dyn NotificationSink>,
    config: ReminderConfig,
}

impl ReminderService {
    pub fn new(
        store: Arc<dyn LibraryStore>,
        sink: Arc<dyn NotificationSink>,
        config: ReminderConfig,
    ) -> Self {
        Self { store, sink, config }
    }

    /// Remind every borrower whose loan is due `days_before` days after `now`.
    /// Returns how many reminders went out.
    pub async fn run_once(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let from = start_of_day(now + Duration::days(self.config.days_before));
        let to = from + Duration::days(1);

        let due = self.store.list_due_between(from, to).await?;
        let mut sent = 0;

        for loan in &due {
            let body = format!(
                "Reminder: \"{}\" is due in {} days",
                loan.book.title, self.config.days_before
            );
            match self.sink.send(&loan.from_user.email, SUBJECT, &body).await {
                Ok(()) => sent += 1,
                Err(e) => tracing::warn!(
                    request_id = %loan.id,
                    borrower_id = %loan.from_user.id,
                    error = %e,
                    "Skipping due-date reminder"
                ),
            }
        }

        tracing::info!(due = due.len(), sent, "Due-date reminders processed");
        Ok(sent)
    }

    /// Lender-triggered reminder for one open loan
    pub async fn send_reminder(&self, request_id: Uuid, lender_id: Uuid) -> AppResult<()> {
        let request = self.store.get_request(request_id).await?;
        request.ensure_remindable_by(lender_id)?;

        let loan = self.store.get_request_details(request_id).await?;
        let body = manual_reminder_body(&loan, Utc::now())?;
        self.sink.send(&loan.from_user.email, SUBJECT, &body).await?;

        tracing::info!(request_id = %request_id, borrower_id = %loan.from_user.id, "Manual reminder sent");
        Ok(())
    }

    /// Run [`Self::run_once`] every day at the configured hour
    pub fn spawn(&self) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next = next_run(now, service.config.hour);
                let wait = (next - now).to_std().unwrap_or_default();
                tracing::debug!(next_run = %next, "Reminder task sleeping");
                tokio::time::sleep(wait).await;

                if let Err(e) = service.run_once(Utc::now()).await {
                    tracing::error!(error = %e, "Reminder run failed");
                }
            }
        })
    }
}

fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&at.date_naive().and_time(NaiveTime::MIN))
}

/// Next occurrence of `hour`:00 UTC strictly after `now`
fn next_run(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let today = start_of_day(now) + Duration::hours(i64::from(hour.min(23)));
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

fn manual_reminder_body(loan: &BorrowRequestDetails, now: DateTime<Utc>) -> AppResult<String> {
    let due = loan
        .due_date
        .ok_or_else(|| AppError::Internal(format!("Approved request {} has no due date", loan.id)))?;

    let days = (start_of_day(due) - start_of_day(now)).num_days();
    Ok(if days >= 0 {
        format!("Reminder: \"{}\" is due in {} days", loan.book.title, days)
    } else {
        format!(
            "Reminder: \"{}\" was due on {}",
            loan.book.title,
            due.format("%Y-%m-%d")
        )
    })
}
