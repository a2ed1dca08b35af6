//! Shared setup for the SQLite-backed integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use upkeep_core::maintenance::{WorkOrderCreator, WorkOrderError, WorkOrderRequest};
use upkeep_db::migration::{Migrator, MigratorTrait};
use upkeep_shared::TenantContext;
use upkeep_shared::types::{TenantId, TicketId};

/// Operation timeout used by every repository in the tests.
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A migrated in-memory database.
///
/// The pool holds exactly one connection so every query sees the same
/// in-memory database.
pub async fn setup() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("Failed to open in-memory database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

/// A context bound to a fresh tenant.
pub fn tenant() -> TenantContext {
    TenantContext::new(TenantId::new())
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Ticket service double that records requests, can fail the first
/// `failures` calls, and can answer after a delay.
#[derive(Clone, Default)]
pub struct TicketDesk {
    requests: Arc<Mutex<Vec<WorkOrderRequest>>>,
    failures: Arc<AtomicUsize>,
    delay: Duration,
}

impl TicketDesk {
    pub fn failing(failures: usize) -> Self {
        Self {
            failures: Arc::new(AtomicUsize::new(failures)),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<WorkOrderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl WorkOrderCreator for TicketDesk {
    async fn create_work_order(
        &self,
        _ctx: &TenantContext,
        request: WorkOrderRequest,
    ) -> Result<TicketId, WorkOrderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(WorkOrderError::Unavailable("ticket service down".to_string()));
        }
        self.requests.lock().unwrap().push(request);
        Ok(TicketId::new())
    }
}
