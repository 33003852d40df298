//! Shared test harness: an instrumented in-memory driver that records the
//! exact statement order observed on each connection.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tenancy_database::{DriverError, GuardDriver, GuardTransaction, PoolError};
use tenancy_models::SqlParam;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;

/// One statement observed on a fake connection.
#[derive(Debug, Clone)]
pub struct ObservedStatement {
    pub tx_id: u64,
    pub sql: String,
    pub params: Vec<String>,
}

fn render_param(param: &SqlParam) -> String {
    match param {
        SqlParam::Text(v) => v.clone(),
        other => format!("{other:?}"),
    }
}

#[derive(Debug, Default)]
pub struct FakeLog {
    statements: Mutex<Vec<ObservedStatement>>,
}

impl FakeLog {
    pub fn push(&self, tx_id: u64, sql: &str, params: &[SqlParam]) {
        let mut guard = self.statements.lock().expect("fake log lock");
        guard.push(ObservedStatement {
            tx_id,
            sql: sql.to_string(),
            params: params.iter().map(render_param).collect(),
        });
    }

    pub fn all(&self) -> Vec<ObservedStatement> {
        self.statements.lock().expect("fake log lock").clone()
    }

    /// Statements of one transaction, in observed order.
    pub fn transaction(&self, tx_id: u64) -> Vec<ObservedStatement> {
        self.all()
            .into_iter()
            .filter(|s| s.tx_id == tx_id)
            .collect()
    }

    pub fn transaction_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.all().iter().map(|s| s.tx_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Bounded in-memory driver. Concurrency is limited by a semaphore the way
/// a real pool limits physical connections.
#[derive(Clone)]
pub struct FakeDriver {
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
    log: Arc<FakeLog>,
    next_tx: Arc<AtomicU64>,
    open: Arc<AtomicUsize>,
    high_water: Arc<AtomicUsize>,
    fail_statements: Arc<AtomicBool>,
}

impl FakeDriver {
    pub fn bounded(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size)),
            acquire_timeout: Duration::from_secs(5),
            log: Arc::new(FakeLog::default()),
            next_tx: Arc::new(AtomicU64::new(0)),
            open: Arc::new(AtomicUsize::new(0)),
            high_water: Arc::new(AtomicUsize::new(0)),
            fail_statements: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    pub fn log(&self) -> Arc<FakeLog> {
        self.log.clone()
    }

    /// Make every subsequent statement fail at the driver, as a severed
    /// connection would.
    pub fn fail_statements(&self, fail: bool) {
        self.fail_statements.store(fail, Ordering::SeqCst);
    }

    pub fn open_transactions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GuardDriver for FakeDriver {
    type Tx = FakeTransaction;

    async fn begin(&self) -> Result<FakeTransaction, PoolError> {
        let permit = match timeout(self.acquire_timeout, self.permits.clone().acquire_owned()).await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::Exhausted("fake pool closed".to_string())),
            Err(_) => return Err(PoolError::AcquireTimeout(self.acquire_timeout)),
        };

        let tx_id = self.next_tx.fetch_add(1, Ordering::SeqCst);
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(open, Ordering::SeqCst);
        self.log.push(tx_id, "BEGIN", &[]);

        Ok(FakeTransaction {
            _permit: permit,
            tx_id,
            log: self.log.clone(),
            open: self.open.clone(),
            fail_statements: self.fail_statements.clone(),
            finished: false,
        })
    }
}

pub struct FakeTransaction {
    _permit: OwnedSemaphorePermit,
    tx_id: u64,
    log: Arc<FakeLog>,
    open: Arc<AtomicUsize>,
    fail_statements: Arc<AtomicBool>,
    finished: bool,
}

impl FakeTransaction {
    pub fn id(&self) -> u64 {
        self.tx_id
    }
}

#[async_trait]
impl GuardTransaction for FakeTransaction {
    type Row = String;

    async fn execute(&mut self, statement: &str, params: &[SqlParam]) -> Result<u64, DriverError> {
        self.log.push(self.tx_id, statement, params);
        if self.fail_statements.load(Ordering::SeqCst) {
            return Err(DriverError("fake driver: statement failed".to_string()));
        }
        Ok(1)
    }

    async fn fetch_all(
        &mut self,
        statement: &str,
        params: &[SqlParam],
    ) -> Result<Vec<String>, DriverError> {
        self.log.push(self.tx_id, statement, params);
        if self.fail_statements.load(Ordering::SeqCst) {
            return Err(DriverError("fake driver: statement failed".to_string()));
        }
        Ok(Vec::new())
    }

    async fn commit(mut self) -> Result<(), DriverError> {
        self.log.push(self.tx_id, "COMMIT", &[]);
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), DriverError> {
        self.log.push(self.tx_id, "ROLLBACK", &[]);
        self.finished = true;
        Ok(())
    }
}

impl Drop for FakeTransaction {
    fn drop(&mut self) {
        // An abandoned transaction rolls back before the connection can be
        // reused, matching the GuardTransaction drop contract.
        if !self.finished {
            self.log.push(self.tx_id, "ROLLBACK", &[]);
        }
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}
