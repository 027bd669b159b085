use std::sync::{Arc, PoisonError, RwLock};

use log::{error, info, warn};
use tokio::sync::Mutex;

use crate::error::ReloadError;
use crate::loader::RateSource;
use crate::rate_table::RateTable;

/// Holds the current rate table. Readers take a snapshot and query it
/// lock-free; a reload replaces the whole table in one swap.
#[derive(Debug)]
pub struct RateStore {
    current: RwLock<Arc<RateTable>>,
    reloading: Mutex<()>,
}

impl RateStore {
    pub fn new(table: RateTable) -> Self {
        Self {
            current: RwLock::new(Arc::new(table)),
            reloading: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<RateTable> {
        // The guarded value is only ever replaced whole, so a poisoned lock
        // still holds a complete table.
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn replace(&self, table: RateTable) -> Arc<RateTable> {
        let table = Arc::new(table);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::clone(&table);
        table
    }

    /// Loads a fresh table and swaps it in. On failure the previous table
    /// stays in place. Only one reload runs at a time; a second caller gets
    /// `ReloadError::InProgress` instead of starting another download.
    pub async fn reload(&self, source: &RateSource) -> Result<Arc<RateTable>, ReloadError> {
        let Ok(_running) = self.reloading.try_lock() else {
            warn!("Rate table reload already in progress");
            return Err(ReloadError::InProgress);
        };

        match source.load().await {
            Ok(table) => {
                let table = self.replace(table);
                info!("Rate table reloaded from {}", source.location());
                Ok(table)
            }
            Err(e) => {
                error!("Rate table reload failed, keeping previous table: {}", e);
                Err(e.into())
            }
        }
    }
}
