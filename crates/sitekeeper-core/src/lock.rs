//! Per-merchant mutual exclusion.
//!
//! Provisioning, reconfiguration, and `domains.json` writes for one merchant
//! run one at a time; different merchants never wait on each other. Locks
//! are in-process only, so a single server instance owns the upload root.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::SiteError;
use crate::merchant::MerchantId;

/// Registry of one async mutex per merchant id.
#[derive(Debug, Default)]
pub struct MerchantLocks {
    locks: Mutex<HashMap<MerchantId, Arc<AsyncMutex<()>>>>,
}

impl MerchantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `merchant`. The guard releases on drop.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Task`] if the registry mutex was poisoned.
    pub async fn acquire(&self, merchant: &MerchantId) -> Result<OwnedMutexGuard<()>, SiteError> {
        let lock = {
            let mut locks = self.locks.lock().map_err(|_| SiteError::Task {
                reason: "merchant lock registry poisoned".to_owned(),
            })?;
            // Entries nobody holds or waits on can go.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(merchant.clone()).or_default())
        };

        Ok(lock.lock_owned().await)
    }

    /// Number of merchants with a live lock entry.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().map_or(0, |locks| locks.len())
    }
}
