use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::BalanceKey;

/// One async mutex per balance key. Holding the guard serializes every
/// balance-affecting operation on that (employee, year) within this process.
#[derive(Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<BalanceKey, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: BalanceKey) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            // Drop slots nobody is holding or waiting on
            slots.retain(|k, slot| *k == key || Arc::strong_count(slot) > 1);
            slots.entry(key).or_default().clone()
        };
        slot.lock_owned().await
    }
}
