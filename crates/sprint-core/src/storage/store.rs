use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;
use crate::session::RunRecord;

/// Where finished runs go. The session appends exactly once per run and
/// treats a failed append as non-fatal.
pub trait RunRecordStore: Send {
    fn append(&mut self, record: &RunRecord) -> Result<(), StoreError>;

    fn list(&self) -> Result<Vec<RunRecord>, StoreError>;
}

/// Process-local history. Clones share the same records, so a caller can
/// hand one to a session and read results from another.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<Mutex<Vec<RunRecord>>>,
    rejecting: Arc<AtomicBool>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that fails every append until [`set_rejecting`](Self::set_rejecting)
    /// turns it back on.
    pub fn rejecting() -> Self {
        let store = Self::new();
        store.set_rejecting(true);
        store
    }

    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<RunRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RunRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RunRecordStore for MemoryRecordStore {
    fn append(&mut self, record: &RunRecord) -> Result<(), StoreError> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("history store is offline".into()));
        }
        self.lock().push(record.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<RunRecord>, StoreError> {
        Ok(self.records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsSnapshot;
    use chrono::Utc;

    fn record() -> RunRecord {
        let now = Utc::now();
        RunRecord::finalize(now, now, &MetricsSnapshot::default(), 0)
    }

    #[test]
    fn clones_share_history() {
        let store = MemoryRecordStore::new();
        let mut writer = store.clone();
        writer.append(&record()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn rejecting_store_keeps_nothing() {
        let mut store = MemoryRecordStore::rejecting();
        assert!(matches!(store.append(&record()), Err(StoreError::Rejected(_))));
        assert!(store.is_empty());
        store.set_rejecting(false);
        store.append(&record()).unwrap();
        assert_eq!(store.len(), 1);
    }
}
