use async_trait::async_trait;
use model::{MutationRecord, RecordKey};
use state::{RecordStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type TableRows = HashMap<String, HashMap<RecordKey, MutationRecord>>;

/// Store keeping every table in memory, for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    tables: Arc<Mutex<TableRows>>,
}

impl InMemoryRecordStore {
    pub fn get_record(&self, table: &str, key: &RecordKey) -> Option<MutationRecord> {
        self.lock().get(table)?.get(key).cloned()
    }

    /// All records of a table, ordered by key.
    pub fn records(&self, table: &str) -> Vec<MutationRecord> {
        let mut records: Vec<MutationRecord> = self
            .lock()
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by_key(MutationRecord::key);

        records
    }

    fn lock(&self) -> MutexGuard<'_, TableRows> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn put_record(&self, table: &str, record: &MutationRecord) -> Result<(), StoreError> {
        self.lock()
            .entry(table.to_string())
            .or_default()
            .insert(record.key(), record.clone());

        Ok(())
    }
}
