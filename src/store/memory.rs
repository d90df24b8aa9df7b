//! Reference `MetadataStore` implementation: an in-process `HashMap` behind
//! a `tokio::sync::RwLock`, keyed by the entity's primary key rendered to a
//! string. Used by the binary's default configuration and by tests; not a
//! production SQL backend (spec §1 scopes that layer as an external
//! collaborator).

use super::{ColumnFilter, ColumnValue, Entity, MetadataStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

pub struct InMemoryMetadataStore<E: Entity> {
    rows: RwLock<HashMap<String, E>>,
}

impl<E: Entity> Default for InMemoryMetadataStore<E> {
    fn default() -> Self {
        Self { rows: RwLock::new(HashMap::new()) }
    }
}

impl<E: Entity> InMemoryMetadataStore<E> {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key_string(v: &ColumnValue) -> String {
    v.to_string()
}

fn matches(entity: &dyn Fn(&str) -> Option<ColumnValue>, filter: &ColumnFilter) -> bool {
    filter.iter().all(|(col, want)| entity(col).as_ref() == Some(want))
}

#[async_trait]
impl<E: Entity> MetadataStore<E> for InMemoryMetadataStore<E> {
    async fn find_all(&self) -> Result<Vec<E>, StoreError> {
        Ok(self.rows.read().await.values().cloned().collect())
    }

    async fn find_by_primary_key(&self, key: &ColumnValue) -> Result<Option<E>, StoreError> {
        Ok(self.rows.read().await.get(&key_string(key)).cloned())
    }

    async fn find_by_column_values(&self, filter: &ColumnFilter) -> Result<Vec<E>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|e| matches(&|c| e.column(c), filter))
            .cloned()
            .collect())
    }

    async fn insert(&self, records: Vec<E>) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        for record in &records {
            let key = key_string(&record.primary_key());
            if rows.contains_key(&key) {
                return Err(StoreError::UniqueViolation { table: E::TABLE, key });
            }
        }
        for record in records {
            let key = key_string(&record.primary_key());
            rows.insert(key, record);
        }
        Ok(())
    }

    async fn update(&self, records: Vec<E>) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        for record in &records {
            let key = key_string(&record.primary_key());
            if !rows.contains_key(&key) {
                return Err(StoreError::NotFound { table: E::TABLE, key });
            }
        }
        for record in records {
            let key = key_string(&record.primary_key());
            rows.insert(key, record);
        }
        Ok(())
    }

    async fn delete(&self, records: Vec<E>) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        for record in records {
            rows.remove(&key_string(&record.primary_key()));
        }
        Ok(())
    }
}
