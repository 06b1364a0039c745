use super::{PendingRequest, PendingStore};
use crate::framework::core::{RequestId, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Process-local pending store
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<RequestId, PendingRequest>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PendingStore for MemoryStore {
    async fn put(&self, request: &PendingRequest) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries.insert(request.identifier.clone(), request.clone());
        Ok(())
    }

    async fn get(&self, identifier: &RequestId) -> Result<Option<PendingRequest>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries.get(identifier).cloned())
    }

    async fn remove(&self, identifier: &RequestId) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries.remove(identifier);
        Ok(())
    }

    async fn identifiers(&self) -> Result<Vec<RequestId>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries.keys().cloned().collect())
    }

    async fn evict_older_than(&self, cutoff_ms: u64) -> Result<Vec<RequestId>, StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        let expired: Vec<RequestId> = entries
            .iter()
            .filter(|(_, request)| request.stored_at_ms < cutoff_ms)
            .map(|(identifier, _)| identifier.clone())
            .collect();

        for identifier in &expired {
            entries.remove(identifier);
        }
        Ok(expired)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
