/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! An in-process store backed by a mutex-guarded map. Used by tests and by
//! applications that have no need for durability beyond the lifetime of
//! the process.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{QuestStatus, Store, StoreError, TaskRecord};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, TaskRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn register(&self, id: &str, quest_name: &str, deps: Vec<String>) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        records.insert(
            id.to_string(),
            TaskRecord {
                id: id.to_string(),
                quest_name: quest_name.to_string(),
                status: QuestStatus::Pending,
                deps,
                result: None,
                error: None,
                timestamp: Utc::now(),
            },
        );
        Ok(())
    }

    async fn mark_running(&self, id: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(id) {
            record.status = QuestStatus::Running;
            record.timestamp = Utc::now();
        }
        Ok(())
    }

    async fn store_result(
        &self,
        id: &str,
        quest_name: &str,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let status = if error.is_none() {
            QuestStatus::Success
        } else {
            QuestStatus::Failed
        };
        let mut records = self.records.lock().await;
        let entry = records.entry(id.to_string()).or_insert_with(|| TaskRecord {
            id: id.to_string(),
            quest_name: quest_name.to_string(),
            status: QuestStatus::Pending,
            deps: vec![],
            result: None,
            error: None,
            timestamp: Utc::now(),
        });
        entry.status = status;
        entry.result = result;
        entry.error = error;
        entry.timestamp = Utc::now();
        Ok(())
    }

    async fn fetch_status(&self, id: &str) -> Result<Option<QuestStatus>, StoreError> {
        Ok(self.records.lock().await.get(id).map(|r| r.status))
    }

    async fn fetch_record(&self, id: &str) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.records.lock().await.get(id).cloned())
    }

    async fn fetch_result(&self, id: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.records.lock().await.get(id).and_then(|r| r.result.clone()))
    }

    async fn exists_terminal(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .records
            .lock()
            .await
            .get(id)
            .map(|r| r.status.is_terminal())
            .unwrap_or(false))
    }

    async fn fetch_all(&self) -> Result<Vec<TaskRecord>, StoreError> {
        Ok(self.records.lock().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_store_result_transitions_to_terminal() {
        let store = MemoryStore::new();
        store.register("a", "add", vec![]).await.unwrap();
        assert_eq!(store.fetch_status("a").await.unwrap(), Some(QuestStatus::Pending));
        assert!(!store.exists_terminal("a").await.unwrap());

        store.mark_running("a").await.unwrap();
        assert_eq!(store.fetch_status("a").await.unwrap(), Some(QuestStatus::Running));

        store
            .store_result("a", "add", Some(serde_json::json!(3)), None)
            .await
            .unwrap();
        assert!(store.exists_terminal("a").await.unwrap());
        assert_eq!(store.fetch_result("a").await.unwrap(), Some(serde_json::json!(3)));
    }

    #[tokio::test]
    async fn store_result_with_error_sets_failed() {
        let store = MemoryStore::new();
        store.register("a", "add", vec![]).await.unwrap();
        store
            .store_result("a", "add", None, Some("boom".to_string()))
            .await
            .unwrap();
        let record = store.fetch_record("a").await.unwrap().unwrap();
        assert_eq!(record.status, QuestStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("boom"));
        assert!(record.result.is_none());
    }

    #[tokio::test]
    async fn fetch_result_of_unknown_id_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.fetch_result("missing").await.unwrap(), None);
    }
}
