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

//! The durable task record store.
//!
//! A [`Store`] is the shared coordination surface between the dispatcher
//! and every worker: it is where PENDING rows are registered, where the
//! dependency gate checks terminal status, and where final results and
//! errors land. Every method is expected to be atomic with respect to
//! concurrent callers — workers never hold an in-memory view of a task
//! record across a suspension point.

pub mod memory;
#[cfg(feature = "sqlite-store")]
mod models;
#[cfg(feature = "sqlite-store")]
mod schema;
#[cfg(feature = "sqlite-store")]
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use memory::MemoryStore;
#[cfg(feature = "sqlite-store")]
pub use sqlite::SqliteStore;

/// The four-state lifecycle of a task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl QuestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, QuestStatus::Success | QuestStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuestStatus::Pending => "PENDING",
            QuestStatus::Running => "RUNNING",
            QuestStatus::Success => "SUCCESS",
            QuestStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(QuestStatus::Pending),
            "RUNNING" => Some(QuestStatus::Running),
            "SUCCESS" => Some(QuestStatus::Success),
            "FAILED" => Some(QuestStatus::Failed),
            _ => None,
        }
    }
}

/// A task record as read back from the store.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: String,
    pub quest_name: String,
    pub status: QuestStatus,
    pub deps: Vec<String>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Errors a store backend can report. Infrastructure failures (connection
/// loss, a corrupt row) surface here; they are the caller's responsibility
/// to retry, not something the core classifies.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StoreError(pub String);

#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a PENDING row. Calling this twice for the same `id` is
    /// undefined behavior for the caller — the dispatcher guarantees it
    /// never happens within one dispatch.
    async fn register(&self, id: &str, quest_name: &str, deps: Vec<String>) -> Result<(), StoreError>;

    /// PENDING → RUNNING.
    async fn mark_running(&self, id: &str) -> Result<(), StoreError>;

    /// Writes the final outcome and sets status to SUCCESS if `error` is
    /// `None`, else FAILED. Idempotent once a task reaches its final state.
    async fn store_result(
        &self,
        id: &str,
        quest_name: &str,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<(), StoreError>;

    async fn fetch_status(&self, id: &str) -> Result<Option<QuestStatus>, StoreError>;

    async fn fetch_record(&self, id: &str) -> Result<Option<TaskRecord>, StoreError>;

    /// Returns the raw stored payload, already self-describing JSON. This
    /// trait stays object-safe (workers hold a `&dyn Store`) so it cannot
    /// decode into a caller-chosen type itself; [`StoreExt::fetch_typed`] is
    /// the layer that consults the registry's return-type descriptor and
    /// decodes.
    async fn fetch_result(&self, id: &str) -> Result<Option<serde_json::Value>, StoreError>;

    async fn exists_terminal(&self, id: &str) -> Result<bool, StoreError>;

    async fn fetch_all(&self) -> Result<Vec<TaskRecord>, StoreError>;
}

/// Typed convenience layer over [`Store`]. `fetch_result` itself deals in
/// `serde_json::Value` so the trait stays object-safe (workers hold a
/// `&dyn Store`); application code that knows the concrete return type of a
/// quest reaches for this instead. It consults the registry for the
/// registered quest's return-type descriptor and cross-checks it against
/// `T` before decoding, the way §4.4 describes — a quest registered under a
/// name this crate has never seen decodes without that check, since there is
/// no descriptor to consult.
#[async_trait]
pub trait StoreExt: Store {
    async fn fetch_typed<T>(&self, id: &str) -> Result<Option<T>, StoreError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let Some(record) = self.fetch_record(id).await? else {
            return Ok(None);
        };
        if let Some(def) = crate::registry::lookup(&record.quest_name).await {
            let requested = std::any::type_name::<T>();
            if def.return_type != requested {
                return Err(StoreError(format!(
                    "quest '{}' is registered with return type '{}', but '{}' was requested",
                    record.quest_name, def.return_type, requested
                )));
            }
        }
        match record.result {
            Some(value) => {
                let decoded = serde_json::from_value(value).map_err(|e| StoreError(e.to_string()))?;
                Ok(Some(decoded))
            }
            None => Ok(None),
        }
    }
}

impl<T: Store + ?Sized> StoreExt for T {}
