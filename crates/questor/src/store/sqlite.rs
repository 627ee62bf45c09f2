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

//! A durable, SQLite-backed `Store` implementation.
//!
//! Connections are pooled with `deadpool-diesel`, so the synchronous
//! `diesel` calls each operation makes run inside `spawn_blocking` via
//! `.interact()` rather than blocking an async worker thread — the same
//! shape the context DAL this module is grounded on uses for its CRUD
//! operations.

use chrono::Utc;
use deadpool_diesel::sqlite::{Manager, Pool, Runtime};
use diesel::prelude::*;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use super::models::{DbTaskRecord, NewDbTaskRecord};
use super::schema::tasks;
use super::{QuestStatus, Store, StoreError, TaskRecord};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// A connection-pooled SQLite store.
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    /// Opens (or creates) the SQLite database at `database_url` — a file
    /// path, or `:memory:` — and runs any pending migrations.
    pub async fn connect(database_url: &str, pool_size: usize) -> Result<Self, StoreError> {
        let manager = Manager::new(database_url, Runtime::Tokio1);
        let pool = Pool::builder(manager)
            .max_size(pool_size)
            .build()
            .map_err(|e| StoreError(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.pool.get().await.map_err(|e| StoreError(e.to_string()))?;
        conn.interact(|conn| conn.run_pending_migrations(MIGRATIONS).map(|_| ()))
            .await
            .map_err(|e| StoreError(e.to_string()))?
            .map_err(|e| StoreError(e.to_string()))?;
        Ok(())
    }
}

fn to_task_record(row: DbTaskRecord) -> Result<TaskRecord, StoreError> {
    let status =
        QuestStatus::parse(&row.status).ok_or_else(|| StoreError(format!("unrecognized status '{}'", row.status)))?;
    let deps: Vec<String> =
        serde_json::from_str(&row.deps).map_err(|e| StoreError(format!("corrupt deps column: {e}")))?;
    let result = row
        .result
        .map(|r| serde_json::from_str(&r))
        .transpose()
        .map_err(|e| StoreError(format!("corrupt result column: {e}")))?;
    let timestamp = chrono::DateTime::parse_from_rfc3339(&row.timestamp)
        .map_err(|e| StoreError(format!("corrupt timestamp column: {e}")))?
        .with_timezone(&Utc);

    Ok(TaskRecord {
        id: row.id,
        quest_name: row.quest_name,
        status,
        deps,
        result,
        error: row.error,
        timestamp,
    })
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    async fn register(&self, id: &str, quest_name: &str, deps: Vec<String>) -> Result<(), StoreError> {
        let new_row = NewDbTaskRecord {
            id: id.to_string(),
            quest_name: quest_name.to_string(),
            status: QuestStatus::Pending.as_str().to_string(),
            deps: serde_json::to_string(&deps).map_err(|e| StoreError(e.to_string()))?,
            timestamp: Utc::now().to_rfc3339(),
        };
        let conn = self.pool.get().await.map_err(|e| StoreError(e.to_string()))?;
        conn.interact(move |conn| {
            diesel::insert_into(tasks::table)
                .values(&new_row)
                .execute(conn)
        })
        .await
        .map_err(|e| StoreError(e.to_string()))?
        .map_err(|e| StoreError(e.to_string()))?;
        Ok(())
    }

    async fn mark_running(&self, id: &str) -> Result<(), StoreError> {
        let id = id.to_string();
        let now = Utc::now().to_rfc3339();
        let conn = self.pool.get().await.map_err(|e| StoreError(e.to_string()))?;
        conn.interact(move |conn| {
            diesel::update(tasks::table.find(id))
                .set((
                    tasks::status.eq(QuestStatus::Running.as_str()),
                    tasks::timestamp.eq(now),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| StoreError(e.to_string()))?
        .map_err(|e| StoreError(e.to_string()))?;
        Ok(())
    }

    async fn store_result(
        &self,
        id: &str,
        _quest_name: &str,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let status = if error.is_none() {
            QuestStatus::Success
        } else {
            QuestStatus::Failed
        };
        let id = id.to_string();
        let now = Utc::now().to_rfc3339();
        let result_text = result.map(|v| v.to_string());

        let conn = self.pool.get().await.map_err(|e| StoreError(e.to_string()))?;
        conn.interact(move |conn| {
            diesel::update(tasks::table.find(id))
                .set((
                    tasks::status.eq(status.as_str()),
                    tasks::result.eq(result_text),
                    tasks::error.eq(error),
                    tasks::timestamp.eq(now),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| StoreError(e.to_string()))?
        .map_err(|e| StoreError(e.to_string()))?;
        Ok(())
    }

    async fn fetch_status(&self, id: &str) -> Result<Option<QuestStatus>, StoreError> {
        Ok(self.fetch_record(id).await?.map(|r| r.status))
    }

    async fn fetch_record(&self, id: &str) -> Result<Option<TaskRecord>, StoreError> {
        let id = id.to_string();
        let conn = self.pool.get().await.map_err(|e| StoreError(e.to_string()))?;
        let row: Option<DbTaskRecord> = conn
            .interact(move |conn| tasks::table.find(id).first(conn).optional())
            .await
            .map_err(|e| StoreError(e.to_string()))?
            .map_err(|e| StoreError(e.to_string()))?;
        row.map(to_task_record).transpose()
    }

    async fn fetch_result(&self, id: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.fetch_record(id).await?.and_then(|r| r.result))
    }

    async fn exists_terminal(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .fetch_status(id)
            .await?
            .map(|s| s.is_terminal())
            .unwrap_or(false))
    }

    async fn fetch_all(&self) -> Result<Vec<TaskRecord>, StoreError> {
        let conn = self.pool.get().await.map_err(|e| StoreError(e.to_string()))?;
        let rows: Vec<DbTaskRecord> = conn
            .interact(|conn| tasks::table.load(conn))
            .await
            .map_err(|e| StoreError(e.to_string()))?
            .map_err(|e| StoreError(e.to_string()))?;
        rows.into_iter().map(to_task_record).collect()
    }
}
