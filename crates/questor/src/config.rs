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

//! Ambient configuration for worker and store behavior.

use std::time::Duration;

/// Governs a worker's idle behavior between drain attempts.
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// How long the default `on_idle` hook sleeps when the queue is empty.
    /// Zero (the default) matches the original protocol's bare scheduler
    /// yield; a small positive value bounds busy-looping under re-enqueue
    /// churn at the cost of added latency before a newly-ready task runs.
    pub idle_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_delay: Duration::ZERO,
        }
    }
}

impl WorkerConfig {
    pub fn with_idle_delay(idle_delay: Duration) -> Self {
        Self { idle_delay }
    }
}

/// Connection parameters for the SQLite-backed store, mirroring the
/// teacher's `Database::new(url, name, pool_size)` constructor shape minus
/// the PostgreSQL-only schema name this single-backend store has no use
/// for. `database_url` may also be supplied via the `QUESTOR_DATABASE_URL`
/// environment variable (loaded through `dotenvy` if a `.env` file is
/// present), which `StoreConfig::from_env` reads.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub pool_size: usize,
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>, pool_size: usize) -> Self {
        Self {
            database_url: database_url.into(),
            pool_size,
        }
    }

    /// Reads `QUESTOR_DATABASE_URL` (falling back to `:memory:`) and
    /// `QUESTOR_POOL_SIZE` (falling back to 5) from the environment, after
    /// loading a `.env` file if one is present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let database_url =
            std::env::var("QUESTOR_DATABASE_URL").unwrap_or_else(|_| ":memory:".to_string());
        let pool_size = std::env::var("QUESTOR_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        Self {
            database_url,
            pool_size,
        }
    }
}
