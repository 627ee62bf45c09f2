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

//! The worker: the loop that turns a dequeued message into a terminal task
//! record.
//!
//! Any number of workers may run this loop concurrently over the same
//! queue and store. None of the suspension points inside `handle_message`
//! — dequeue, any store call, argument resolution, quest execution — hold
//! a process-wide lock; the dependency gate (re-enqueue until every
//! dependency is terminal) is what keeps a worker pool dependency-respecting
//! without one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::message::{as_ref_marker, QuestMessage};
use crate::queue::Queue;
use crate::registry;
use crate::store::{Store, StoreError};

/// A single worker draining `queue`, consulting and writing to `store`.
pub struct Worker {
    queue: Arc<dyn Queue>,
    store: Arc<dyn Store>,
    config: WorkerConfig,
    stopped: AtomicBool,
}

impl Worker {
    pub fn new(queue: Arc<dyn Queue>, store: Arc<dyn Store>) -> Self {
        Self::with_config(queue, store, WorkerConfig::default())
    }

    pub fn with_config(queue: Arc<dyn Queue>, store: Arc<dyn Store>, config: WorkerConfig) -> Self {
        Self {
            queue,
            store,
            config,
            stopped: AtomicBool::new(false),
        }
    }

    /// Requests cooperative shutdown. Checked between messages; an
    /// in-flight message is always fully processed before this takes
    /// effect.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Processes at most one message, best-effort. Returns immediately if
    /// the queue is currently empty, without ever suspending — a separate
    /// `empty()` check followed by `receive()` would leave a race where a
    /// concurrent worker drains the last message in between, parking this
    /// call inside `receive()` until some later message arrives.
    pub async fn run_once(&self) -> Result<(), StoreError> {
        let message = self
            .queue
            .try_receive()
            .await
            .map_err(|e| StoreError(e.to_string()))?;
        match message {
            Some(message) => self.handle_message(message).await,
            None => Ok(()),
        }
    }

    /// Loops until `stop()` is called, yielding via `on_idle` whenever the
    /// queue drains empty.
    pub async fn run_forever(&self) -> Result<(), StoreError> {
        while !self.is_stopped() {
            self.run_once().await?;
            if self.queue.empty().await {
                self.on_idle().await;
            }
        }
        Ok(())
    }

    /// Called whenever the queue is observed empty. The default yields the
    /// scheduler (optionally after `config.idle_delay`) rather than busy
    /// polling.
    async fn on_idle(&self) {
        if self.config.idle_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.config.idle_delay).await;
        }
    }

    async fn handle_message(&self, message: QuestMessage) -> Result<(), StoreError> {
        let Some(def) = registry::lookup(&message.quest).await else {
            warn!(task_id = %message.id, quest = %message.quest, "unknown quest");
            self.store
                .store_result(
                    &message.id,
                    &message.quest,
                    None,
                    Some(format!("Unknown quest: {}", message.quest)),
                )
                .await?;
            return Ok(());
        };

        for dep in &message.deps {
            if !self.store.exists_terminal(dep).await? {
                debug!(task_id = %message.id, dep = %dep, "dependency not yet terminal, re-enqueuing");
                self.queue
                    .send(message)
                    .await
                    .map_err(|e| StoreError(e.to_string()))?;
                tokio::task::yield_now().await;
                return Ok(());
            }
        }

        let mut args = Vec::with_capacity(message.args.len());
        for value in &message.args {
            args.push(self.resolve(value).await?);
        }
        let mut kwargs = serde_json::Map::new();
        for (key, value) in &message.kwargs {
            kwargs.insert(key.clone(), self.resolve(value).await?);
        }

        self.store.mark_running(&message.id).await?;
        debug!(task_id = %message.id, quest = %message.quest, "executing quest");

        match (def.implementation)(args, kwargs).await {
            Ok(value) => {
                self.store
                    .store_result(&message.id, &message.quest, Some(value), None)
                    .await?;
            }
            Err(error) => {
                warn!(task_id = %message.id, quest = %message.quest, error = %error, "quest failed");
                self.store
                    .store_result(&message.id, &message.quest, None, Some(error))
                    .await?;
            }
        }

        Ok(())
    }

    /// Recursively replaces `{__ref__: id}` markers with the referenced
    /// task's stored result, preserving container shape. A reference to a
    /// dependency whose result is absent (typically a FAILED dependency)
    /// resolves to `null`; quest implementations that cannot proceed with a
    /// null argument simply fail, producing their own FAILED record.
    async fn resolve(&self, value: &Value) -> Result<Value, StoreError> {
        if let Some(id) = as_ref_marker(value) {
            return Ok(self.store.fetch_result(id).await?.unwrap_or(Value::Null));
        }
        match value {
            Value::Array(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.push(Box::pin(self.resolve(item)).await?);
                }
                Ok(Value::Array(resolved))
            }
            Value::Object(map) => {
                let mut resolved = serde_json::Map::new();
                for (k, v) in map {
                    resolved.insert(k.clone(), Box::pin(self.resolve(v)).await?);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryQueue;
    use crate::registry::QuestDefinition;
    use crate::store::MemoryStore;
    use std::sync::Arc as StdArc;

    fn add_def() -> QuestDefinition {
        QuestDefinition {
            name: "worker_test_add".to_string(),
            parameter_names: vec!["a".to_string(), "b".to_string()],
            kwarg_names: vec![],
            return_type: std::any::type_name::<i64>(),
            implementation: StdArc::new(|args, _kwargs| {
                Box::pin(async move {
                    let a = args[0].as_i64().ok_or("expected integer")?;
                    let b = args[1].as_i64().ok_or("expected integer")?;
                    Ok(Value::from(a + b))
                })
            }),
        }
    }

    fn failing_def() -> QuestDefinition {
        QuestDefinition {
            name: "worker_test_fail".to_string(),
            parameter_names: vec![],
            kwarg_names: vec![],
            return_type: std::any::type_name::<()>(),
            implementation: StdArc::new(|_args, _kwargs| Box::pin(async move { Err("boom".to_string()) })),
        }
    }

    #[tokio::test]
    async fn unknown_quest_fails_with_message() {
        registry::register(add_def()).await;
        let queue: Arc<dyn Queue> = Arc::new(InMemoryQueue::new());
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        store.register("t1", "does_not_exist", vec![]).await.unwrap();
        queue
            .send(QuestMessage {
                id: "t1".to_string(),
                quest: "does_not_exist".to_string(),
                args: vec![],
                kwargs: serde_json::Map::new(),
                deps: vec![],
            })
            .await
            .unwrap();

        let worker = Worker::new(queue, store.clone());
        worker.run_once().await.unwrap();

        let record = store.fetch_record("t1").await.unwrap().unwrap();
        assert_eq!(record.error.as_deref(), Some("Unknown quest: does_not_exist"));
    }

    #[tokio::test]
    async fn dependency_gate_reenqueues_until_terminal() {
        registry::register(add_def()).await;
        let queue: Arc<dyn Queue> = Arc::new(InMemoryQueue::new());
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());

        store.register("dep", "worker_test_add", vec![]).await.unwrap();
        store
            .register("dependent", "worker_test_add", vec!["dep".to_string()])
            .await
            .unwrap();

        queue
            .send(QuestMessage {
                id: "dependent".to_string(),
                quest: "worker_test_add".to_string(),
                args: vec![Value::from(1), Value::from(2)],
                kwargs: serde_json::Map::new(),
                deps: vec!["dep".to_string()],
            })
            .await
            .unwrap();

        let worker = Worker::new(queue.clone(), store.clone());
        worker.run_once().await.unwrap();

        // dependency not terminal yet: task stays pending, message re-enqueued
        assert_eq!(
            store.fetch_status("dependent").await.unwrap(),
            Some(crate::store::QuestStatus::Pending)
        );
        assert!(!queue.empty().await);

        store
            .store_result("dep", "worker_test_add", Some(Value::from(3)), None)
            .await
            .unwrap();

        worker.run_once().await.unwrap();
        assert_eq!(
            store.fetch_result("dependent").await.unwrap(),
            Some(Value::from(3))
        );
    }

    #[tokio::test]
    async fn implementation_failure_is_captured_as_failed() {
        registry::register(failing_def()).await;
        let queue: Arc<dyn Queue> = Arc::new(InMemoryQueue::new());
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        store.register("t2", "worker_test_fail", vec![]).await.unwrap();
        queue
            .send(QuestMessage {
                id: "t2".to_string(),
                quest: "worker_test_fail".to_string(),
                args: vec![],
                kwargs: serde_json::Map::new(),
                deps: vec![],
            })
            .await
            .unwrap();

        Worker::new(queue, store.clone()).run_once().await.unwrap();

        let record = store.fetch_record("t2").await.unwrap().unwrap();
        assert_eq!(record.status, crate::store::QuestStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn run_forever_stops_after_stop_is_called() {
        let queue: Arc<dyn Queue> = Arc::new(InMemoryQueue::new());
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let worker = Arc::new(Worker::new(queue, store));

        let handle = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run_forever().await })
        };
        tokio::task::yield_now().await;
        worker.stop();
        handle.await.unwrap().unwrap();
    }
}
