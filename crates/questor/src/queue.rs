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

//! The queue abstraction workers drain and the dispatcher feeds.
//!
//! `Queue` is deliberately narrow — `send`, `receive`, `empty` — so any
//! transport can back it. [`InMemoryQueue`] is the one concrete
//! implementation this crate ships, built on a notify-driven wakeup rather
//! than busy polling, in the style of the work-distribution notification
//! primitive this module's design is grounded on.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::message::QuestMessage;

/// Errors a queue transport can report. Infrastructure failures (a closed
/// channel, a dropped connection) surface here rather than being folded
/// into a task's recorded error.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct QueueError(pub String);

#[async_trait]
pub trait Queue: Send + Sync {
    /// Enqueues a message for some worker to receive.
    async fn send(&self, message: QuestMessage) -> Result<(), QueueError>;

    /// Waits for and removes the next message. Suspends (without busy
    /// polling) while the queue is empty.
    async fn receive(&self) -> Result<QuestMessage, QueueError>;

    /// Removes and returns the next message if one is immediately
    /// available, or `None` without suspending. Used by a worker's
    /// best-effort `run_once` so an empty queue never parks the caller —
    /// unlike a separate `empty()` check followed by `receive()`, this is
    /// a single atomic step, so a concurrent consumer draining the last
    /// message between the two can never leave this call blocked.
    async fn try_receive(&self) -> Result<Option<QuestMessage>, QueueError>;

    /// Advisory emptiness check used by a worker's drain loop to decide
    /// whether to call `on_idle`.
    async fn empty(&self) -> bool;
}

/// An in-process FIFO queue backed by a `VecDeque`, woken via `Notify`
/// rather than polled.
#[derive(Default)]
pub struct InMemoryQueue {
    messages: Mutex<VecDeque<QuestMessage>>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn send(&self, message: QuestMessage) -> Result<(), QueueError> {
        self.messages.lock().await.push_back(message);
        self.notify.notify_one();
        Ok(())
    }

    async fn receive(&self) -> Result<QuestMessage, QueueError> {
        loop {
            {
                let mut guard = self.messages.lock().await;
                if let Some(message) = guard.pop_front() {
                    return Ok(message);
                }
            }
            self.notify.notified().await;
        }
    }

    async fn try_receive(&self) -> Result<Option<QuestMessage>, QueueError> {
        Ok(self.messages.lock().await.pop_front())
    }

    async fn empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str) -> QuestMessage {
        QuestMessage {
            id: id.to_string(),
            quest: "add".to_string(),
            args: vec![],
            kwargs: serde_json::Map::new(),
            deps: vec![],
        }
    }

    #[tokio::test]
    async fn fifo_order_is_preserved_per_producer() {
        let queue = InMemoryQueue::new();
        queue.send(sample("a")).await.unwrap();
        queue.send(sample("b")).await.unwrap();
        assert_eq!(queue.receive().await.unwrap().id, "a");
        assert_eq!(queue.receive().await.unwrap().id, "b");
        assert!(queue.empty().await);
    }

    #[tokio::test]
    async fn try_receive_returns_none_without_suspending_when_empty() {
        let queue = InMemoryQueue::new();
        assert_eq!(queue.try_receive().await.unwrap(), None);
        queue.send(sample("a")).await.unwrap();
        assert_eq!(queue.try_receive().await.unwrap().map(|m| m.id), Some("a".to_string()));
        assert_eq!(queue.try_receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn receive_suspends_until_a_send_wakes_it() {
        let queue = Arc::new(InMemoryQueue::new());
        let reader = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.receive().await.unwrap() })
        };
        // give the reader a chance to start waiting before we send
        tokio::task::yield_now().await;
        queue.send(sample("late")).await.unwrap();
        let received = reader.await.unwrap();
        assert_eq!(received.id, "late");
    }
}
