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

//! Questor is a background-task library: register named async functions as
//! "quests," compose invocations into dependency graphs by passing one
//! quest's pending context as another's argument, dispatch the graph onto a
//! queue, and let one or more workers execute it to completion against a
//! durable result store.
//!
//! ```ignore
//! use questor::prelude::*;
//!
//! #[quest]
//! async fn add(a: i64, b: i64) -> i64 {
//!     a + b
//! }
//!
//! # async fn run(queue: std::sync::Arc<dyn Queue>, store: std::sync::Arc<dyn Store>) {
//! let c1 = add(1, 2, queue.clone());
//! let c2 = add(5, 10, queue.clone());
//! let root = add(c1, c2, queue.clone());
//!
//! let workflow = Workflow::new(root.cast());
//! workflow.dispatch(Some(store.as_ref())).await.unwrap();
//! # }
//! ```
//!
//! No subscriber is installed by this crate; it only emits `tracing` events,
//! leaving initialization to the application, the same way the engine this
//! crate's worker loop and store layer are modeled on leaves logging setup
//! to its binaries.

pub mod arg;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod queue;
pub mod registry;
pub mod store;
pub mod worker;
pub mod workflow;

#[cfg(feature = "macros")]
pub use questor_macros::quest;

/// Re-exported so `#[quest]`'s generated auto-registration code can name it
/// as `::questor::ctor::ctor` without requiring downstream crates to add
/// their own `ctor` dependency.
#[cfg(feature = "macros")]
pub use ctor;

pub use arg::{scalar_arg, Arg, IntoArg};
pub use config::{StoreConfig, WorkerConfig};
pub use context::QuestContext;
pub use error::{QuestorError, Result};
pub use message::{as_ref_marker, QuestMessage, REF_KEY};
pub use queue::{InMemoryQueue, Queue, QueueError};
pub use registry::{register, register_blocking, QuestDefinition};
pub use store::{MemoryStore, QuestStatus, Store, StoreError, StoreExt, TaskRecord};
#[cfg(feature = "sqlite-store")]
pub use store::SqliteStore;
pub use worker::Worker;
pub use workflow::{ReportedStatus, Workflow};

/// Convenience glob import covering the types most call sites need.
pub mod prelude {
    pub use crate::arg::{scalar_arg, Arg, IntoArg};
    pub use crate::config::{StoreConfig, WorkerConfig};
    pub use crate::context::QuestContext;
    pub use crate::error::{QuestorError, Result};
    pub use crate::queue::{InMemoryQueue, Queue};
    pub use crate::store::{MemoryStore, Store, StoreExt};
    pub use crate::worker::Worker;
    pub use crate::workflow::Workflow;
    #[cfg(feature = "macros")]
    pub use questor_macros::quest;
}
