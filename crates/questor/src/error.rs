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

//! Error types for the questor workflow execution core.
//!
//! Errors here are caller-facing: they are returned from registry lookups,
//! context construction, dispatch, and the store/queue traits. They are
//! distinct from the per-task `error` string recorded in a task record,
//! which always captures the formatted failure of a quest implementation
//! itself (see [`crate::store::TaskRecord`]).

use thiserror::Error;

/// Errors surfaced by the questor core to its caller.
#[derive(Debug, Error)]
pub enum QuestorError {
    /// No quest is registered under this name.
    #[error("unknown quest: {0}")]
    UnknownQuest(String),

    /// The argument graph reachable from a context contains a cycle.
    #[error("cyclic dependency detected among contexts: {0:?}")]
    CyclicDependency(Vec<String>),

    /// The result store reported a failure (connection loss, corrupt row, etc.).
    #[error("store error: {0}")]
    Store(String),

    /// The queue transport reported a failure.
    #[error("queue error: {0}")]
    Queue(String),

    /// A stored result payload could not be decoded as the requested type.
    #[error("failed to decode result for quest '{quest_name}': {source}")]
    Decode {
        quest_name: String,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded into the wire representation.
    #[error("failed to encode argument: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QuestorError>;
