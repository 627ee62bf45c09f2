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

//! The process-wide quest registry.
//!
//! Registration is expected to happen once, during application start-up,
//! before any worker begins draining the queue — the registry is then
//! treated as read-only for the remainder of the process, so the mutex
//! guarding it sees no contention on the hot path.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value;
use tokio::sync::Mutex;

/// The boxed, type-erased form a quest implementation is stored under once
/// registered: resolved positional arguments in, a JSON result or a
/// formatted error out.
pub type QuestFuture = Pin<Box<dyn Future<Output = Result<Value, String>> + Send>>;
pub type QuestFn = Arc<dyn Fn(Vec<Value>, serde_json::Map<String, Value>) -> QuestFuture + Send + Sync>;

/// A registered quest: its name, implementation, positional and named
/// parameter signature, and a return-type descriptor. The descriptor is a
/// `std::any::type_name` rendering of the quest's declared return type,
/// stored so `StoreExt::fetch_typed` can cross-check the type a caller asks
/// to decode a result as against the type the quest actually returns.
#[derive(Clone)]
pub struct QuestDefinition {
    pub name: String,
    pub parameter_names: Vec<String>,
    pub kwarg_names: Vec<String>,
    pub return_type: &'static str,
    pub implementation: QuestFn,
}

static QUEST_REGISTRY: Lazy<Mutex<HashMap<String, QuestDefinition>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Registers (or replaces) a quest definition under `name`. Redefining a
/// name replaces the prior entry; callers must not rely on registration
/// order across distinct quests.
pub async fn register(def: QuestDefinition) {
    let mut registry = QUEST_REGISTRY.lock().await;
    registry.insert(def.name.clone(), def);
}

/// Synchronous registration helper for use from non-async contexts, such as
/// the `#[quest]` macro's generated startup code.
pub fn register_blocking(def: QuestDefinition) {
    QUEST_REGISTRY.blocking_lock().insert(def.name.clone(), def);
}

/// Looks up a quest by name. Lookup is total: it either returns the
/// definition or `None` — the caller (the worker) is responsible for
/// turning a miss into the "unknown quest" terminal task outcome.
pub async fn lookup(name: &str) -> Option<QuestDefinition> {
    QUEST_REGISTRY.lock().await.get(name).cloned()
}

/// True if a quest is registered under `name`. Useful for `statuses()`-style
/// read paths that do not need the implementation itself.
pub async fn contains(name: &str) -> bool {
    QUEST_REGISTRY.lock().await.contains_key(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trivial_def(name: &str) -> QuestDefinition {
        QuestDefinition {
            name: name.to_string(),
            parameter_names: vec![],
            kwarg_names: vec![],
            return_type: std::any::type_name::<Value>(),
            implementation: Arc::new(|_args, _kwargs| Box::pin(async { Ok(Value::Null) })),
        }
    }

    #[tokio::test]
    async fn register_then_lookup_round_trips() {
        register(trivial_def("registry_test_quest_a")).await;
        assert!(contains("registry_test_quest_a").await);
        assert!(lookup("registry_test_quest_a").await.is_some());
    }

    #[tokio::test]
    async fn redefining_a_name_replaces_the_entry() {
        register(trivial_def("registry_test_quest_b")).await;
        let mut replacement = trivial_def("registry_test_quest_b");
        replacement.parameter_names = vec!["x".to_string()];
        register(replacement).await;

        let def = lookup("registry_test_quest_b").await.unwrap();
        assert_eq!(def.parameter_names, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn unknown_quest_lookup_is_none() {
        assert!(lookup("registry_test_definitely_unregistered").await.is_none());
    }
}
