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

//! Flattens a root context's argument graph into queue messages.
//!
//! The traversal is post-order: a context's own message is appended only
//! after every context nested in its arguments has already contributed its
//! message, so a dependency is always emitted (and therefore registered and
//! enqueued) before its dependent.

use std::collections::HashSet;

use tracing::debug;

use crate::context::QuestContext;
use crate::error::{QuestorError, Result};
use crate::message::QuestMessage;
use crate::store::Store;

/// Post-order walk producing one message per distinct context id, collected
/// into `messages` as they are first completed. `seen` is threaded through
/// recursive calls so a context referenced from more than one place still
/// contributes exactly one message.
pub(crate) fn collect_messages(ctx: &QuestContext, seen: &mut HashSet<String>) -> Vec<QuestMessage> {
    let mut messages = Vec::new();
    let mut deps = HashSet::new();

    let args: Vec<_> = ctx
        .args()
        .iter()
        .map(|arg| {
            arg.collect_deps(seen, &mut deps, &mut messages);
            arg.to_wire()
        })
        .collect();

    let mut kwargs = serde_json::Map::new();
    for (key, arg) in ctx.kwargs() {
        arg.collect_deps(seen, &mut deps, &mut messages);
        kwargs.insert(key.clone(), arg.to_wire());
    }

    let id = ctx.id().to_string();
    if seen.insert(id.clone()) {
        messages.push(QuestMessage {
            id,
            quest: ctx.quest_name().to_string(),
            args,
            kwargs,
            deps: deps.into_iter().collect(),
        });
    }

    messages
}

/// Flattens `quest` and its dependency graph into messages, registers each
/// as a PENDING task record in `store` (if provided), and enqueues every
/// message onto the context's own queue. Registration always completes
/// before the corresponding message is sent, so a worker can never dequeue
/// a message with no backing record.
///
/// Returns without waiting for any message to be processed.
pub async fn dispatch(quest: &QuestContext, store: Option<&dyn Store>) -> Result<()> {
    quest.validate_acyclic()?;

    let queue = quest.queue().clone();
    let mut seen = HashSet::new();
    let messages = collect_messages(quest, &mut seen);

    debug!(
        root_id = %quest.id(),
        quest = quest.quest_name(),
        message_count = messages.len(),
        "dispatching quest graph"
    );

    if let Some(store) = store {
        for msg in &messages {
            store
                .register(&msg.id, &msg.quest, msg.deps.clone())
                .await
                .map_err(|e| QuestorError::Store(e.to_string()))?;
        }
    }

    for msg in messages {
        queue
            .send(msg)
            .await
            .map_err(|e| QuestorError::Queue(e.to_string()))?;
    }

    Ok(())
}
