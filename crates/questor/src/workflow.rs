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

//! The user-facing aggregation over a root context.
//!
//! A `Workflow` is a reader and a dispatcher, never an authority: everything
//! it reports about status or result comes straight from the store. It adds
//! exactly one thing the store does not know — the computed `WAITING`
//! distinction for a PENDING task whose dependencies are not yet all
//! terminal.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde_json::Value;

use crate::context::{collect_contexts, QuestContext};
use crate::dispatcher;
use crate::store::{QuestStatus, Store, StoreError};

/// A reported status, extending [`QuestStatus`] with the computed `Waiting`
/// distinction §4.6 describes. Never persisted — `Workflow::statuses`
/// recomputes it on every call from the store's own PENDING/terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedStatus {
    Waiting,
    Pending,
    Running,
    Success,
    Failed,
}

impl fmt::Display for ReportedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportedStatus::Waiting => "WAITING",
            ReportedStatus::Pending => "PENDING",
            ReportedStatus::Running => "RUNNING",
            ReportedStatus::Success => "SUCCESS",
            ReportedStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

fn upgrade(status: QuestStatus, deps_all_terminal: bool) -> ReportedStatus {
    match status {
        QuestStatus::Pending if !deps_all_terminal => ReportedStatus::Waiting,
        QuestStatus::Pending => ReportedStatus::Pending,
        QuestStatus::Running => ReportedStatus::Running,
        QuestStatus::Success => ReportedStatus::Success,
        QuestStatus::Failed => ReportedStatus::Failed,
    }
}

tokio::task_local! {
    /// The workflow a nested dispatch should attach to, if any. Consulted by
    /// `Workflow::dispatch`; absent by default, in which case a dispatch
    /// always walks its own root.
    static ACTIVE_WORKFLOW: QuestContext;
}

/// Wraps a root context and caches the set of contexts reachable from it.
pub struct Workflow {
    root: QuestContext,
    contexts: Vec<QuestContext>,
}

impl Workflow {
    /// Builds a handle around `root`, walking its argument graph once to
    /// cache the reachable context set.
    pub fn new(root: QuestContext) -> Self {
        let mut seen = HashSet::new();
        let contexts = collect_contexts(&root, &mut seen);
        Self { root, contexts }
    }

    pub fn root(&self) -> &QuestContext {
        &self.root
    }

    /// The deduplicated set of contexts reachable from `root`, cached at
    /// construction.
    pub fn contexts(&self) -> &[QuestContext] {
        &self.contexts
    }

    /// Flattens and enqueues this workflow's graph. If called from inside
    /// another workflow's `dispatch` future, attaches to that outer
    /// workflow's root instead of re-walking this one — see
    /// [`Workflow::scope`].
    pub async fn dispatch(&self, store: Option<&dyn Store>) -> crate::error::Result<()> {
        let root = ACTIVE_WORKFLOW
            .try_with(|outer| outer.clone())
            .unwrap_or_else(|_| self.root.clone());
        dispatcher::dispatch(&root, store).await
    }

    /// Runs `f` with this workflow's root registered as the ambient active
    /// workflow, so any nested `Workflow::dispatch` call inside `f` attaches
    /// to this root rather than its own.
    pub async fn scope<F, R>(&self, f: F) -> R
    where
        F: std::future::Future<Output = R>,
    {
        ACTIVE_WORKFLOW.scope(self.root.clone(), f).await
    }

    /// The root context's stored result, or `None` if it has not yet
    /// succeeded (or does not exist in `store`).
    pub async fn result(&self, store: &dyn Store) -> std::result::Result<Option<Value>, StoreError> {
        store.fetch_result(&self.root.id().to_string()).await
    }

    /// Reports each cached context's status, upgrading PENDING to WAITING
    /// per §4.6 when any declared dependency is not yet terminal. Contexts
    /// with no backing task record (not yet dispatched) are omitted.
    pub async fn statuses(
        &self,
        store: &dyn Store,
    ) -> std::result::Result<HashMap<String, ReportedStatus>, StoreError> {
        let mut out = HashMap::with_capacity(self.contexts.len());
        for ctx in &self.contexts {
            let id = ctx.id().to_string();
            let Some(record) = store.fetch_record(&id).await? else {
                continue;
            };
            let mut deps_all_terminal = true;
            for dep in &record.deps {
                if !store.exists_terminal(dep).await? {
                    deps_all_terminal = false;
                    break;
                }
            }
            out.insert(id, upgrade(record.status, deps_all_terminal));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arg::IntoArg;
    use crate::queue::{InMemoryQueue, Queue};
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn queue() -> Arc<dyn Queue> {
        Arc::new(InMemoryQueue::new())
    }

    #[tokio::test]
    async fn statuses_reports_waiting_for_pending_dependents() {
        let q = queue();
        let leaf1: QuestContext = QuestContext::new("add", vec![], vec![], q.clone());
        let leaf2: QuestContext = QuestContext::new("add", vec![], vec![], q.clone());
        let root: QuestContext = QuestContext::new(
            "add",
            vec![leaf1.clone().into_arg(), leaf2.clone().into_arg()],
            vec![],
            q.clone(),
        );

        let workflow = Workflow::new(root.clone());
        assert_eq!(workflow.contexts().len(), 3);

        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        workflow.dispatch(Some(store.as_ref())).await.unwrap();

        let statuses = workflow.statuses(store.as_ref()).await.unwrap();
        assert_eq!(
            statuses.get(&leaf1.id().to_string()),
            Some(&ReportedStatus::Pending)
        );
        assert_eq!(
            statuses.get(&root.id().to_string()),
            Some(&ReportedStatus::Waiting)
        );
    }

    #[tokio::test]
    async fn scope_attaches_nested_dispatch_to_outer_root() {
        let q = queue();
        let inner: QuestContext = QuestContext::new("add", vec![], vec![], q.clone());
        let outer = Workflow::new(inner.clone());
        let nested = Workflow::new(QuestContext::new("add", vec![], vec![], q.clone()));

        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        outer
            .scope(async {
                nested.dispatch(Some(store.as_ref())).await.unwrap();
            })
            .await;

        // the nested dispatch attached to the outer root, not its own
        assert!(store
            .fetch_status(&inner.id().to_string())
            .await
            .unwrap()
            .is_some());
        assert!(store
            .fetch_status(&nested.root().id().to_string())
            .await
            .unwrap()
            .is_none());
    }
}
