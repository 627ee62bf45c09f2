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

//! The wire form a dispatched context takes once it leaves the dispatcher
//! and enters the queue.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One flattened unit of dispatch: everything a worker needs to attempt a
/// quest, with nested contexts already rewritten to reference markers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestMessage {
    pub id: String,
    pub quest: String,
    pub args: Vec<Value>,
    pub kwargs: serde_json::Map<String, Value>,
    pub deps: Vec<String>,
}

/// The literal key a resolved reference marker carries its target id under.
pub const REF_KEY: &str = "__ref__";

/// Returns the id embedded in a `{__ref__: <id>}` marker, if `value` is one.
pub fn as_ref_marker(value: &Value) -> Option<&str> {
    value.as_object()?.get(REF_KEY)?.as_str()
}
