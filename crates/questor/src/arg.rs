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

//! The `Arg` tagged value, the common representation shared by quest
//! arguments, dispatch-time serialization, and worker-side resolution.
//!
//! Rather than inspecting a dynamically typed value at runtime to decide
//! whether it is a nested quest, scalar data, or a container, arguments are
//! built as this explicit sum type up front. The dispatcher's serialization
//! fold and the worker's resolution fold both walk the same shape.

use crate::context::QuestContext;
use serde::Serialize;
use serde_json::Value;

/// One argument (or one value nested inside an argument) passed to a quest.
#[derive(Debug, Clone)]
pub enum Arg {
    /// Plain data with no further quests nested inside it.
    Scalar(Value),
    /// An ordered sequence that may itself contain nested quests.
    Sequence(Vec<Arg>),
    /// A string-keyed map that may itself contain nested quests.
    Mapping(Vec<(String, Arg)>),
    /// A reference to another context's not-yet-computed result.
    QuestRef(QuestContext),
}

impl Arg {
    /// Serializes this argument to its wire form, replacing any nested
    /// [`QuestContext`] with the `{__ref__: <id>}` reference marker and
    /// preserving container shape otherwise.
    pub fn to_wire(&self) -> Value {
        match self {
            Arg::Scalar(v) => v.clone(),
            Arg::Sequence(items) => Value::Array(items.iter().map(Arg::to_wire).collect()),
            Arg::Mapping(entries) => {
                let map = entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_wire()))
                    .collect();
                Value::Object(map)
            }
            Arg::QuestRef(ctx) => {
                let mut map = serde_json::Map::new();
                map.insert("__ref__".to_string(), Value::String(ctx.id().to_string()));
                Value::Object(map)
            }
        }
    }

    /// Collects the immediate (non-transitive) dependency ids nested
    /// directly inside this argument, and recursively emits dispatch
    /// messages for any nested contexts via `sink`.
    pub(crate) fn collect_deps(
        &self,
        seen: &mut std::collections::HashSet<String>,
        deps: &mut std::collections::HashSet<String>,
        messages: &mut Vec<crate::message::QuestMessage>,
    ) {
        match self {
            Arg::Scalar(_) => {}
            Arg::Sequence(items) => {
                for item in items {
                    item.collect_deps(seen, deps, messages);
                }
            }
            Arg::Mapping(entries) => {
                for (_, v) in entries {
                    v.collect_deps(seen, deps, messages);
                }
            }
            Arg::QuestRef(ctx) => {
                messages.extend(crate::dispatcher::collect_messages(ctx, seen));
                deps.insert(ctx.id().to_string());
            }
        }
    }
}

/// Converts a Rust value into an [`Arg`], the entry point quest wrapper
/// functions use to accept both plain data and nested quest contexts
/// uniformly.
pub trait IntoArg {
    fn into_arg(self) -> Arg;
}

impl IntoArg for QuestContext {
    fn into_arg(self) -> Arg {
        Arg::QuestRef(self)
    }
}

impl IntoArg for Arg {
    fn into_arg(self) -> Arg {
        self
    }
}

/// Blanket conversion for any plain, serializable value. `QuestContext` gets
/// its own impl above so passing a context is never mistaken for scalar
/// data.
macro_rules! impl_into_arg_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            impl IntoArg for $t {
                fn into_arg(self) -> Arg {
                    Arg::Scalar(serde_json::to_value(self).expect("primitive serialization cannot fail"))
                }
            }
        )*
    };
}

impl_into_arg_scalar!(
    i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, bool, String, char
);

impl IntoArg for &str {
    fn into_arg(self) -> Arg {
        Arg::Scalar(Value::String(self.to_string()))
    }
}

impl<T: IntoArg> IntoArg for Vec<T> {
    fn into_arg(self) -> Arg {
        Arg::Sequence(self.into_iter().map(IntoArg::into_arg).collect())
    }
}

impl<T: IntoArg> IntoArg for Option<T> {
    fn into_arg(self) -> Arg {
        match self {
            Some(v) => v.into_arg(),
            None => Arg::Scalar(Value::Null),
        }
    }
}

/// Wraps an arbitrary serializable struct as a scalar argument. Use this for
/// application-defined model types (the macro-generated wrappers reach for
/// it automatically); it is the escape hatch `IntoArg`'s blanket impls don't
/// cover.
pub fn scalar_arg<T: Serialize>(value: &T) -> Arg {
    Arg::Scalar(serde_json::to_value(value).expect("value must be serializable"))
}
