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

//! # Questor Macros
//!
//! Procedural macros for defining quests in the Questor workflow library.
//!
//! ## Key Features
//!
//! - `#[quest]` attribute macro that turns an async function into a
//!   registered quest plus a context-returning wrapper of the same name
//! - Automatic registration at process start-up, no explicit call required
//!
//! ## Example
//!
//! ```ignore
//! use questor_macros::quest;
//!
//! #[quest]
//! async fn add(a: i64, b: i64) -> i64 {
//!     a + b
//! }
//! ```
//!
//! Calling `add(1, 2, queue)` does not run the function; it builds a
//! `QuestContext` that a later `dispatch` will flatten and a worker will
//! eventually execute.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::{parse_macro_input, FnArg, Ident, ItemFn, Pat};

/// Turns an `async fn` into a registered quest.
///
/// The original function body is kept (renamed internally) as the
/// implementation a worker eventually calls. A public wrapper function
/// replacing the original name takes one `impl IntoArg` per original
/// parameter plus a trailing queue handle, and returns a `QuestContext`
/// rather than executing anything — invoking it only builds a pending
/// invocation.
#[proc_macro_attribute]
pub fn quest(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    let vis = &input.vis;
    let asyncness = &input.sig.asyncness;
    let fn_name = &input.sig.ident;
    let fn_name_str = fn_name.to_string();
    let output = &input.sig.output;
    let block = &input.block;
    let inputs = &input.sig.inputs;

    if asyncness.is_none() {
        return syn::Error::new(Span::call_site(), "#[quest] requires an async fn")
            .to_compile_error()
            .into();
    }

    let mut param_names: Vec<Ident> = Vec::new();
    let mut param_types: Vec<syn::Type> = Vec::new();
    for arg in inputs {
        match arg {
            FnArg::Typed(pat_type) => match &*pat_type.pat {
                Pat::Ident(pat_ident) => {
                    param_names.push(pat_ident.ident.clone());
                    param_types.push((*pat_type.ty).clone());
                }
                _ => {
                    return syn::Error::new(
                        Span::call_site(),
                        "#[quest] parameters must be simple identifiers",
                    )
                    .to_compile_error()
                    .into();
                }
            },
            FnArg::Receiver(_) => {
                return syn::Error::new(Span::call_site(), "#[quest] does not support methods")
                    .to_compile_error()
                    .into();
            }
        }
    }
    let param_names_str: Vec<String> = param_names.iter().map(|i| i.to_string()).collect();

    let return_type_name = match output {
        syn::ReturnType::Default => quote! { "()" },
        syn::ReturnType::Type(_, ty) => quote! { std::any::type_name::<#ty>() },
    };

    let impl_name = format_ident!("__questor_impl_{}", fn_name);
    let queue_param = format_ident!("__questor_queue");

    let decode_args = param_names
        .iter()
        .zip(param_types.iter())
        .zip(param_names_str.iter())
        .enumerate()
        .map(|(idx, ((name, ty), name_str))| {
            quote! {
                let #name: #ty = match __args.get(#idx) {
                    Some(__v) => match serde_json::from_value(__v.clone()) {
                        Ok(__decoded) => __decoded,
                        Err(__e) => return Err(format!(
                            "failed to decode argument '{}' of quest '{}': {}",
                            #name_str, #fn_name_str, __e
                        )),
                    },
                    None => return Err(format!(
                        "missing argument '{}' for quest '{}'", #name_str, #fn_name_str
                    )),
                };
            }
        });

    let call_args = param_names.clone();

    let wrapper_params = param_names.iter().map(|name| {
        quote! { #name: impl ::questor::IntoArg }
    });
    let into_args = param_names.iter().map(|name| {
        quote! { ::questor::IntoArg::into_arg(#name) }
    });

    let expanded = quote! {
        #vis #asyncness fn #impl_name(#inputs) #output #block

        #vis fn #fn_name(
            #(#wrapper_params,)*
            #queue_param: std::sync::Arc<dyn ::questor::Queue>,
        ) -> ::questor::QuestContext {
            let args = vec![ #(#into_args),* ];
            ::questor::QuestContext::new(#fn_name_str, args, vec![], #queue_param)
        }

        const _: () = {
            fn __questor_implementation(
                __args: Vec<serde_json::Value>,
                _kwargs: serde_json::Map<String, serde_json::Value>,
            ) -> ::questor::registry::QuestFuture {
                Box::pin(async move {
                    #(#decode_args)*
                    let __result = #impl_name(#(#call_args),*).await;
                    serde_json::to_value(__result).map_err(|e| format!(
                        "failed to encode result of quest '{}': {}", #fn_name_str, e
                    ))
                })
            }

            #[::questor::ctor::ctor]
            fn __questor_auto_register() {
                ::questor::register_blocking(::questor::QuestDefinition {
                    name: #fn_name_str.to_string(),
                    parameter_names: vec![ #(#param_names_str.to_string()),* ],
                    // `#[quest]` only ever produces positional parameters;
                    // named parameters are a `QuestDefinition` field for
                    // definitions assembled by hand.
                    kwarg_names: vec![],
                    return_type: #return_type_name,
                    implementation: std::sync::Arc::new(__questor_implementation),
                });
            }
        };
    };

    expanded.into()
}
