// Copyright 2025 zwire Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! JavaScript bindings for zwire
//!
//! Everything a script can reach hangs off the global `zwire` object:
//!
//! - `zwire.register(name, function)` - Register a JavaScript handler for a call name
//! - `zwire.log(...values)` - Write a line to the agent log
//!
//! Host code adds further functions to the same object through [`bind_script_fn`];
//! the agent uses that to expose its relay primitives.

use boa_engine::{
    js_string,
    native_function::NativeFunction,
    object::{FunctionObjectBuilder, JsObject},
    property::Attribute,
    value::JsValue,
    Context, JsNativeError, JsResult, JsString,
};
use boa_gc::{Finalize, Trace};
use zwire_common::{Result, ZwireError};

use crate::runtime::conversions::{js_value_to_json, json_to_js_value};
use crate::runtime::ScriptFn;

const GLOBAL: &str = "zwire";
const REGISTRY: &str = "__registry";

/// Install the `zwire` global into a fresh context.
pub(crate) fn install_zwire_bindings(ctx: &mut Context) -> Result<()> {
    let zwire_object = JsObject::with_object_proto(ctx.intrinsics());

    let registry = JsObject::with_object_proto(ctx.intrinsics());
    zwire_object
        .set(js_string!(REGISTRY), registry, false, ctx)
        .map_err(|e| ZwireError::Script(e.to_string()))?;

    let register_fn = FunctionObjectBuilder::new(
        ctx.realm(),
        NativeFunction::from_copy_closure(|_this, args, context| {
            let name = args
                .first()
                .and_then(|v| v.as_string())
                .ok_or_else(|| {
                    JsNativeError::typ().with_message("First argument must be a string")
                })?
                .clone();

            let func = args
                .get(1)
                .ok_or_else(|| JsNativeError::typ().with_message("Second argument required"))?;

            if !func.as_object().is_some_and(|o| o.is_callable()) {
                return Err(JsNativeError::typ()
                    .with_message("Second argument must be a function")
                    .into());
            }

            let registry = registry_object(context)
                .map_err(|e| JsNativeError::typ().with_message(e.to_string()))?;
            registry.set(name, func.clone(), true, context)?;

            Ok(JsValue::undefined())
        }),
    )
    .name(js_string!("register"))
    .length(2)
    .build();

    zwire_object
        .set(js_string!("register"), register_fn, false, ctx)
        .map_err(|e| ZwireError::Script(e.to_string()))?;

    let log_fn = FunctionObjectBuilder::new(
        ctx.realm(),
        NativeFunction::from_copy_closure(|_this, args, context| {
            let mut parts = Vec::with_capacity(args.len());
            for arg in args {
                parts.push(arg.to_string(context)?.to_std_string_escaped());
            }
            tracing::info!(target: "zwire::script", "{}", parts.join(" "));
            Ok(JsValue::undefined())
        }),
    )
    .name(js_string!("log"))
    .build();

    zwire_object
        .set(js_string!("log"), log_fn, false, ctx)
        .map_err(|e| ZwireError::Script(e.to_string()))?;

    ctx.register_global_property(js_string!(GLOBAL), zwire_object, Attribute::all())
        .map_err(|e| ZwireError::Script(e.to_string()))?;

    Ok(())
}

/// Host function captured by a script binding.
#[derive(Trace, Finalize)]
struct HostFunction {
    // plain Rust data, no garbage-collected values inside
    #[unsafe_ignore_trace]
    function: ScriptFn,
}

/// Expose a host function as `zwire.<name>(...args)`.
///
/// Arguments reach the host function as JSON values. A host error is thrown
/// into the script as a JavaScript `Error` carrying the error text.
///
/// # Arguments
/// * `ctx` - Context whose `zwire` global receives the function
/// * `name` - Property name under `zwire`
/// * `function` - Host function to call
///
/// # Errors
/// Returns `ZwireError::Script` if the `zwire` global is missing or the
/// property cannot be set.
pub(crate) fn bind_script_fn(ctx: &mut Context, name: &str, function: ScriptFn) -> Result<()> {
    let zwire_object = zwire_object(ctx)?;

    let native = NativeFunction::from_copy_closure_with_captures(
        |_this, args: &[JsValue], host: &HostFunction, context| call_host(host, args, context),
        HostFunction { function },
    );

    let func = FunctionObjectBuilder::new(ctx.realm(), native)
        .name(JsString::from(name))
        .build();

    zwire_object
        .set(JsString::from(name), func, false, ctx)
        .map_err(|e| ZwireError::Script(format!("Failed to bind '{}': {}", name, e)))?;

    Ok(())
}

fn call_host(host: &HostFunction, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let mut json_args = Vec::with_capacity(args.len());
    for arg in args {
        let value = js_value_to_json(arg.clone(), context)
            .map_err(|e| JsNativeError::typ().with_message(e.to_string()))?;
        json_args.push(value);
    }

    let result = (host.function)(json_args)
        .map_err(|e| JsNativeError::error().with_message(e.to_string()))?;

    json_to_js_value(result, context)
        .map_err(|e| JsNativeError::typ().with_message(e.to_string()).into())
}

/// Look up the handler a script registered under `name`.
pub(crate) fn registered_handler(ctx: &mut Context, name: &str) -> Result<Option<JsObject>> {
    let registry = registry_object(ctx)?;
    let func = registry
        .get(JsString::from(name), ctx)
        .map_err(|e| ZwireError::Script(format!("Handler '{}' lookup error: {}", name, e)))?;

    if func.is_undefined() {
        return Ok(None);
    }

    match func.as_object() {
        Some(obj) if obj.is_callable() => Ok(Some(obj.clone())),
        _ => Err(ZwireError::Script(format!("Handler '{}' is not a function", name))),
    }
}

fn zwire_object(ctx: &mut Context) -> Result<JsObject> {
    let value = ctx
        .global_object()
        .get(js_string!(GLOBAL), ctx)
        .map_err(|e| ZwireError::Script(e.to_string()))?;

    value
        .as_object()
        .cloned()
        .ok_or_else(|| ZwireError::Script("zwire is not an object".into()))
}

fn registry_object(ctx: &mut Context) -> Result<JsObject> {
    let zwire = zwire_object(ctx)?;
    let registry = zwire
        .get(js_string!(REGISTRY), ctx)
        .map_err(|e| ZwireError::Script(e.to_string()))?;

    registry
        .as_object()
        .cloned()
        .ok_or_else(|| ZwireError::Script("Registry is not an object".into()))
}
