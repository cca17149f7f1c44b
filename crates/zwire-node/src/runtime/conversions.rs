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

//! JSON <-> JavaScript Value Conversions
//!
//! Call parameters arrive as `serde_json::Value` and relay arguments leave a
//! script as `JsValue`; these two functions bridge them.
//!
//! | JSON Type | JavaScript Type |
//! |-----------|-----------------|
//! | null | null |
//! | boolean | Boolean |
//! | number | Number |
//! | string | String |
//! | array | Array |
//! | object | Object |
//!
//! `undefined`, symbols and functions become JSON `null`; symbol keys are
//! skipped. Whole numbers inside the safe integer range come back as JSON
//! integers.

use boa_engine::{
    object::{builtins::JsArray, JsObject},
    property::PropertyKey,
    value::JsValue,
    Context, JsString,
};
use serde_json::Value as JsonValue;
use zwire_common::{Result, ZwireError};

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Convert serde_json::Value to Boa JsValue.
pub fn json_to_js_value(json: JsonValue, ctx: &mut Context) -> Result<JsValue> {
    match json {
        JsonValue::Null => Ok(JsValue::null()),
        JsonValue::Bool(b) => Ok(JsValue::new(b)),
        JsonValue::Number(n) => n
            .as_f64()
            .map(JsValue::new)
            .ok_or_else(|| ZwireError::Script("Number out of range".into())),
        JsonValue::String(s) => Ok(JsValue::new(JsString::from(s.as_str()))),
        JsonValue::Array(arr) => {
            let js_array = JsArray::new(ctx);
            for (i, v) in arr.into_iter().enumerate() {
                let js_value = json_to_js_value(v, ctx)?;
                js_array.push(js_value, ctx).map_err(|e| {
                    ZwireError::Script(format!("Failed to push array element {}: {}", i, e))
                })?;
            }
            Ok(js_array.into())
        }
        JsonValue::Object(obj) => {
            let js_obj = JsObject::with_object_proto(ctx.intrinsics());
            for (key, value) in obj {
                let js_value = json_to_js_value(value, ctx)?;
                js_obj
                    .create_data_property_or_throw(JsString::from(key.as_str()), js_value, ctx)
                    .map_err(|e| {
                        ZwireError::Script(format!("Failed to set property '{}': {}", key, e))
                    })?;
            }
            Ok(js_obj.into())
        }
    }
}

/// Convert Boa JsValue to serde_json::Value.
pub fn js_value_to_json(value: JsValue, ctx: &mut Context) -> Result<JsonValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(JsonValue::Null);
    }

    if let Some(b) = value.as_boolean() {
        return Ok(JsonValue::Bool(b));
    }

    if let Some(n) = value.as_number() {
        if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
            return Ok(JsonValue::from(n as i64));
        }
        return serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .ok_or_else(|| ZwireError::Script(format!("{} has no JSON representation", n)));
    }

    if let Some(s) = value.as_string() {
        return s
            .to_std_string()
            .map(JsonValue::String)
            .map_err(|e| ZwireError::Script(format!("String conversion error: {:?}", e)));
    }

    if let Some(obj) = value.as_object() {
        if obj.is_callable() {
            return Ok(JsonValue::Null);
        }

        if obj.is_array() {
            let array = JsArray::from_object(obj.clone())
                .map_err(|e| ZwireError::Script(format!("Object is not a valid array: {}", e)))?;

            let length: usize = array
                .length(ctx)
                .map_err(|e| ZwireError::Script(format!("Failed to get array length: {}", e)))?
                .try_into()
                .map_err(|_| ZwireError::Script("Array length overflow".into()))?;

            let mut result = Vec::with_capacity(length);
            for i in 0..length {
                let elem = array.get(i, ctx).map_err(|e| {
                    ZwireError::Script(format!("Failed to get array element {}: {}", i, e))
                })?;
                result.push(js_value_to_json(elem, ctx)?);
            }
            return Ok(JsonValue::Array(result));
        }

        let keys = obj
            .own_property_keys(ctx)
            .map_err(|e| ZwireError::Script(format!("Failed to get object keys: {}", e)))?;

        let mut result = serde_json::Map::new();
        for key in keys {
            if matches!(key, PropertyKey::Symbol(_)) {
                continue;
            }
            let key_str = key.to_string();
            let prop_value = obj.get(key, ctx).map_err(|e| {
                ZwireError::Script(format!("Failed to get property '{}': {}", key_str, e))
            })?;
            result.insert(key_str, js_value_to_json(prop_value, ctx)?);
        }
        return Ok(JsonValue::Object(result));
    }

    // symbols and anything else without a JSON shape
    Ok(JsonValue::Null)
}
