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

use boa_engine::{value::JsValue, Context, Source};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use zwire_common::{Result, ZwireError};

use crate::runtime::{
    bindings,
    conversions::{js_value_to_json, json_to_js_value},
    ScriptFn, ScriptHost,
};

/// A single Boa interpreter with the `zwire` bindings installed.
///
/// Boa's `Context` is neither `Send` nor `Sync`, so a `BoaHost` never leaves
/// the thread that created it. The pool drives it through a worker thread.
pub struct BoaHost {
    ctx: Context,
}

impl BoaHost {
    pub fn new() -> Result<Self> {
        let mut ctx = Context::default();
        bindings::install_zwire_bindings(&mut ctx)?;
        Ok(Self { ctx })
    }

    /// Evaluate a script source in this interpreter.
    pub fn eval(&mut self, source: &str) -> Result<()> {
        self.ctx
            .eval(Source::from_bytes(source))
            .map_err(|e| ZwireError::Script(format!("Script evaluation error: {}", e)))?;
        Ok(())
    }

    /// Load a script file, or every `.js` file of a directory in name order.
    pub fn load(&mut self, root: &Path) -> Result<()> {
        for path in script_files(root)? {
            let source = std::fs::read_to_string(&path).map_err(|e| {
                ZwireError::Script(format!("Failed to load script {}: {}", path.display(), e))
            })?;
            self.eval(&source).map_err(|e| {
                ZwireError::Script(format!("{}: {}", path.display(), e))
            })?;
            tracing::debug!(script = %path.display(), "Loaded script");
        }
        Ok(())
    }

    /// Invoke the handler a script registered for `name`.
    pub fn call(&mut self, name: &str, params: JsonValue) -> Result<JsonValue> {
        let func = bindings::registered_handler(&mut self.ctx, name)?
            .ok_or_else(|| ZwireError::UnknownHandler(name.to_string()))?;

        let args = json_to_js_value(params, &mut self.ctx)?;
        let result = func
            .call(&JsValue::undefined(), &[args], &mut self.ctx)
            .map_err(|e| ZwireError::handler(name, e.to_string()))?;

        js_value_to_json(result, &mut self.ctx)
    }

    /// Whether a script registered a handler for `name`.
    pub fn has_handler(&mut self, name: &str) -> Result<bool> {
        Ok(bindings::registered_handler(&mut self.ctx, name)?.is_some())
    }
}

impl ScriptHost for BoaHost {
    fn init(&mut self, script_root: &Path) -> Result<()> {
        self.load(script_root)
    }

    fn bind(&mut self, name: &str, function: ScriptFn) -> Result<()> {
        bindings::bind_script_fn(&mut self.ctx, name, function)
    }
}

fn script_files(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let entries = std::fs::read_dir(root).map_err(|e| {
        ZwireError::Script(format!("Failed to read script root {}: {}", root.display(), e))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "js") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
