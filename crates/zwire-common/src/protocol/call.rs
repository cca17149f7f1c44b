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

use serde::{Deserialize, Serialize};

pub type CallName = String;
pub type CallParams = serde_json::Value;

/// A remote invocation request travelling through the fabric.
///
/// The serialized field names are `Name` and `Params`; they are part of the
/// wire contract shared with every other agent watching the same fabric.
/// Descriptors carry no identity beyond the pair, so two identical calls are
/// two calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallDescriptor {
    #[serde(rename = "Name")]
    pub name: CallName,
    #[serde(rename = "Params", default)]
    pub params: CallParams,
}

impl CallDescriptor {
    pub fn new(name: impl Into<String>, params: CallParams) -> Self {
        CallDescriptor {
            name: name.into(),
            params,
        }
    }
}
