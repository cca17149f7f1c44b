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

//! zwire Common Types
//!
//! This crate holds everything an agent and its peers must agree on to share
//! a coordination fabric:
//!
//! - **Protocol**: the [`CallDescriptor`] and the [`ZwireError`] taxonomy
//! - **Codec**: pluggable encoding of call descriptors ([`Codec`], [`JsonCodec`])
//! - **Paths**: the path templates that form the wire contract ([`paths`])
//! - **Connection**: the capability an agent consumes from the fabric ([`Connection`])
//! - **Fabric**: two ready-made fabrics ([`MemoryFabric`], [`DirFabric`])
//!
//! # Example
//!
//! ```
//! use zwire_common::{CallDescriptor, Codec, JsonCodec};
//! use serde_json::json;
//!
//! let call = CallDescriptor::new("ping", json!({"from": "docs"}));
//! let bytes = JsonCodec.encode(&call).unwrap();
//! assert_eq!(JsonCodec.decode(&bytes).unwrap(), call);
//! ```

pub mod codec;
pub mod connection;
pub mod fabric;
pub mod paths;
pub mod protocol;

pub use codec::{Codec, JsonCodec};
pub use connection::{Connection, DeliveryQueue};
pub use fabric::{DirFabric, DirConnection, MemoryConnection, MemoryFabric};
pub use paths::{NodeIdentity, Regions};
pub use protocol::*;
