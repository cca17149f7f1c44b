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

use crate::protocol::{CallDescriptor, Result};

/// Codec for encoding/decoding call descriptors
///
/// Agents sharing a fabric must agree on the codec. [`JsonCodec`] is the
/// default and the one every agent falls back to when none is configured.
///
/// # Example
///
/// ```
/// use zwire_common::{CallDescriptor, Codec, JsonCodec};
/// use serde_json::json;
///
/// let codec = JsonCodec;
/// let call = CallDescriptor::new("test", json!({"n": 42}));
///
/// let encoded = codec.encode(&call).unwrap();
/// let decoded = codec.decode(&encoded).unwrap();
/// assert_eq!(call, decoded);
/// ```
pub trait Codec: Send + Sync {
    /// Encode a call descriptor to bytes
    fn encode(&self, call: &CallDescriptor) -> Result<Vec<u8>>;

    /// Decode a call descriptor from bytes
    fn decode(&self, data: &[u8]) -> Result<CallDescriptor>;
}

/// JSON codec for call descriptors
///
/// Produces `{"Name": ..., "Params": ...}` documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, call: &CallDescriptor) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(call)?)
    }

    fn decode(&self, data: &[u8]) -> Result<CallDescriptor> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ZwireError;
    use serde_json::json;

    #[test]
    fn test_json_codec_round_trip() {
        let call = CallDescriptor::new("test_method", json!({"arg": 42}));

        let encoded = JsonCodec.encode(&call).unwrap();
        let decoded = JsonCodec.decode(&encoded).unwrap();

        assert_eq!(call, decoded);
    }

    #[test]
    fn test_complex_json_values() {
        let call = CallDescriptor::new(
            "complex_method",
            json!({
                "nested": {
                    "array": [1, 2, 3, "four", null],
                    "boolean": true,
                    "number": 42.5,
                    "string": "test"
                },
                "null_value": null
            }),
        );

        let encoded = JsonCodec.encode(&call).unwrap();
        let decoded = JsonCodec.decode(&encoded).unwrap();

        assert_eq!(call, decoded);
    }

    #[test]
    fn test_decode_garbage_is_codec_error() {
        let err = JsonCodec.decode(b"not json").unwrap_err();
        assert!(matches!(err, ZwireError::Codec(_)));
    }

    #[test]
    fn test_codec_as_trait_object() {
        let codec: Box<dyn Codec> = Box::new(JsonCodec);
        let call = CallDescriptor::new("ping", json!(null));
        let encoded = codec.encode(&call).unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), call);
    }
}
