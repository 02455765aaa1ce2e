//! Key and value codec for configuration stored in etcd
//!
//! - [`KeyCodec`] maps store paths (`/prefix/env/foo/bar`) to identifiers
//!   (`FOO_BAR`) and back.
//! - [`encode_value`] / [`decode_value`] serialize [`ConfigValue`]s as JSON,
//!   with timestamps carried as `{"_custom_type": "datetime", "value": ...}`.

mod key;
mod value;

pub use key::*;
pub use value::*;


use crate::CodecError;
use crate::DecodeFailure;
use crate::ValueDecodeError;

/// Serializes a value to its wire string.
pub fn encode_value(value: &ConfigValue) -> std::result::Result<String, CodecError> {
    Ok(serde_json::to_string(&value.to_wire_json())?)
}

/// Parses a wire string, restoring typed values at every nesting level.
pub fn decode_value(raw: &str) -> std::result::Result<ConfigValue, ValueDecodeError> {
    let wrap = |cause: DecodeFailure| ValueDecodeError {
        raw: raw.to_string(),
        cause,
    };
    let json: serde_json::Value = serde_json::from_str(raw).map_err(|e| wrap(e.into()))?;
    ConfigValue::from_wire_json(json).map_err(wrap)
}
