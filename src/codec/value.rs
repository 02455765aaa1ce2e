use std::collections::BTreeMap;
use std::fmt;

use chrono::DateTime;
use chrono::FixedOffset;
use chrono::NaiveDateTime;
use chrono::Utc;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value;

use crate::constants::CUSTOM_TYPE_DATETIME;
use crate::constants::CUSTOM_TYPE_KEY;
use crate::constants::CUSTOM_TYPE_VALUE_KEY;
use crate::DecodeFailure;

/// Identifier (uppercase, `_`-delimited) -> value
pub type ConfigMap = BTreeMap<String, ConfigValue>;

/// Baseline configuration of one named environment
pub type EnvironmentDefaults = ConfigMap;

/// Override-set name -> partial override bundle
pub type ExtensionSets = BTreeMap<String, ConfigMap>;

const NAIVE_ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A configuration value: any JSON value plus timestamps.
///
/// Timestamps travel as `{"_custom_type": "datetime", "value": "<ISO-8601>"}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<ConfigValue>),
    Object(ConfigMap),
    Timestamp(Timestamp),
}

/// Timestamp with or without a UTC offset, as ISO-8601 allows both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Naive(NaiveDateTime),
    Offset(DateTime<FixedOffset>),
}

impl Timestamp {
    pub fn to_iso8601(&self) -> String {
        match self {
            Timestamp::Naive(dt) => dt.format(NAIVE_ISO_FORMAT).to_string(),
            Timestamp::Offset(dt) => dt.to_rfc3339(),
        }
    }

    /// Accepts RFC 3339 with offset, or a naive `YYYY-MM-DDTHH:MM:SS[.fff]`
    /// (`T` or space separated).
    pub fn parse(value: &str) -> std::result::Result<Self, chrono::ParseError> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Ok(Timestamp::Offset(dt));
        }
        NaiveDateTime::parse_from_str(value, NAIVE_ISO_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
            .map(Timestamp::Naive)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl ConfigValue {
    pub fn is_object(&self) -> bool {
        matches!(self, ConfigValue::Object(_))
    }

    pub fn as_object(&self) -> Option<&ConfigMap> {
        match self {
            ConfigValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&Timestamp> {
        match self {
            ConfigValue::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    /// Recursive key-wise union: mappings are merged, `overlay` wins on
    /// every other conflict.
    pub fn merge_from(
        &mut self,
        overlay: &ConfigValue,
    ) {
        match (self, overlay) {
            (ConfigValue::Object(base), ConfigValue::Object(over)) => {
                for (key, value) in over {
                    match base.get_mut(key) {
                        Some(existing) if existing.is_object() && value.is_object() => {
                            existing.merge_from(value);
                        }
                        _ => {
                            base.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
            (this, other) => *this = other.clone(),
        }
    }

    /// Wire representation, timestamps as tagged objects.
    pub fn to_wire_json(&self) -> Value {
        match self {
            ConfigValue::Timestamp(ts) => {
                let mut tagged = Map::new();
                tagged.insert(CUSTOM_TYPE_KEY.to_string(), Value::from(CUSTOM_TYPE_DATETIME));
                tagged.insert(CUSTOM_TYPE_VALUE_KEY.to_string(), Value::from(ts.to_iso8601()));
                Value::Object(tagged)
            }
            other => other.to_json_with(ConfigValue::to_wire_json),
        }
    }

    /// Plain JSON, timestamps as ISO-8601 strings.
    pub fn to_plain_json(&self) -> Value {
        match self {
            ConfigValue::Timestamp(ts) => Value::from(ts.to_iso8601()),
            other => other.to_json_with(ConfigValue::to_plain_json),
        }
    }

    fn to_json_with(
        &self,
        nested: fn(&ConfigValue) -> Value,
    ) -> Value {
        match self {
            ConfigValue::Null => Value::Null,
            ConfigValue::Bool(b) => Value::Bool(*b),
            ConfigValue::Number(n) => Value::Number(n.clone()),
            ConfigValue::String(s) => Value::String(s.clone()),
            ConfigValue::Array(items) => Value::Array(items.iter().map(nested).collect()),
            ConfigValue::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), nested(v))).collect()),
            ConfigValue::Timestamp(_) => nested(self),
        }
    }

    /// Builds a value from wire JSON, restoring every tagged object found at
    /// any depth.
    pub(crate) fn from_wire_json(value: Value) -> std::result::Result<Self, DecodeFailure> {
        Ok(match value {
            Value::Array(items) => ConfigValue::Array(
                items
                    .into_iter()
                    .map(ConfigValue::from_wire_json)
                    .collect::<std::result::Result<_, _>>()?,
            ),
            Value::Object(map) => {
                let tagged = map.get(CUSTOM_TYPE_KEY).is_some_and(|tag| !tag.is_null());
                if tagged {
                    decode_custom_type(&map)?
                } else {
                    ConfigValue::Object(
                        map.into_iter()
                            .map(|(k, v)| Ok((k, ConfigValue::from_wire_json(v)?)))
                            .collect::<std::result::Result<_, DecodeFailure>>()?,
                    )
                }
            }
            scalar => ConfigValue::from(scalar),
        })
    }
}

fn decode_custom_type(object: &Map<String, Value>) -> std::result::Result<ConfigValue, DecodeFailure> {
    let tag = object.get(CUSTOM_TYPE_KEY).unwrap_or(&Value::Null);
    match tag.as_str() {
        Some(CUSTOM_TYPE_DATETIME) => {
            let raw = object
                .get(CUSTOM_TYPE_VALUE_KEY)
                .and_then(Value::as_str)
                .ok_or_else(|| DecodeFailure::MissingCustomValue(CUSTOM_TYPE_DATETIME.to_string()))?;
            Timestamp::parse(raw)
                .map(ConfigValue::Timestamp)
                .map_err(|source| DecodeFailure::Timestamp {
                    value: raw.to_string(),
                    source,
                })
        }
        Some(other) => Err(DecodeFailure::UnknownCustomType(other.to_string())),
        None => Err(DecodeFailure::UnknownCustomType(tag.to_string())),
    }
}

/// Plain conversion: tagged objects are kept as ordinary mappings.
impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(b) => ConfigValue::Bool(b),
            Value::Number(n) => ConfigValue::Number(n),
            Value::String(s) => ConfigValue::String(s),
            Value::Array(items) => ConfigValue::Array(items.into_iter().map(ConfigValue::from).collect()),
            Value::Object(map) => ConfigValue::Object(map.into_iter().map(|(k, v)| (k, ConfigValue::from(v))).collect()),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Number(value.into())
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Number(value.into())
    }
}

impl From<u64> for ConfigValue {
    fn from(value: u64) -> Self {
        ConfigValue::Number(value.into())
    }
}

/// Non-finite floats have no JSON form and become `Null`.
impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(ConfigValue::Null, ConfigValue::Number)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl<T: Into<ConfigValue>> From<Vec<T>> for ConfigValue {
    fn from(items: Vec<T>) -> Self {
        ConfigValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<ConfigMap> for ConfigValue {
    fn from(map: ConfigMap) -> Self {
        ConfigValue::Object(map)
    }
}

impl From<Timestamp> for ConfigValue {
    fn from(ts: Timestamp) -> Self {
        ConfigValue::Timestamp(ts)
    }
}

impl From<NaiveDateTime> for ConfigValue {
    fn from(dt: NaiveDateTime) -> Self {
        ConfigValue::Timestamp(Timestamp::Naive(dt))
    }
}

impl From<DateTime<FixedOffset>> for ConfigValue {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        ConfigValue::Timestamp(Timestamp::Offset(dt))
    }
}

impl From<DateTime<Utc>> for ConfigValue {
    fn from(dt: DateTime<Utc>) -> Self {
        ConfigValue::Timestamp(Timestamp::Offset(dt.fixed_offset()))
    }
}
