use config::ConfigError;
use regex::Regex;

use crate::constants::EXTENSIONS_DIR;
use crate::CodecError;
use crate::Error;
use crate::Result;

/// Maps store paths to configuration identifiers and back.
///
/// Layout under the prefix:
/// - `{prefix}/{env}/{identifier-as-path}` for environment defaults
/// - `{prefix}/extensions/{set-name}/{identifier-as-path}` for override sets
#[derive(Debug, Clone)]
pub struct KeyCodec {
    base_path: String,
    extensions_path: String,
    key_regex: Regex,
}

impl KeyCodec {
    /// `prefix` is normalized to a single leading `/` and no trailing `/`.
    pub fn new(prefix: &str) -> Result<Self> {
        let base_path = normalize_path(prefix);
        let extensions_path = format!("{base_path}/{EXTENSIONS_DIR}");
        let pattern = format!(
            r"^(?P<path>{}/(?:{}/)?(?P<scope>[\w\-\.]+))/(?P<key>.+)$",
            regex::escape(&base_path),
            EXTENSIONS_DIR
        );
        let key_regex = Regex::new(&pattern).map_err(|e| {
            Error::Config(ConfigError::Message(format!(
                "invalid config prefix '{prefix}': {e}"
            )))
        })?;

        Ok(Self {
            base_path,
            extensions_path,
            key_regex,
        })
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn extensions_path(&self) -> &str {
        &self.extensions_path
    }

    pub fn env_defaults_path(
        &self,
        env: &str,
    ) -> String {
        format!("{}/{}", self.base_path, env)
    }

    pub fn extension_set_path(
        &self,
        set_name: &str,
    ) -> String {
        format!("{}/{}", self.extensions_path, set_name)
    }

    /// Full store path of `identifier` inside an environment
    pub fn env_key_path(
        &self,
        env: &str,
        identifier: &str,
    ) -> String {
        format!("{}/{}", self.env_defaults_path(env), Self::encode_key(identifier))
    }

    /// Full store path of `identifier` inside an override set
    pub fn extension_key_path(
        &self,
        set_name: &str,
        identifier: &str,
    ) -> String {
        format!("{}/{}", self.extension_set_path(set_name), Self::encode_key(identifier))
    }

    /// `FOO_BAR_BAZ` -> `foo/bar/baz`.
    ///
    /// Lossy for anything outside `[A-Z0-9_]`; callers only pass uppercase
    /// identifiers.
    pub fn encode_key(identifier: &str) -> String {
        identifier.to_lowercase().replace('_', "/")
    }

    /// Splits a full store path into `(scope, identifier)`, where scope is the
    /// environment or override-set name.
    pub fn decode_key(
        &self,
        full_path: &str,
    ) -> std::result::Result<(String, String), CodecError> {
        let captures = self
            .key_regex
            .captures(full_path)
            .ok_or_else(|| CodecError::MalformedKey {
                key: full_path.to_string(),
            })?;

        match (captures.name("scope"), captures.name("key")) {
            (Some(scope), Some(key)) => Ok((
                scope.as_str().to_string(),
                key.as_str().to_uppercase().replace('/', "_"),
            )),
            _ => Err(CodecError::MalformedKey {
                key: full_path.to_string(),
            }),
        }
    }
}

pub(crate) fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Uppercase in the `str.isupper` sense: at least one cased character and
/// no lowercase ones.
pub fn is_upper_identifier(identifier: &str) -> bool {
    identifier.chars().any(char::is_uppercase) && !identifier.chars().any(char::is_lowercase)
}
