use tracing::trace;
use tracing::warn;

use crate::codec::decode_value;
use crate::ConfigValue;
use crate::EnvironmentDefaults;
use crate::ExtensionSets;
use crate::InvalidValueError;
use crate::KeyCodec;
use crate::Result;
use crate::StoreLeaf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// `identifier -> value`
    EnvDefaults,
    /// `set name -> identifier -> value`
    ExtensionSets,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigTree {
    EnvDefaults(EnvironmentDefaults),
    ExtensionSets(ExtensionSets),
}

/// Groups the leaves of one read or watch response by identifier.
///
/// Leaves whose path does not decode are skipped (directory nodes), while a
/// leaf whose value does not decode fails the whole batch.
#[derive(Debug, Clone)]
pub struct ConfigTreeParser {
    codec: KeyCodec,
}

impl ConfigTreeParser {
    pub fn new(codec: KeyCodec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    pub fn parse(
        &self,
        leaves: &[StoreLeaf],
        mode: ParseMode,
    ) -> Result<ConfigTree> {
        Ok(match mode {
            ParseMode::EnvDefaults => ConfigTree::EnvDefaults(self.parse_env_defaults(leaves)?),
            ParseMode::ExtensionSets => ConfigTree::ExtensionSets(self.parse_extension_sets(leaves)?),
        })
    }

    pub fn parse_env_defaults(
        &self,
        leaves: &[StoreLeaf],
    ) -> Result<EnvironmentDefaults> {
        let mut defaults = EnvironmentDefaults::new();
        for (_, identifier, value) in self.decode_leaves(leaves, ParseMode::EnvDefaults)? {
            defaults.insert(identifier, value);
        }
        Ok(defaults)
    }

    pub fn parse_extension_sets(
        &self,
        leaves: &[StoreLeaf],
    ) -> Result<ExtensionSets> {
        let mut sets = ExtensionSets::new();
        for (set_name, identifier, value) in self.decode_leaves(leaves, ParseMode::ExtensionSets)? {
            sets.entry(set_name).or_default().insert(identifier, value);
        }
        Ok(sets)
    }

    fn decode_leaves(
        &self,
        leaves: &[StoreLeaf],
        mode: ParseMode,
    ) -> Result<Vec<(String, String, ConfigValue)>> {
        let mut decoded = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            let (scope, identifier) = match self.codec.decode_key(&leaf.key) {
                Ok(parts) => parts,
                Err(e) => {
                    match mode {
                        ParseMode::EnvDefaults => warn!(key = %leaf.key, "Skipping leaf: {}", e),
                        ParseMode::ExtensionSets => warn!(
                            key = %leaf.key,
                            "Skipping leaf: {} (is '{}' a directory?)",
                            e,
                            self.codec.extensions_path()
                        ),
                    }
                    continue;
                }
            };

            let Some(raw) = leaf.value.as_deref() else {
                trace!(key = %leaf.key, "valueless leaf");
                continue;
            };

            let value = decode_value(raw).map_err(|cause| InvalidValueError {
                key: leaf.key.clone(),
                raw_value: raw.to_string(),
                cause,
            })?;
            decoded.push((scope, identifier, value));
        }
        Ok(decoded)
    }
}
