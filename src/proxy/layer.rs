use crate::ConfigMap;
use crate::ConfigValue;

/// One tier of the resolution chain.
pub trait SettingsLayer: Send + Sync {
    fn lookup(
        &self,
        identifier: &str,
    ) -> Option<ConfigValue>;

    /// Every identifier this layer defines
    fn identifiers(&self) -> Vec<String>;
}

impl SettingsLayer for ConfigMap {
    fn lookup(
        &self,
        identifier: &str,
    ) -> Option<ConfigValue> {
        self.get(identifier).cloned()
    }

    fn identifiers(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }
}
