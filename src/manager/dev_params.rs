use std::path::PathBuf;

use tracing::debug;

use crate::codec::decode_value;
use crate::is_upper_identifier;
use crate::ConfigMap;
use crate::ConfigValue;
use crate::Error;
use crate::Result;

/// Local developer overrides. They always win over values from the store
/// and are expected to be absent in production.
#[derive(Debug, Clone, Default)]
pub enum DevParams {
    #[default]
    Empty,
    Static(ConfigMap),
    /// JSON object file, decoded with the value codec
    File(PathBuf),
}

impl DevParams {
    /// Loads the parameters, keeping uppercase identifiers only.
    ///
    /// # Errors
    /// [`Error::DevParams`] when the file cannot be read or is not a JSON
    /// object
    pub fn load(&self) -> Result<ConfigMap> {
        let params = match self {
            DevParams::Empty => return Ok(ConfigMap::new()),
            DevParams::Static(params) => params.clone(),
            DevParams::File(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| Error::DevParams(format!("{}: {}", path.display(), e)))?;
                match decode_value(&raw).map_err(|e| Error::DevParams(format!("{}: {}", path.display(), e)))? {
                    ConfigValue::Object(params) => params,
                    _ => {
                        return Err(Error::DevParams(format!(
                            "{}: expected a JSON object",
                            path.display()
                        )))
                    }
                }
            }
        };

        let total = params.len();
        let params: ConfigMap = params
            .into_iter()
            .filter(|(identifier, _)| is_upper_identifier(identifier))
            .collect();
        debug!(loaded = params.len(), ignored = total - params.len(), "dev params loaded");
        Ok(params)
    }
}

impl From<ConfigMap> for DevParams {
    fn from(params: ConfigMap) -> Self {
        DevParams::Static(params)
    }
}
