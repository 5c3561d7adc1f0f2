use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

/// Behaviour switches shared by every statement a [`Dao`](crate::Dao) runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Features {
    /// Ask the driver for all generated columns on every insert
    pub use_generated_keys: bool,
    /// Return the column type's zero value instead of null for absent values
    pub null_results_disabled: bool,
}

/// Client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RdaxConfig {
    pub database_url: Option<String>,
    pub features: Features,
}

impl RdaxConfig {
    /// Loads configuration from `path` (TOML, optional) overlaid with
    /// `RDAX_`-prefixed environment variables, e.g. `RDAX_DATABASE_URL` or
    /// `RDAX_FEATURES__USE_GENERATED_KEYS`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()).required(false))
            .add_source(
                ::config::Environment::with_prefix("RDAX")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize::<RdaxConfig>()?)
    }

    /// Parses configuration from TOML text, without consulting the environment.
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from_str(text, ::config::FileFormat::Toml))
            .build()?;

        Ok(settings.try_deserialize::<RdaxConfig>()?)
    }
}
