use std::{collections::HashMap, path::PathBuf};

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Settings read from `FMT_RATCHET_*` environment variables.
pub struct FmtRatchetConfig {
    pub cache_dir: Option<PathBuf>,
    pub ratchet_from: Option<String>,
}

impl FmtRatchetConfig {
    pub fn load() -> anyhow::Result<Self> {
        let raw_config = RawConfig::load(None)?;

        Ok(Self {
            cache_dir: raw_config.cache.dir,
            ratchet_from: raw_config.baseline.reference,
        })
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    cache: CacheConfig,
    #[serde(default)]
    baseline: BaselineConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct CacheConfig {
    dir: Option<PathBuf>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct BaselineConfig {
    #[serde(rename = "ref")]
    reference: Option<String>,
}

impl RawConfig {
    fn load(env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                Environment::with_prefix("FMT_RATCHET")
                    .separator("_")
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn load_empty() {
        let env = HashMap::from([]);
        let config = RawConfig::load(Some(env)).unwrap();
        assert_eq!(
            config,
            RawConfig {
                cache: CacheConfig { dir: None },
                baseline: BaselineConfig { reference: None }
            }
        )
    }

    #[test]
    fn load_environment() {
        let env = HashMap::from([
            ("FMT_RATCHET_CACHE_DIR".to_owned(), "/cache".to_owned()),
            ("FMT_RATCHET_BASELINE_REF".to_owned(), "origin/main".to_owned()),
            ("UNRELATED_VARIABLE".to_owned(), "ignored".to_owned()),
        ]);
        let config = RawConfig::load(Some(env)).unwrap();
        assert_eq!(
            config,
            RawConfig {
                cache: CacheConfig {
                    dir: Some("/cache".into())
                },
                baseline: BaselineConfig {
                    reference: Some("origin/main".to_owned())
                }
            }
        )
    }
}
