use std::{env, path::PathBuf};

use anyhow::{bail, Context};

use crate::{config::FmtRatchetConfig, model::Descriptor, FmtRatchet};

const DEFAULT_MODULE_FILE_NAME: &str = "fmt-ratchet.toml";
const DEFAULT_CACHE_DIRECTORY: &str = ".fmt-ratchet";

#[derive(Default)]
pub struct FmtRatchetBuilder {
    // All other paths are relative to `root`
    root: Option<PathBuf>,
    module_file_name: Option<PathBuf>,
    ratchet_from: Option<String>,
    cache_directory_path: Option<PathBuf>,
}

impl FmtRatchetBuilder {
    /// Project root directory, inside a git work tree.
    ///
    /// Defaults to the current directory.
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Name of the configuration toml file.
    ///
    /// Defaults to `fmt-ratchet.toml`.
    pub fn module_file_name(mut self, path: impl Into<PathBuf>) -> Self {
        self.module_file_name = Some(path.into());
        self
    }

    /// Git ref to compare against. Overrides `FMT_RATCHET_BASELINE_REF` and
    /// `ratchet_from` in the configuration file.
    pub fn ratchet_from(mut self, reference: impl Into<String>) -> Self {
        self.ratchet_from = Some(reference.into());
        self
    }

    /// Location of the task history.
    ///
    /// Defaults to `FMT_RATCHET_CACHE_DIR`, then `.fmt-ratchet` under the root.
    pub fn cache_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_directory_path = Some(path.into());
        self
    }

    pub fn try_build(self) -> anyhow::Result<FmtRatchet> {
        let Self {
            root,
            module_file_name,
            ratchet_from,
            cache_directory_path,
        } = self;
        let root = match root {
            Some(root) => root,
            None => env::current_dir()?,
        };

        let module_file_name =
            module_file_name.unwrap_or_else(|| PathBuf::from(DEFAULT_MODULE_FILE_NAME));
        let module_file_path = root.join(&module_file_name);
        let descriptor = Descriptor::from_file(&module_file_path)
            .with_context(|| format!("Could not load {}", module_file_path.display()))?;

        let config = FmtRatchetConfig::load()?;

        let ratchet_from = match ratchet_from
            .or(config.ratchet_from)
            .or_else(|| descriptor.ratchet_from.clone())
        {
            Some(reference) => reference,
            None => bail!(
                "No baseline configured: pass --ratchet-from, set FMT_RATCHET_BASELINE_REF or add ratchet_from to {}",
                module_file_name.display()
            ),
        };

        let cache_directory = root.join(
            cache_directory_path
                .or(config.cache_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIRECTORY)),
        );

        Ok(FmtRatchet {
            root,
            descriptor,
            ratchet_from,
            cache_directory,
        })
    }
}
