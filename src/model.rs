use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::Step;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading configuration toml: {0}")]
    IO(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Duplicate format name `{0}`")]
    DuplicateFormat(String),
}

/// Contents of `fmt-ratchet.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratchet_from: Option<String>,
    /// Project directories relative to the repository root.
    #[serde(default = "default_projects")]
    pub projects: Vec<PathBuf>,
    #[serde(default, rename = "format")]
    pub formats: Vec<FormatDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub name: String,
    /// Regex over the project-relative, `/`-separated file path.
    pub target: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_projects() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

impl Descriptor {
    pub fn from_file(path: &Path) -> Result<Descriptor, ParseError> {
        log::debug!("Attempting to read descriptor from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Descriptor::from_toml_str(&contents)
    }

    pub fn from_toml_str(data: &str) -> Result<Descriptor, ParseError> {
        let descriptor: Descriptor = toml::from_str(data)?;
        let mut names: Vec<&str> = descriptor.formats.iter().map(|f| f.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ParseError::DuplicateFormat(pair[0].to_owned()));
        }
        Ok(descriptor)
    }
}
