//! Converter configuration (usecode.toml)
//!
//! ```toml
//! [scaffold]
//! function_prefix = "func_"
//! string_prefix = "str_"
//! indent = 4
//! list_locals = true
//!
//! [output]
//! extension = "lua"
//!
//! [intrinsics]
//! path = "extra_intrinsics.toml"
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::intrinsics::IntrinsicTable;

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE: &str = "usecode.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scaffold: ScaffoldConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub intrinsics: IntrinsicsConfig,

    /// Directory the file was loaded from; relative paths resolve against it
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

/// Scaffold generator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaffoldConfig {
    /// Function name prefix, followed by four hex digits
    #[serde(default = "default_function_prefix")]
    pub function_prefix: String,

    /// String binding prefix, followed by the segment label
    #[serde(default = "default_string_prefix")]
    pub string_prefix: String,

    /// Spaces per indentation level
    #[serde(default = "default_indent")]
    pub indent: usize,

    /// Name the local variable slots in the header block
    #[serde(default = "default_true")]
    pub list_locals: bool,
}

impl Default for ScaffoldConfig {
    fn default() -> Self {
        Self {
            function_prefix: default_function_prefix(),
            string_prefix: default_string_prefix(),
            indent: default_indent(),
            list_locals: true,
        }
    }
}

impl ScaffoldConfig {
    pub fn function_name(&self, func_number: u16) -> String {
        format!("{}{:04X}", self.function_prefix, func_number)
    }

    pub fn binding_name(&self, label: &str) -> String {
        format!("{}{}", self.string_prefix, label)
    }
}

/// Output file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
        }
    }
}

/// Extra intrinsic dataset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntrinsicsConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_function_prefix() -> String {
    "func_".to_string()
}

fn default_string_prefix() -> String {
    "str_".to_string()
}

fn default_indent() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_extension() -> String {
    "lua".to_string()
}

impl Config {
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.output.extension.is_empty() {
            return Err(Error::Config {
                message: "output.extension must not be empty".to_string(),
            });
        }
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let mut config = Self::from_str(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Load `usecode.toml` from `dir` if present, defaults otherwise
    pub fn discover(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            tracing::debug!("loading configuration from {}", path.display());
            Self::from_path(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Built-in intrinsic table with the configured dataset merged over it
    pub fn intrinsic_table(&self) -> Result<IntrinsicTable> {
        let mut table = IntrinsicTable::builtin().clone();
        if let Some(path) = &self.intrinsics.path {
            let path = match &self.base_dir {
                Some(base) if path.is_relative() => base.join(path),
                _ => path.clone(),
            };
            let extra = IntrinsicTable::from_path(&path)?;
            tracing::debug!("merged {} intrinsic(s) from {}", extra.len(), path.display());
            table.merge(extra);
        }
        Ok(table)
    }
}
