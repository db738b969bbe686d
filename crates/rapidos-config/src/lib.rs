//! `rapidos.conf` loading and typed configuration accessors.
//!
//! The configuration is a flat key/value map read from the default section of
//! an INI-style file. Values may reference other keys as `${KEY}` or `$KEY`;
//! references are expanded once at load time, then a caller-supplied overlay
//! (the CLI's `-C KEY=VAL`) is applied on top. Component specific values are
//! validated on demand by the accessors in this crate.

pub mod expand;
pub mod kernel;
pub mod vm;

pub use expand::expand_vars;
pub use kernel::{parse_proc_version, KmodsInfo};
pub use vm::{VmAddressing, VmNetDef};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to load config {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },
    #[error("{key}={value} is recursive or missing")]
    UnresolvedReference { key: String, value: String },
    #[error("{0} not configured")]
    NotConfigured(String),
    #[error("{key}: cannot access {}: {source}", .path.display())]
    Inaccessible {
        key: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot access kernel image {}: {source}", .path.display())]
    KernelImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("{} is not a regular file", .0.display())]
    NotARegularFile(PathBuf),
    #[error("invalid VM index {0}, indices start at 1")]
    InvalidVmIndex(u32),
    #[error("config missing {0}")]
    MissingVmKey(String),
    #[error("config {key} invalid value: {value}")]
    InvalidVmKey { key: String, value: String },
    #[error("KERNEL_INSTALL_MOD_PATH set without corresponding KERNEL_SRC")]
    InstallPathWithoutSource,
    #[error("unexpected kernel version string: {0:?}")]
    KernelVersion(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Parsed and expanded `rapidos.conf`.
#[derive(Debug, Clone, Default)]
pub struct Config {
    entries: BTreeMap<String, String>,
    debug: bool,
}

impl Config {
    /// Load `path`, expand variable references, then apply `overlay`.
    pub fn parse(
        path: &Path,
        overlay: &BTreeMap<String, String>,
        debug: bool,
    ) -> Result<Self, ConfigError> {
        // Backslashes are literal and quotes are handled by `clean_value`.
        let opts = ini::ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ini::ParseOption::default()
        };
        let ini = ini::Ini::load_from_file_opt(path, opts).map_err(|source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let entries = ini
            .general_section()
            .iter()
            .map(|(k, v)| (k.to_owned(), clean_value(v).to_owned()))
            .collect();
        Self::from_entries(entries, overlay, debug)
    }

    /// Build a config from already-parsed entries; expansion and overlay
    /// behave exactly as for [`Config::parse`].
    pub fn from_entries(
        mut entries: BTreeMap<String, String>,
        overlay: &BTreeMap<String, String>,
        debug: bool,
    ) -> Result<Self, ConfigError> {
        expand_vars(&mut entries)?;
        for (k, v) in overlay {
            entries.insert(k.clone(), v.clone());
        }

        let conf = Self { entries, debug };
        if debug {
            conf.dump();
        }
        Ok(conf)
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn dump(&self) {
        debug!("rapidos config: {:?}", self.entries);
    }

    /// The value for `key`; an empty value counts as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// The directory configured under `key`, lexically cleaned.
    pub fn dir(&self, key: &str) -> Result<PathBuf, ConfigError> {
        let val = self
            .get(key)
            .ok_or_else(|| ConfigError::NotConfigured(key.to_owned()))?;
        let path = PathBuf::from(val);
        let md = fs::metadata(&path).map_err(|source| ConfigError::Inaccessible {
            key: key.to_owned(),
            path: path.clone(),
            source,
        })?;
        if !md.is_dir() {
            return Err(ConfigError::NotADirectory(path));
        }
        Ok(clean_path(&path))
    }

    /// Extra hypervisor arguments from `QEMU_EXTRA_ARGS`, split on whitespace.
    pub fn qemu_extra_args(&self) -> Vec<String> {
        self.get("QEMU_EXTRA_ARGS")
            .map(|v| v.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// Expand `${KEY}`/`$KEY` references in a string that is not itself part
    /// of the config, e.g. a manifest search directory.
    pub fn expand_str(&self, input: &str) -> Result<String, ConfigError> {
        let val = expand::substitute(input, &self.entries);
        if val.contains('$') {
            return Err(ConfigError::UnresolvedReference {
                key: input.to_owned(),
                value: val,
            });
        }
        Ok(val)
    }

    /// Serialize the full map for embedding into an image, where the booted
    /// init reads it back as a JSON object.
    pub fn to_blob(&self) -> Result<Vec<u8>, ConfigError> {
        Ok(serde_json::to_vec(&self.entries)?)
    }
}

/// Unquote a raw value, or drop a trailing comment that starts with `#` or `;`
/// after whitespace. Quoted values are taken verbatim.
fn clean_value(raw: &str) -> &str {
    let raw = raw.trim();
    for quote in ['"', '\'', '`'] {
        if let Some(inner) = raw.strip_prefix(quote) {
            if let Some(end) = inner.find(quote) {
                return &inner[..end];
            }
        }
    }
    let end = raw
        .char_indices()
        .find(|&(i, c)| (c == '#' || c == ';') && raw[..i].ends_with(char::is_whitespace))
        .map_or(raw.len(), |(i, _)| i);
    raw[..end].trim_end()
}

/// Drop `.` components and redundant separators without touching the filesystem.
fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
