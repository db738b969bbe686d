use crate::resources::Resources;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported builder type '{0}', expected combined-binary (bb) or separate-binaries (binary)")]
    UnsupportedBuilder(String),
    #[error("invalid file mapping '{0}', expected '<source>' or '<source>:<destination>'")]
    InvalidFileMapping(String),
}

/// How the archive toolkit combines the manifest packages into the image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BuilderKind {
    /// A single busybox-style binary providing every package as a multi-call entry.
    #[default]
    CombinedBinary,
    /// One binary per package.
    SeparateBinaries,
}

impl BuilderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CombinedBinary => "combined-binary",
            Self::SeparateBinaries => "separate-binaries",
        }
    }
}

impl fmt::Display for BuilderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuilderKind {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "combined-binary" | "bb" => Ok(Self::CombinedBinary),
            "separate-binaries" | "binary" => Ok(Self::SeparateBinaries),
            other => Err(ManifestError::UnsupportedBuilder(other.to_owned())),
        }
    }
}

impl TryFrom<String> for BuilderKind {
    type Error = ManifestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BuilderKind> for String {
    fn from(kind: BuilderKind) -> Self {
        kind.as_str().to_owned()
    }
}

/// Everything placed into the image besides the base skeleton.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Inventory {
    /// Additional packages built into the image by the archive toolkit.
    #[serde(default)]
    pub packages: Vec<String>,
    /// Kernel modules; `modules.dep` dependencies are pulled in automatically.
    #[serde(default)]
    pub kmods: Vec<String>,
    /// Host binaries located through the search path (plus sbin).
    #[serde(default)]
    pub bins: Vec<String>,
    /// Host files, optionally as `<source>:<destination>`.
    #[serde(default)]
    pub files: Vec<String>,
    /// Extra search directories for `bins`. Entries may reference config
    /// variables, e.g. `${CIFSD_TOOLS_SRC}/cifsd/.libs`.
    #[serde(default)]
    pub bin_dirs: Vec<String>,
}

/// Declarative description of one bootable image.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Package run by the image's init immediately after boot.
    pub init: String,
    #[serde(default)]
    pub builder: BuilderKind,
    #[serde(default)]
    pub inventory: Inventory,
    /// Considered at boot time rather than at cut time.
    #[serde(default)]
    pub resources: Resources,
}

impl Manifest {
    /// Parse every `files` entry into a source/destination pair.
    pub fn file_mappings(&self) -> Result<Vec<FileMapping>, ManifestError> {
        self.inventory
            .files
            .iter()
            .map(|f| FileMapping::parse(f))
            .collect()
    }
}

/// A host file and its (optional) destination inside the image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileMapping {
    pub source: PathBuf,
    /// `None` places the file at the same path as the host source.
    pub dest: Option<PathBuf>,
}

impl FileMapping {
    pub fn new(source: impl Into<PathBuf>, dest: Option<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest,
        }
    }

    pub fn parse(input: &str) -> Result<Self, ManifestError> {
        let (source, dest) = match input.split_once(':') {
            Some((src, dst)) => (src, Some(dst)),
            None => (input, None),
        };
        if source.is_empty() || dest.is_some_and(str::is_empty) {
            return Err(ManifestError::InvalidFileMapping(input.to_owned()));
        }
        Ok(Self::new(source, dest.map(PathBuf::from)))
    }
}

impl fmt::Display for FileMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dest {
            Some(dest) => write!(f, "{}:{}", self.source.display(), dest.display()),
            None => write!(f, "{}", self.source.display()),
        }
    }
}

pub fn parse_manifest_str(input: &str) -> Result<Manifest, ManifestError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}
