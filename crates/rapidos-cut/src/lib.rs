//! Image composition for rapidos.
//!
//! This crate implements the "cut" side: kernel module discovery through
//! `modules.dep` (`resolve_kmods`), host binary lookup with a temporarily
//! extended search path (`find_bins`), an in-memory newc cpio writer for the
//! base filesystem skeleton, the pluggable `ArchiveToolkit` that builds the
//! final initramfs, and `cut` which ties them together and records the
//! manifest's VM resources on the finished image.

pub mod bins;
pub mod compose;
pub mod cpio;
pub mod kmod;
pub mod mock;
pub mod toolkit;
pub mod uroot;

pub use bins::{find_bins, find_bins_in, SearchPathGuard};
pub use compose::{cut, DEFAULT_SHELL, INIT_CMD, INIT_PKG};
pub use kmod::{resolve_kmods, ModuleFile, MODULE_META_FILES};
pub use toolkit::{select_toolkit, ArchiveToolkit, ToolkitError, ToolkitOpts};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("resolve I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read module database {}: {source}", .path.display())]
    ModuleDb {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not find module '{0}'")]
    ModuleNotFound(String),
    #[error("circular module dependency through '{0}'")]
    CircularDependency(String),
    #[error("binary '{0}' not found in search path")]
    BinaryNotFound(String),
}

#[derive(Debug, Error)]
pub enum CutError {
    #[error("config error: {0}")]
    Config(#[from] rapidos_config::ConfigError),
    #[error("manifest error: {0}")]
    Manifest(#[from] rapidos_schema::ManifestError),
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Toolkit(#[from] ToolkitError),
    #[error("failed to apply VM resources: {0}")]
    Resources(#[from] rapidos_schema::ResourceError),
    #[error("cut I/O error: {0}")]
    Io(#[from] std::io::Error),
}
