use rapidos_schema::{BuilderKind, FileMapping};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("toolkit I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive toolkit '{0}' is not available on this system")]
    Unavailable(String),
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },
}

/// Everything an archive toolkit needs to produce one image.
#[derive(Debug)]
pub struct ToolkitOpts<'a> {
    pub builder: BuilderKind,
    /// Go packages to compile into the image, in order.
    pub packages: &'a [String],
    pub extra_files: &'a [FileMapping],
    /// newc archive the image is layered on top of.
    pub base_archive: &'a [u8],
    pub output: &'a Path,
    pub init_cmd: &'a str,
    pub default_shell: &'a str,
    /// Scratch space that outlives the call.
    pub temp_dir: &'a Path,
}

/// Builds an initramfs from compiled packages, host files and a base skeleton.
pub trait ArchiveToolkit: Send + Sync {
    fn name(&self) -> &str;

    fn create(&self, opts: &ToolkitOpts<'_>) -> Result<(), ToolkitError>;
}

pub fn select_toolkit(name: &str) -> Result<Box<dyn ArchiveToolkit>, ToolkitError> {
    match name {
        "u-root" => Ok(Box::new(crate::uroot::UrootToolkit::new())),
        "mock" => Ok(Box::new(crate::mock::MockToolkit::new())),
        other => Err(ToolkitError::Unavailable(other.to_owned())),
    }
}
