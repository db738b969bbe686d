use crate::{Config, ConfigError};
use std::fs;
use std::path::PathBuf;
use tracing::info;

const PROC_VERSION: &str = "/proc/version";

/// Where kernel modules are installed and for which kernel release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmodsInfo {
    /// Root that `lib/modules/<version>` lives under.
    pub install_root: PathBuf,
    pub kernel_version: String,
}

/// Extract the release from `/proc/version` content, e.g.
/// `Linux version 6.4.0-150600.23-default (geeko@buildhost) ...`.
pub fn parse_proc_version(content: &str) -> Result<String, ConfigError> {
    content
        .split_whitespace()
        .nth(2)
        .map(str::to_owned)
        .ok_or_else(|| ConfigError::KernelVersion(content.to_owned()))
}

impl Config {
    /// Kernel module location: the configured `KERNEL_SRC` build (which then
    /// requires `KERNEL_INSTALL_MOD_PATH`), or the running kernel under `/`.
    pub fn kmods_info(&self) -> Result<KmodsInfo, ConfigError> {
        if self.get("KERNEL_SRC").is_none() {
            info!("KERNEL_SRC not configured, using running kernel");
            return self.running_kmods_info();
        }
        self.source_kmods_info()
    }

    /// Kernel image to boot, which must be a regular file.
    pub fn kernel_image_path(&self) -> Result<PathBuf, ConfigError> {
        let kern_img = if self.get("KERNEL_SRC").is_none() {
            info!("KERNEL_SRC not configured, using running kernel");
            let info = self.running_kmods_info()?;
            PathBuf::from(format!("/boot/vmlinuz-{}", info.kernel_version))
        } else {
            // TODO: derive the boot image path from the kernel's ARCH instead of assuming x86
            self.dir("KERNEL_SRC")?.join("arch/x86/boot/bzImage")
        };

        let md = fs::metadata(&kern_img).map_err(|source| ConfigError::KernelImage {
            path: kern_img.clone(),
            source,
        })?;
        if !md.is_file() {
            return Err(ConfigError::NotARegularFile(kern_img));
        }
        Ok(kern_img)
    }

    fn running_kmods_info(&self) -> Result<KmodsInfo, ConfigError> {
        if self.get("KERNEL_INSTALL_MOD_PATH").is_some() {
            return Err(ConfigError::InstallPathWithoutSource);
        }
        let content = fs::read_to_string(PROC_VERSION)?;
        Ok(KmodsInfo {
            install_root: PathBuf::from("/"),
            kernel_version: parse_proc_version(&content)?,
        })
    }

    fn source_kmods_info(&self) -> Result<KmodsInfo, ConfigError> {
        let kernel_src = self.dir("KERNEL_SRC")?;
        let release = fs::read_to_string(kernel_src.join("include/config/kernel.release"))?;
        let kernel_version = release.trim().to_owned();
        if kernel_version.is_empty() {
            return Err(ConfigError::KernelVersion(release));
        }

        Ok(KmodsInfo {
            install_root: self.dir("KERNEL_INSTALL_MOD_PATH")?,
            kernel_version,
        })
    }
}
