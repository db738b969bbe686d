use crate::bins::find_bins_in;
use crate::cpio::base_archive;
use crate::kmod::resolve_kmods;
use crate::toolkit::{ArchiveToolkit, ToolkitOpts};
use crate::CutError;
use rapidos_config::Config;
use rapidos_schema::{FileMapping, Manifest};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Package providing the image's PID 1, which then runs the manifest's init.
pub const INIT_PKG: &str = "github.com/u-root/u-root/cmds/core/init";
pub const INIT_CMD: &str = "init";
pub const DEFAULT_SHELL: &str = "/bbin/rush";

/// Build the image for `manifest` at `img_path`.
///
/// Modules, binaries and files are gathered first, so a lookup failure
/// leaves any previous image in place. Once the toolkit has succeeded the
/// manifest's resources are stored on the image for the launcher.
pub fn cut(
    conf: &Config,
    manifest: &Manifest,
    toolkit: &dyn ArchiveToolkit,
    work_dir: &Path,
    img_path: &Path,
) -> Result<(), CutError> {
    let inv = &manifest.inventory;
    let mut files: Vec<FileMapping> = Vec::new();

    if !inv.kmods.is_empty() {
        let info = conf.kmods_info()?;
        let kmods = resolve_kmods(&inv.kmods, &info)?;
        files.extend(kmods.iter().map(crate::ModuleFile::to_mapping));
    }

    if !inv.bins.is_empty() {
        let extra_dirs = inv
            .bin_dirs
            .iter()
            .map(|d| conf.expand_str(d).map(PathBuf::from))
            .collect::<Result<Vec<_>, _>>()?;
        let bins = find_bins_in(&inv.bins, &extra_dirs, false)?;
        files.extend(bins.into_iter().map(|b| FileMapping::new(b, None)));
    }

    files.extend(manifest.file_mappings()?);

    let mut packages = inv.packages.clone();
    packages.push(INIT_PKG.to_owned());
    packages.push(manifest.init.clone());

    let blob = conf.to_blob()?;
    let base = base_archive(&blob)?;

    match fs::remove_file(img_path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
        _ => {}
    }

    let scratch = tempfile::Builder::new()
        .prefix("rapidos")
        .tempdir_in(work_dir)?;
    let opts = ToolkitOpts {
        builder: manifest.builder,
        packages: &packages,
        extra_files: &files,
        base_archive: &base,
        output: img_path,
        init_cmd: INIT_CMD,
        default_shell: DEFAULT_SHELL,
        temp_dir: scratch.path(),
    };
    if conf.debug() {
        debug!("{} options: {opts:?}", toolkit.name());
    }

    info!(
        "cutting {} with {} ({} packages, {} files)",
        manifest.name,
        toolkit.name(),
        packages.len(),
        files.len()
    );
    toolkit.create(&opts)?;

    manifest.resources.apply(img_path)?;
    info!("image ready at {}", img_path.display());
    Ok(())
}
