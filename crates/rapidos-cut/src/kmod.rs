//! Kernel module discovery through `modules.dep`.
//!
//! Names are matched the way `modprobe` does: the file stem with any `.ko`
//! compression suffix removed and `-` folded into `_`. Dependencies are
//! emitted before the module that needs them, each module at most once per
//! requested name. Modules listed in `modules.builtin` are part of the kernel
//! image and contribute no files.

use crate::ResolveError;
use rapidos_config::KmodsInfo;
use rapidos_schema::FileMapping;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Module metadata copied into every image that carries modules.
pub const MODULE_META_FILES: [&str; 2] = ["modules.dep", "modules.builtin"];

const MODULE_SUFFIXES: [&str; 4] = [".ko.xz", ".ko.gz", ".ko.zst", ".ko"];

/// A host file and where it lands inside the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFile {
    pub source: PathBuf,
    /// Relative to the image root.
    pub dest: PathBuf,
}

impl ModuleFile {
    pub fn to_mapping(&self) -> FileMapping {
        FileMapping::new(self.source.clone(), Some(self.dest.clone()))
    }
}

/// Resolve `names` and their dependencies to files under `info`, followed by
/// the module metadata records.
pub fn resolve_kmods<S: AsRef<str>>(
    names: &[S],
    info: &KmodsInfo,
) -> Result<Vec<ModuleFile>, ResolveError> {
    let mod_dir = modules_dir(info);
    let mut files = Vec::new();

    if !names.is_empty() {
        let db = ModuleDb::load(&mod_dir)?;
        for name in names {
            let name: &str = name.as_ref();
            let mut paths = Vec::new();
            db.visit(&normalize(name), &mut HashMap::new(), &mut paths)?;
            debug!("module {name}: {} file(s)", paths.len());
            files.extend(paths.into_iter().map(|p| module_file(p, &info.install_root)));
        }
    }

    for meta in MODULE_META_FILES {
        files.push(module_file(mod_dir.join(meta), &info.install_root));
    }
    Ok(files)
}

fn modules_dir(info: &KmodsInfo) -> PathBuf {
    info.install_root
        .join("lib/modules")
        .join(&info.kernel_version)
}

/// Destination is the source path with the install root stripped.
fn module_file(source: PathBuf, install_root: &Path) -> ModuleFile {
    let dest = source
        .strip_prefix(install_root)
        .map_or_else(|_| source.clone(), Path::to_path_buf);
    ModuleFile { source, dest }
}

/// Canonical module name: `zram.ko.xz` and `/x/zram.ko` become `zram`,
/// `dm-mod` becomes `dm_mod`.
pub fn normalize(name: &str) -> String {
    let base = name.rsplit('/').next().unwrap_or(name);
    let stem = MODULE_SUFFIXES
        .iter()
        .find_map(|suffix| base.strip_suffix(suffix))
        .unwrap_or(base);
    stem.replace('-', "_")
}

struct ModuleEntry {
    path: PathBuf,
    deps: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Done,
}

struct ModuleDb {
    modules: HashMap<String, ModuleEntry>,
    builtin: HashSet<String>,
}

impl ModuleDb {
    fn load(mod_dir: &Path) -> Result<Self, ResolveError> {
        let dep_path = mod_dir.join("modules.dep");
        let content = fs::read_to_string(&dep_path).map_err(|source| ResolveError::ModuleDb {
            path: dep_path.clone(),
            source,
        })?;
        let modules = parse_modules_dep(&content, mod_dir);

        let builtin_path = mod_dir.join("modules.builtin");
        let builtin = match fs::read_to_string(&builtin_path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(normalize)
                .collect(),
            Err(e) => {
                warn!("ignoring {}: {e}", builtin_path.display());
                HashSet::new()
            }
        };

        debug!(
            "loaded {} modules, {} builtin from {}",
            modules.len(),
            builtin.len(),
            mod_dir.display()
        );
        Ok(Self { modules, builtin })
    }

    fn visit(
        &self,
        name: &str,
        state: &mut HashMap<String, VisitState>,
        out: &mut Vec<PathBuf>,
    ) -> Result<(), ResolveError> {
        match state.get(name) {
            Some(VisitState::Done) => return Ok(()),
            Some(VisitState::InProgress) => {
                return Err(ResolveError::CircularDependency(name.to_owned()))
            }
            None => {}
        }
        if self.builtin.contains(name) {
            debug!("module {name} is builtin");
            state.insert(name.to_owned(), VisitState::Done);
            return Ok(());
        }

        let entry = self
            .modules
            .get(name)
            .ok_or_else(|| ResolveError::ModuleNotFound(name.to_owned()))?;
        state.insert(name.to_owned(), VisitState::InProgress);
        for dep in &entry.deps {
            self.visit(dep, state, out)?;
        }
        out.push(entry.path.clone());
        state.insert(name.to_owned(), VisitState::Done);
        Ok(())
    }
}

/// Parse `path: dep dep ...` lines. Relative paths are relative to
/// `mod_dir`; absolute ones (older depmod output) are taken as is.
fn parse_modules_dep(content: &str, mod_dir: &Path) -> HashMap<String, ModuleEntry> {
    let mut modules = HashMap::new();
    for line in content.lines() {
        let Some((path, deps)) = line.split_once(':') else {
            continue;
        };
        let path = path.trim();
        if path.is_empty() {
            continue;
        }
        modules.insert(
            normalize(path),
            ModuleEntry {
                path: mod_dir.join(path),
                deps: deps.split_whitespace().map(normalize).collect(),
            },
        );
    }
    modules
}

#[cfg(test)]
mod tests {
    use super::*;

    const KVER: &str = "6.1.0-test";

    fn fake_modules(dep: &str, builtin: &str) -> (tempfile::TempDir, KmodsInfo) {
        let root = tempfile::tempdir().unwrap();
        let mod_dir = root.path().join("lib/modules").join(KVER);
        fs::create_dir_all(&mod_dir).unwrap();
        fs::write(mod_dir.join("modules.dep"), dep).unwrap();
        fs::write(mod_dir.join("modules.builtin"), builtin).unwrap();
        let info = KmodsInfo {
            install_root: root.path().to_path_buf(),
            kernel_version: KVER.to_owned(),
        };
        (root, info)
    }

    fn dests(files: &[ModuleFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.dest.display().to_string())
            .collect()
    }

    const ZRAM_DEP: &str = "\
kernel/drivers/block/zram/zram.ko.xz: kernel/lib/lzo/lzo-rle.ko kernel/lib/lzo/lzo_compress.ko
kernel/lib/lzo/lzo-rle.ko: kernel/lib/lzo/lzo_compress.ko
kernel/lib/lzo/lzo_compress.ko:
kernel/lib/lzo/lzo_decompress.ko:
";

    #[test]
    fn normalize_names() {
        assert_eq!(normalize("zram"), "zram");
        assert_eq!(normalize("dm-mod"), "dm_mod");
        assert_eq!(normalize("kernel/drivers/md/dm-mod.ko.zst"), "dm_mod");
        assert_eq!(normalize("/abs/xfs.ko"), "xfs");
        assert_eq!(normalize("lzo_compress.ko.gz"), "lzo_compress");
    }

    #[test]
    fn dependencies_precede_module() {
        let (_root, info) = fake_modules(ZRAM_DEP, "");
        let files = resolve_kmods(&["zram"], &info).unwrap();
        let d = dests(&files);
        let prefix = format!("lib/modules/{KVER}");
        assert_eq!(
            d,
            vec![
                format!("{prefix}/kernel/lib/lzo/lzo_compress.ko"),
                format!("{prefix}/kernel/lib/lzo/lzo-rle.ko"),
                format!("{prefix}/kernel/drivers/block/zram/zram.ko.xz"),
                format!("{prefix}/modules.dep"),
                format!("{prefix}/modules.builtin"),
            ]
        );
        assert!(files[0].source.starts_with(&info.install_root));
        assert!(files.iter().all(|f| f.dest.is_relative()));
    }

    #[test]
    fn no_modules_still_yields_metadata() {
        let info = KmodsInfo {
            install_root: PathBuf::from("/nonexistent/root"),
            kernel_version: KVER.to_owned(),
        };
        let files = resolve_kmods::<&str>(&[], &info).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].dest.ends_with("modules.dep"));
        assert!(files[1].dest.ends_with("modules.builtin"));
    }

    #[test]
    fn builtin_module_contributes_nothing() {
        let (_root, info) = fake_modules(ZRAM_DEP, "kernel/fs/ext4/ext4.ko\n");
        let files = resolve_kmods(&["ext4"], &info).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn unknown_module_fails() {
        let (_root, info) = fake_modules(ZRAM_DEP, "");
        assert!(matches!(
            resolve_kmods(&["nosuchmod"], &info),
            Err(ResolveError::ModuleNotFound(ref n)) if n == "nosuchmod"
        ));
    }

    #[test]
    fn circular_dependency_fails() {
        let (_root, info) = fake_modules("a.ko: b.ko\nb.ko: a.ko\n", "");
        assert!(matches!(
            resolve_kmods(&["a"], &info),
            Err(ResolveError::CircularDependency(_))
        ));
    }

    #[test]
    fn shared_dependency_listed_per_request() {
        let (_root, info) = fake_modules(ZRAM_DEP, "");
        let files = resolve_kmods(&["lzo_compress", "lzo-rle"], &info).unwrap();
        let compress = files
            .iter()
            .filter(|f| f.dest.ends_with("lzo_compress.ko"))
            .count();
        assert_eq!(compress, 2);
    }

    #[test]
    fn missing_module_db_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let info = KmodsInfo {
            install_root: root.path().to_path_buf(),
            kernel_version: KVER.to_owned(),
        };
        assert!(matches!(
            resolve_kmods(&["zram"], &info),
            Err(ResolveError::ModuleDb { .. })
        ));
    }

    #[test]
    fn running_kernel_root_is_stripped() {
        let f = module_file(
            PathBuf::from("/lib/modules/6.1/kernel/zram.ko"),
            Path::new("/"),
        );
        assert_eq!(f.dest, PathBuf::from("lib/modules/6.1/kernel/zram.ko"));
        assert_eq!(
            f.to_mapping().to_string(),
            "/lib/modules/6.1/kernel/zram.ko:lib/modules/6.1/kernel/zram.ko"
        );
    }
}
