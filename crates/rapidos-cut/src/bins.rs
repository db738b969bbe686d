use crate::ResolveError;
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Appended to the search path so admin tools such as `mkfs.xfs` resolve
/// for unprivileged users too.
const SBIN_DIRS: [&str; 2] = ["/usr/sbin", "/sbin"];

static SEARCH_PATH_LOCK: Mutex<()> = Mutex::new(());

/// Extends `PATH` for as long as it lives and restores the exact previous
/// value (or absence) when dropped, including on error paths.
///
/// Guards serialize against each other, but any other code reading `PATH`
/// concurrently will observe the extended value.
pub struct SearchPathGuard {
    saved: Option<OsString>,
    _lock: MutexGuard<'static, ()>,
}

impl SearchPathGuard {
    /// Append the sbin directories and then `extra_dirs` to `PATH`.
    pub fn extend(extra_dirs: &[PathBuf]) -> Self {
        let lock = SEARCH_PATH_LOCK
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let saved = env::var_os("PATH");

        let mut path = saved.clone().unwrap_or_default();
        let additions = SBIN_DIRS
            .iter()
            .map(OsStr::new)
            .chain(extra_dirs.iter().map(|d| d.as_os_str()));
        for dir in additions {
            if !path.is_empty() {
                path.push(":");
            }
            path.push(dir);
        }
        debug!("search path extended to {}", path.to_string_lossy());
        env::set_var("PATH", &path);

        Self { saved, _lock: lock }
    }
}

impl Drop for SearchPathGuard {
    fn drop(&mut self) {
        match &self.saved {
            Some(path) => env::set_var("PATH", path),
            None => env::remove_var("PATH"),
        }
    }
}

/// Locate each of `names` on the extended search path, returning absolute
/// paths in input order. With `ignore_missing`, names that cannot be found
/// are skipped instead of failing the lookup.
pub fn find_bins<S: AsRef<str>>(
    names: &[S],
    ignore_missing: bool,
) -> Result<Vec<PathBuf>, ResolveError> {
    find_bins_in(names, &[], ignore_missing)
}

/// Like [`find_bins`] with additional search directories after the defaults.
pub fn find_bins_in<S: AsRef<str>>(
    names: &[S],
    extra_dirs: &[PathBuf],
    ignore_missing: bool,
) -> Result<Vec<PathBuf>, ResolveError> {
    let _guard = SearchPathGuard::extend(extra_dirs);

    let mut found = Vec::with_capacity(names.len());
    for name in names {
        let name: &str = name.as_ref();
        match which::which(name) {
            Ok(path) => found.push(absolute(&path)?),
            Err(e) if ignore_missing => debug!("skipping {name}: {e}"),
            Err(_) => return Err(ResolveError::BinaryNotFound(name.to_owned())),
        }
    }
    Ok(found)
}

fn absolute(path: &Path) -> Result<PathBuf, ResolveError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::path::absolute(path)?)
}
