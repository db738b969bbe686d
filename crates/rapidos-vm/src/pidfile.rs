use crate::VmError;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Upper bound for the first line of a PID file.
const PIDFILE_LINE_MAX: u64 = 4096;

pub fn pid_path(pid_dir: &Path, vm_index: u32) -> PathBuf {
    pid_dir.join(format!("rapido_vm{vm_index}.pid"))
}

/// Whether the process recorded in `path` is alive.
///
/// A missing file means not running. A process that exists but belongs to
/// another user is reported as not running as well.
pub fn check_running(path: &Path) -> Result<bool, VmError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let corrupt = |reason: &str| VmError::CorruptPidFile {
        path: path.to_path_buf(),
        reason: reason.to_owned(),
    };

    let mut line = Vec::new();
    let n = BufReader::new(file)
        .take(PIDFILE_LINE_MAX)
        .read_until(b'\n', &mut line)?;
    if n == 0 {
        return Err(corrupt("empty"));
    }
    if line.last() != Some(&b'\n') && n as u64 == PIDFILE_LINE_MAX {
        return Err(corrupt("first line too long"));
    }

    let text = std::str::from_utf8(&line).map_err(|_| corrupt("not UTF-8"))?;
    let pid: i32 = text
        .trim()
        .parse()
        .map_err(|_| corrupt(&format!("invalid PID {:?}", text.trim())))?;
    if pid <= 0 {
        return Err(corrupt(&format!("invalid PID {pid}")));
    }

    let alive = process_alive(pid);
    debug!("{}: pid {pid} alive={alive}", path.display());
    Ok(alive)
}

fn process_alive(pid: i32) -> bool {
    // SAFETY: signal 0 only performs existence and permission checks; pid is positive.
    #[allow(unsafe_code)]
    let ret = unsafe { libc::kill(pid, 0) };
    ret == 0
}
