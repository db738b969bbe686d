use crate::pidfile::{check_running, pid_path};
use crate::qemu::{qemu_args, HYPERVISOR_BINARIES};
use crate::VmError;
use rapidos_config::Config;
use rapidos_cut::find_bins;
use rapidos_schema::Resources;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

pub const MAX_NETWORKED_VMS: u32 = 3;
pub const MAX_NETWORKLESS_VMS: u32 = 1000;

/// A free VM slot and the PID file the hypervisor will claim it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub index: u32,
    pub pid_path: PathBuf,
}

pub fn slot_bound(network: bool) -> u32 {
    if network {
        MAX_NETWORKED_VMS
    } else {
        MAX_NETWORKLESS_VMS
    }
}

/// Lowest slot in `1..=bound` without a live process, if any.
///
/// Nothing is reserved here; two launchers racing may pick the same slot.
pub fn select_slot(pid_dir: &Path, bound: u32) -> Result<Option<Slot>, VmError> {
    for index in 1..=bound {
        let path = pid_path(pid_dir, index);
        if !check_running(&path)? {
            return Ok(Some(Slot {
                index,
                pid_path: path,
            }));
        }
        debug!("VM slot {index} in use");
    }
    Ok(None)
}

/// Boot `img_path` in the first free slot, blocking until the VM exits.
///
/// The hypervisor shares this process's terminal.
pub fn boot(conf: &Config, img_path: &Path, pid_dir: &Path) -> Result<(), VmError> {
    let resources = Resources::retrieve(img_path)?;
    let bound = slot_bound(resources.network);
    let slot = select_slot(pid_dir, bound)?.ok_or(VmError::CapacityExceeded(bound))?;

    let hypervisor = find_bins(&HYPERVISOR_BINARIES, true)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            VmError::HypervisorNotFound(HYPERVISOR_BINARIES.iter().map(|b| (*b).to_owned()).collect())
        })?;
    let kernel = conf.kernel_image_path()?;
    let args = qemu_args(conf, &resources, &slot, &kernel, img_path)?;

    debug!("{} {}", hypervisor.display(), args.join(" "));
    info!("booting {} in VM slot {}", img_path.display(), slot.index);

    let status = Command::new(&hypervisor)
        .args(&args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(VmError::HypervisorFailed {
            binary: hypervisor.display().to_string(),
            status: status.to_string(),
        })
    }
}
