//! Boots rapidos images as QEMU VMs.
//!
//! Each VM occupies a numbered slot, claimed by QEMU itself writing
//! `rapido_vm<N>.pid` into the PID directory. A slot is free when its PID
//! file is missing or names a process that no longer exists. Networked VMs
//! are limited to the handful of tap devices a typical `rapidos.conf`
//! defines; network-less VMs are bounded only by a large sanity limit.

pub mod launcher;
pub mod pidfile;
pub mod qemu;

pub use launcher::{boot, select_slot, slot_bound, Slot, MAX_NETWORKED_VMS, MAX_NETWORKLESS_VMS};
pub use pidfile::{check_running, pid_path};
pub use qemu::{qemu_args, HYPERVISOR_BINARIES};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("VM I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] rapidos_config::ConfigError),
    #[error("image resources: {0}")]
    Resources(#[from] rapidos_schema::ResourceError),
    #[error("resolve error: {0}")]
    Resolve(#[from] rapidos_cut::ResolveError),
    #[error("corrupt PID file {}: {reason}", .path.display())]
    CorruptPidFile { path: PathBuf, reason: String },
    #[error("failed to find a hypervisor, tried: {}", .0.join(", "))]
    HypervisorNotFound(Vec<String>),
    #[error("only a maximum of {0} VMs is supported")]
    CapacityExceeded(u32),
    #[error("hypervisor {binary} {status}")]
    HypervisorFailed { binary: String, status: String },
}
