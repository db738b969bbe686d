//! VM resource settings and their on-image encoding.
//!
//! Resources are packed into the QEMU-parameter-like string
//! `-smp cpus=<N> -m <Memory>` and stored as a `user.rapido.` extended
//! attribute on the cut image, keeping images bootable by rapido's `vm.sh`.
//! Networking is recorded as an opt-out: a second attribute holds `"1"` when
//! the VM should run without a network device.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub const XATTR_NETWORKLESS: &str = "user.rapido.vm_networkless";
pub const XATTR_RESOURCES: &str = "user.rapido.vm_resources";

pub const DEFAULT_CPUS: u8 = 2;
pub const DEFAULT_MEMORY: &str = "512M";

/// Attribute values longer than this are treated as corrupt.
const XATTR_MAX_LEN: usize = 256;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource xattr I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid CPU resource {0}, expected 1-255")]
    InvalidCpus(i64),
    #[error("invalid memory resource '{value}': {reason}")]
    InvalidMemory { value: String, reason: String },
    #[error("malformed resource string '{0}', expected '-smp cpus=<N> -m <Memory>'")]
    Malformed(String),
    #[error("unexpected {name} xattr value of {len} bytes")]
    OversizedAttribute { name: &'static str, len: usize },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Resources {
    /// Connect the VM to the bridge network through a tap device.
    #[serde(default = "default_network")]
    pub network: bool,
    /// Number of SMP virtual CPUs.
    #[serde(default = "default_cpus")]
    pub cpus: u8,
    /// MiB by default, or with an explicit `M`/`G` suffix.
    #[serde(default = "default_memory")]
    pub memory: String,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            network: default_network(),
            cpus: default_cpus(),
            memory: default_memory(),
        }
    }
}

fn default_network() -> bool {
    true
}

fn default_cpus() -> u8 {
    DEFAULT_CPUS
}

fn default_memory() -> String {
    DEFAULT_MEMORY.to_owned()
}

pub fn pack_mem_cpu(cpus: u8, memory: &str) -> Result<String, ResourceError> {
    if cpus < 1 {
        return Err(ResourceError::InvalidCpus(i64::from(cpus)));
    }
    if memory.is_empty() {
        return Err(ResourceError::InvalidMemory {
            value: String::new(),
            reason: "empty memory string".to_owned(),
        });
    }
    Ok(format!("-smp cpus={cpus} -m {memory}"))
}

/// Parse a number with an optional single `M`/`m` or `G`/`g` suffix.
pub fn validate_mem_str(mem: &str) -> Result<(), ResourceError> {
    let invalid = |reason: String| ResourceError::InvalidMemory {
        value: mem.to_owned(),
        reason,
    };

    let digits = mem.trim_end_matches(['M', 'm', 'G', 'g']);
    let suffix = &mem[digits.len()..];
    if suffix.len() > 1 {
        return Err(invalid(format!("invalid suffix '{suffix}'")));
    }
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("expected <uint>[M|G]".to_owned()));
    }
    digits
        .parse::<u64>()
        .map_err(|e| invalid(e.to_string()))?;
    Ok(())
}

/// Reverse of [`pack_mem_cpu`], validating both values.
pub fn unpack_mem_cpu(value: &str) -> Result<(u8, String), ResourceError> {
    let malformed = || ResourceError::Malformed(value.to_owned());

    let fields: Vec<&str> = value.split_whitespace().collect();
    let [smp, cpus_field, m, memory] = fields.as_slice() else {
        return Err(malformed());
    };
    if *smp != "-smp" || *m != "-m" {
        return Err(malformed());
    }
    let cpus: i64 = cpus_field
        .strip_prefix("cpus=")
        .ok_or_else(malformed)?
        .parse()
        .map_err(|_| malformed())?;
    let cpus = u8::try_from(cpus)
        .ok()
        .filter(|c| *c >= 1)
        .ok_or(ResourceError::InvalidCpus(cpus))?;

    validate_mem_str(memory)?;
    Ok((cpus, (*memory).to_owned()))
}

impl Resources {
    /// Store these settings as xattrs on `img_path`.
    ///
    /// Only ever adds attributes; the caller is responsible for starting from
    /// a fresh file so that a stale networkless marker cannot survive.
    pub fn apply(&self, img_path: &Path) -> Result<(), ResourceError> {
        if !self.network {
            xattr::set(img_path, XATTR_NETWORKLESS, b"1")?;
        }

        let packed = pack_mem_cpu(self.cpus, &self.memory)?;
        xattr::set(img_path, XATTR_RESOURCES, packed.as_bytes())?;
        debug!(
            "applied resources to {}: network={} {packed}",
            img_path.display(),
            self.network
        );
        Ok(())
    }

    /// Restore settings from `img_path` xattrs, keeping the defaults
    /// (network on, 2 CPUs, 512M) for any attribute that is absent.
    pub fn retrieve(img_path: &Path) -> Result<Self, ResourceError> {
        let mut resources = Self::default();

        if let Some(val) = read_attr(img_path, XATTR_NETWORKLESS)? {
            if val == b"1" {
                resources.network = false;
            }
        }

        if let Some(val) = read_attr(img_path, XATTR_RESOURCES)? {
            let packed = String::from_utf8_lossy(&val);
            let (cpus, memory) = unpack_mem_cpu(&packed)?;
            resources.cpus = cpus;
            resources.memory = memory;
        }

        debug!("retrieved resources from {}: {resources:?}", img_path.display());
        Ok(resources)
    }
}

fn read_attr(path: &Path, name: &'static str) -> Result<Option<Vec<u8>>, ResourceError> {
    match xattr::get(path, name)? {
        Some(val) if val.len() > XATTR_MAX_LEN => Err(ResourceError::OversizedAttribute {
            name,
            len: val.len(),
        }),
        other => Ok(other),
    }
}
