use crate::{Config, ConfigError};

/// How a networked VM obtains its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmAddressing {
    Dhcp,
    Static { ip_addr: String, hostname: String },
}

/// Per-slot network identity from `rapidos.conf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmNetDef {
    pub tap_dev: String,
    pub mac_addr: String,
    pub addressing: VmAddressing,
}

impl Config {
    /// Network definition for the 1-based VM slot `vm_index`.
    ///
    /// Known quirk kept for compatibility with existing configs: the tap
    /// device is read from `TAP_DEV<vm_index - 1>` while every other key uses
    /// `vm_index` itself, e.g. slot 1 is `TAP_DEV0` + `MAC_ADDR1` + `IP_ADDR1`.
    pub fn vm_def(&self, vm_index: u32) -> Result<VmNetDef, ConfigError> {
        if vm_index < 1 {
            return Err(ConfigError::InvalidVmIndex(vm_index));
        }

        let tap_dev = self.require(&format!("TAP_DEV{}", vm_index - 1))?;
        let mac_addr = self.require(&format!("MAC_ADDR{vm_index}"))?;

        let dhcp_key = format!("IP_ADDR{vm_index}_DHCP");
        let use_dhcp = match self.get(&dhcp_key) {
            None | Some("0") => false,
            Some("1") => true,
            Some(other) => {
                return Err(ConfigError::InvalidVmKey {
                    key: dhcp_key,
                    value: other.to_owned(),
                })
            }
        };

        let addressing = if use_dhcp {
            VmAddressing::Dhcp
        } else {
            VmAddressing::Static {
                ip_addr: self.require(&format!("IP_ADDR{vm_index}"))?,
                hostname: self.require(&format!("HOSTNAME{vm_index}"))?,
            }
        };

        Ok(VmNetDef {
            tap_dev,
            mac_addr,
            addressing,
        })
    }

    fn require(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key)
            .map(str::to_owned)
            .ok_or_else(|| ConfigError::MissingVmKey(key.to_owned()))
    }
}
