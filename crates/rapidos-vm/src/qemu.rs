use crate::launcher::Slot;
use crate::VmError;
use rapidos_config::{Config, VmAddressing, VmNetDef};
use rapidos_schema::{Resources, DEFAULT_CPUS, DEFAULT_MEMORY};
use std::path::Path;

/// Hypervisor binaries in order of preference.
pub const HYPERVISOR_BINARIES: [&str; 2] = ["qemu-kvm", "kvm"];

fn network_args(def: &VmNetDef) -> (Vec<String>, String) {
    let args = vec![
        "-device".to_owned(),
        format!("e1000,netdev=nw1,mac={}", def.mac_addr),
        "-netdev".to_owned(),
        format!(
            "tap,id=nw1,script=no,downscript=no,ifname={}",
            def.tap_dev
        ),
    ];
    let kern_ip = match &def.addressing {
        VmAddressing::Dhcp => "ip=dhcp".to_owned(),
        VmAddressing::Static { ip_addr, hostname } => {
            format!("ip={ip_addr}:::255.255.255.0:{hostname}")
        }
    };
    (args, kern_ip)
}

/// Full hypervisor argument list for booting `img_path` with `kernel` in `slot`.
///
/// Zero CPUs or an empty memory string fall back to the defaults.
pub fn qemu_args(
    conf: &Config,
    resources: &Resources,
    slot: &Slot,
    kernel: &Path,
    img_path: &Path,
) -> Result<Vec<String>, VmError> {
    let cpus = match resources.cpus {
        0 => DEFAULT_CPUS,
        n => n,
    };
    let memory = match resources.memory.as_str() {
        "" => DEFAULT_MEMORY,
        m => m,
    };
    let mut args = vec![
        "-smp".to_owned(),
        format!("cpus={cpus}"),
        "-m".to_owned(),
        memory.to_owned(),
    ];

    let kern_ip = if resources.network {
        let (net_args, kern_ip) = network_args(&conf.vm_def(slot.index)?);
        args.extend(net_args);
        kern_ip
    } else {
        args.extend(["-net".to_owned(), "none".to_owned()]);
        "ip=none".to_owned()
    };

    args.extend([
        "-kernel".to_owned(),
        kernel.display().to_string(),
        "-initrd".to_owned(),
        img_path.display().to_string(),
        "-pidfile".to_owned(),
        slot.pid_path.display().to_string(),
        "-append".to_owned(),
        format!("{kern_ip} console=ttyS0"),
    ]);
    args.extend(conf.qemu_extra_args());
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn conf(pairs: &[(&str, &str)]) -> Config {
        let entries = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Config::from_entries(entries, &BTreeMap::new(), false).unwrap()
    }

    fn slot(index: u32) -> Slot {
        Slot {
            index,
            pid_path: PathBuf::from(format!("/run/rapidos/rapido_vm{index}.pid")),
        }
    }

    #[test]
    fn networkless_args() {
        let c = conf(&[("QEMU_EXTRA_ARGS", "-nographic -device virtio-rng-pci")]);
        let r = Resources {
            network: false,
            cpus: 4,
            memory: "1G".to_owned(),
        };
        let args = qemu_args(
            &c,
            &r,
            &slot(7),
            Path::new("/boot/vmlinuz-6.1"),
            Path::new("/imgs/rapidos-img.cpio"),
        )
        .unwrap();
        assert_eq!(
            args,
            vec![
                "-smp",
                "cpus=4",
                "-m",
                "1G",
                "-net",
                "none",
                "-kernel",
                "/boot/vmlinuz-6.1",
                "-initrd",
                "/imgs/rapidos-img.cpio",
                "-pidfile",
                "/run/rapidos/rapido_vm7.pid",
                "-append",
                "ip=none console=ttyS0",
                "-nographic",
                "-device",
                "virtio-rng-pci",
            ]
        );
    }

    #[test]
    fn static_network_args() {
        let c = conf(&[
            ("TAP_DEV0", "tap0"),
            ("MAC_ADDR1", "b8:ac:24:45:c5:01"),
            ("IP_ADDR1", "192.168.155.101"),
            ("HOSTNAME1", "rapido1"),
        ]);
        let args = qemu_args(
            &c,
            &Resources::default(),
            &slot(1),
            Path::new("/k"),
            Path::new("/i"),
        )
        .unwrap();
        assert_eq!(&args[..4], ["-smp", "cpus=2", "-m", "512M"]);
        assert_eq!(
            &args[4..8],
            [
                "-device",
                "e1000,netdev=nw1,mac=b8:ac:24:45:c5:01",
                "-netdev",
                "tap,id=nw1,script=no,downscript=no,ifname=tap0",
            ]
        );
        assert_eq!(
            args.last().unwrap(),
            "ip=192.168.155.101:::255.255.255.0:rapido1 console=ttyS0"
        );
    }

    #[test]
    fn dhcp_network_args() {
        let c = conf(&[
            ("TAP_DEV1", "tap1"),
            ("MAC_ADDR2", "b8:ac:24:45:c5:02"),
            ("IP_ADDR2_DHCP", "1"),
        ]);
        let args = qemu_args(
            &c,
            &Resources::default(),
            &slot(2),
            Path::new("/k"),
            Path::new("/i"),
        )
        .unwrap();
        assert!(args.contains(&"tap,id=nw1,script=no,downscript=no,ifname=tap1".to_owned()));
        assert_eq!(args.last().unwrap(), "ip=dhcp console=ttyS0");
    }

    #[test]
    fn zero_valued_resources_use_defaults() {
        let r = Resources {
            network: false,
            cpus: 0,
            memory: String::new(),
        };
        let args = qemu_args(
            &Config::default(),
            &r,
            &slot(1),
            Path::new("/k"),
            Path::new("/i"),
        )
        .unwrap();
        assert_eq!(&args[..4], ["-smp", "cpus=2", "-m", "512M"]);
    }

    #[test]
    fn networked_slot_without_config_fails() {
        let err = qemu_args(
            &Config::default(),
            &Resources::default(),
            &slot(1),
            Path::new("/k"),
            Path::new("/i"),
        )
        .unwrap_err();
        assert!(matches!(err, VmError::Config(_)));
    }
}
