/// A manifest shipped with rapidos, kept as TOML source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinManifest {
    pub name: &'static str,
    pub source: &'static str,
}

pub const BUILTIN_MANIFESTS: &[BuiltinManifest] = &[
    BuiltinManifest {
        name: "example",
        source: r#"name = "example"
description = "Simple annotated example"
init = "gitlab.com/rapidos/rapidos/inits/example/uinit"
builder = "combined-binary"

[inventory]
packages = [
  "github.com/u-root/u-root/cmds/exp/rush",
  "github.com/u-root/u-root/cmds/core/ls",
  "github.com/u-root/u-root/cmds/core/pwd",
  "github.com/u-root/u-root/cmds/core/cat",
  "github.com/u-root/u-root/cmds/exp/modprobe",
  "github.com/u-root/u-root/cmds/core/dmesg",
  "github.com/u-root/u-root/cmds/core/mount",
  "github.com/u-root/u-root/cmds/core/df",
  "github.com/u-root/u-root/cmds/core/mkdir",
  "github.com/u-root/u-root/cmds/core/shutdown",
]
kmods = ["zram", "lzo"]
bins = ["mkfs.xfs"]

[resources]
network = false
cpus = 2
memory = "512M"
"#,
    },
    BuiltinManifest {
        name: "etcd",
        source: r#"name = "etcd"
description = "Distributed key-value store"
init = "gitlab.com/rapidos/rapidos/inits/etcd/uinit"
# vendored subdirectories need one binary per package
builder = "separate-binaries"

[inventory]
packages = ["go.etcd.io/etcd"]
kmods = ["zram", "lzo", "lzo-rle"]
bins = ["mkfs.xfs"]

[resources]
network = true
cpus = 2
memory = "1024M"
"#,
    },
    BuiltinManifest {
        name: "lio-local",
        source: r#"name = "lio-local"
description = "LIO iSCSI target"
init = "gitlab.com/rapidos/rapidos/inits/lio_local/uinit"

[inventory]
packages = [
  "github.com/u-root/u-root/cmds/exp/rush",
  "github.com/u-root/u-root/cmds/core/ls",
  "github.com/u-root/u-root/cmds/core/pwd",
  "github.com/u-root/u-root/cmds/core/cat",
  "github.com/u-root/u-root/cmds/core/dmesg",
  "github.com/u-root/u-root/cmds/core/df",
  "github.com/u-root/u-root/cmds/core/echo",
  "github.com/u-root/u-root/cmds/core/mkdir",
  "github.com/u-root/u-root/cmds/core/shutdown",
]
kmods = [
  "zram", "lzo", "lzo-rle",
  "iscsi_target_mod", "target_core_mod", "target_core_iblock",
]

[resources]
network = true
cpus = 2
memory = "2048"
"#,
    },
    BuiltinManifest {
        name: "minio",
        source: r#"name = "minio"
description = "Object storage server"
init = "gitlab.com/rapidos/rapidos/inits/minio/uinit"
builder = "separate-binaries"

[inventory]
packages = ["github.com/minio/minio"]
kmods = ["zram", "lzo", "lzo-rle"]
bins = ["mkfs.xfs"]

[resources]
network = true
cpus = 2
memory = "1024M"
"#,
    },
    BuiltinManifest {
        name: "cifsd",
        source: r#"name = "cifsd"
description = "In-kernel SMB server"
init = "gitlab.com/rapidos/rapidos/inits/cifsd/uinit"
builder = "combined-binary"

[inventory]
packages = [
  "github.com/u-root/u-root/cmds/exp/rush",
  "github.com/u-root/u-root/cmds/core/chmod",
  "github.com/u-root/u-root/cmds/core/ls",
  "github.com/u-root/u-root/cmds/core/strace",
  "github.com/u-root/u-root/cmds/core/pwd",
  "github.com/u-root/u-root/cmds/core/cat",
  "github.com/u-root/u-root/cmds/exp/modprobe",
  "github.com/u-root/u-root/cmds/core/dmesg",
  "github.com/u-root/u-root/cmds/core/mount",
  "github.com/u-root/u-root/cmds/core/df",
  "github.com/u-root/u-root/cmds/core/mkdir",
  "github.com/u-root/u-root/cmds/core/shutdown",
  "github.com/u-root/u-root/cmds/core/ps",
  "github.com/u-root/u-root/cmds/core/ip",
]
kmods = ["zram", "lzo", "lzo-rle", "cifsd"]
bins = ["mkfs.xfs", "cifsd", "cifsadmin"]
bin_dirs = [
  "${CIFSD_TOOLS_SRC}/cifsadmin/.libs",
  "${CIFSD_TOOLS_SRC}/cifsd/.libs",
]

[resources]
network = true
cpus = 2
memory = "1024M"
"#,
    },
    BuiltinManifest {
        name: "prometheus",
        source: r#"name = "prometheus"
description = "Monitoring system"
init = "gitlab.com/rapidos/rapidos/inits/prometheus/uinit"
builder = "separate-binaries"

[inventory]
packages = ["github.com/prometheus/prometheus/cmd/prometheus"]

[resources]
network = true
cpus = 2
memory = "512M"
"#,
    },
];

pub fn builtin_manifests() -> &'static [BuiltinManifest] {
    BUILTIN_MANIFESTS
}
