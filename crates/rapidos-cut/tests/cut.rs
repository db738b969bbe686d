use rapidos_config::Config;
use rapidos_cut::cpio::read_entries;
use rapidos_cut::mock::{MockToolkit, MOCK_LISTING_PATH};
use rapidos_cut::{cut, ArchiveToolkit, CutError, ResolveError, ToolkitError, ToolkitOpts};
use rapidos_schema::{parse_manifest_str, Manifest, XATTR_NETWORKLESS, XATTR_RESOURCES};
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const KVER: &str = "6.1.0-rapidos";

struct Fixture {
    _root: tempfile::TempDir,
    conf: Config,
    work: PathBuf,
    img: PathBuf,
    xattr_capable: bool,
}

fn fixture() -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let base = root.path();

    let src = base.join("linux");
    fs::create_dir_all(src.join("include/config")).unwrap();
    fs::write(src.join("include/config/kernel.release"), format!("{KVER}\n")).unwrap();

    let inst = base.join("mods");
    let mod_dir = inst.join("lib/modules").join(KVER);
    fs::create_dir_all(mod_dir.join("kernel/lib/lzo")).unwrap();
    fs::create_dir_all(mod_dir.join("kernel/drivers/block/zram")).unwrap();
    fs::write(
        mod_dir.join("modules.dep"),
        "kernel/drivers/block/zram/zram.ko: kernel/lib/lzo/lzo_compress.ko\nkernel/lib/lzo/lzo_compress.ko:\n",
    )
    .unwrap();
    fs::write(mod_dir.join("modules.builtin"), "kernel/fs/ext4/ext4.ko\n").unwrap();
    fs::write(mod_dir.join("kernel/lib/lzo/lzo_compress.ko"), b"lzo").unwrap();
    fs::write(mod_dir.join("kernel/drivers/block/zram/zram.ko"), b"zram").unwrap();

    let tools = base.join("tools/bin");
    fs::create_dir_all(&tools).unwrap();
    let tool = tools.join("rapidos-test-mkfs");
    fs::write(&tool, "#!/bin/sh\n").unwrap();
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

    let work = base.join("work");
    fs::create_dir(&work).unwrap();
    let img = base.join("img.cpio");

    let probe = base.join("probe");
    fs::write(&probe, b"").unwrap();
    let xattr_capable = xattr::set(&probe, "user.rapidos.probe", b"1").is_ok();

    let entries: BTreeMap<String, String> = [
        ("KERNEL_SRC", src.display().to_string()),
        ("KERNEL_INSTALL_MOD_PATH", inst.display().to_string()),
        ("TOOLS_SRC", base.join("tools").display().to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v))
    .collect();
    let conf = Config::from_entries(entries, &BTreeMap::new(), false).unwrap();

    Fixture {
        _root: root,
        conf,
        work,
        img,
        xattr_capable,
    }
}

fn zram_manifest() -> Manifest {
    parse_manifest_str(
        r#"
name = "zram-test"
init = "example.org/inits/zram/uinit"

[inventory]
kmods = ["zram"]
bins = ["rapidos-test-mkfs"]
bin_dirs = ["${TOOLS_SRC}/bin"]

[resources]
network = false
"#,
    )
    .unwrap()
}

fn listing(img: &Path) -> String {
    let entries = read_entries(&fs::read(img).unwrap()).unwrap();
    let entry = entries
        .iter()
        .find(|e| e.path == MOCK_LISTING_PATH)
        .unwrap();
    String::from_utf8(entry.data.clone()).unwrap()
}

#[test]
fn cut_with_modules_and_bins() {
    let f = fixture();
    let result = cut(&f.conf, &zram_manifest(), &MockToolkit::new(), &f.work, &f.img);

    if !f.xattr_capable {
        assert!(matches!(result, Err(CutError::Resources(_))));
        return;
    }
    result.unwrap();

    let text = listing(&f.img);
    let lzo = text.find("lzo_compress.ko").unwrap();
    let zram = text.find("zram.ko").unwrap();
    assert!(lzo < zram, "dependency must precede module:\n{text}");
    assert!(text.contains(&format!(":lib/modules/{KVER}/modules.dep")));
    assert!(text.contains(&format!(":lib/modules/{KVER}/modules.builtin")));
    assert!(text.contains("tools/bin/rapidos-test-mkfs"));
    assert!(text.contains("package github.com/u-root/u-root/cmds/core/init"));
    assert!(text.contains("package example.org/inits/zram/uinit"));
    assert!(text.contains("builder combined-binary"));

    assert_eq!(
        xattr::get(&f.img, XATTR_NETWORKLESS).unwrap().as_deref(),
        Some(&b"1"[..])
    );
    assert_eq!(
        xattr::get(&f.img, XATTR_RESOURCES).unwrap().as_deref(),
        Some(&b"-smp cpus=2 -m 512M"[..])
    );

    // scratch space is cleaned up
    assert_eq!(fs::read_dir(&f.work).unwrap().count(), 0);
}

#[test]
fn conf_blob_is_embedded() {
    let f = fixture();
    let manifest = parse_manifest_str("name = \"plain\"\ninit = \"example.org/uinit\"\n").unwrap();
    let result = cut(&f.conf, &manifest, &MockToolkit::new(), &f.work, &f.img);
    if !f.xattr_capable {
        return;
    }
    result.unwrap();

    let entries = read_entries(&fs::read(&f.img).unwrap()).unwrap();
    let blob = entries
        .iter()
        .find(|e| e.path == "rapidos.conf.bin")
        .unwrap();
    let back: BTreeMap<String, String> = serde_json::from_slice(&blob.data).unwrap();
    assert_eq!(&back, f.conf.entries());
}

#[test]
fn unknown_module_leaves_previous_image() {
    let f = fixture();
    fs::write(&f.img, b"previous").unwrap();
    let manifest = parse_manifest_str(
        "name = \"bad\"\ninit = \"example.org/uinit\"\n[inventory]\nkmods = [\"nosuchmod\"]\n",
    )
    .unwrap();

    let err = cut(&f.conf, &manifest, &MockToolkit::new(), &f.work, &f.img).unwrap_err();
    assert!(matches!(
        err,
        CutError::Resolve(ResolveError::ModuleNotFound(ref n)) if n == "nosuchmod"
    ));
    assert_eq!(fs::read(&f.img).unwrap(), b"previous");
}

#[test]
fn missing_binary_fails() {
    let f = fixture();
    let manifest = parse_manifest_str(
        "name = \"bad\"\ninit = \"example.org/uinit\"\n[inventory]\nbins = [\"rapidos-no-such-tool\"]\n",
    )
    .unwrap();
    let err = cut(&f.conf, &manifest, &MockToolkit::new(), &f.work, &f.img).unwrap_err();
    assert!(matches!(err, CutError::Resolve(ResolveError::BinaryNotFound(_))));
}

struct FailingToolkit;

impl ArchiveToolkit for FailingToolkit {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn create(&self, _opts: &ToolkitOpts<'_>) -> Result<(), ToolkitError> {
        Err(ToolkitError::Failed {
            tool: "failing".to_owned(),
            status: "exit status: 1".to_owned(),
            stderr: "go: cannot find main module".to_owned(),
        })
    }
}

#[test]
fn toolkit_error_is_returned_verbatim() {
    let f = fixture();
    fs::write(&f.img, b"stale").unwrap();
    let manifest = parse_manifest_str("name = \"plain\"\ninit = \"example.org/uinit\"\n").unwrap();

    let err = cut(&f.conf, &manifest, &FailingToolkit, &f.work, &f.img).unwrap_err();
    assert!(matches!(
        err,
        CutError::Toolkit(ToolkitError::Failed { ref stderr, .. }) if stderr == "go: cannot find main module"
    ));
    // the stale image was removed before the toolkit ran
    assert!(!f.img.exists());
}

#[test]
fn unresolved_bin_dir_reference_fails() {
    let f = fixture();
    let manifest = parse_manifest_str(
        "name = \"bad\"\ninit = \"example.org/uinit\"\n[inventory]\nbins = [\"sh\"]\nbin_dirs = [\"${UNSET_DIR}/bin\"]\n",
    )
    .unwrap();
    let err = cut(&f.conf, &manifest, &MockToolkit::new(), &f.work, &f.img).unwrap_err();
    assert!(matches!(err, CutError::Config(_)));
}
