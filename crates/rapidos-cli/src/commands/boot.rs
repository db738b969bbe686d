use super::{ConfArgs, EXIT_SUCCESS};
use rapidos_config::Config;
use std::path::Path;

pub fn run(conf_args: &ConfArgs<'_>, img: &Path, pid_dir: &Path) -> Result<u8, String> {
    if !img.exists() {
        return Err(format!(
            "image {} doesn't exist, run `rapidos cut <NAME>` first",
            img.display()
        ));
    }
    let conf = conf_args.load()?;
    boot_image(&conf, img, pid_dir)
}

/// Blocks until the VM shuts down.
pub fn boot_image(conf: &Config, img: &Path, pid_dir: &Path) -> Result<u8, String> {
    rapidos_vm::boot(conf, img, pid_dir).map_err(|e| format!("failed to boot VM: {e}"))?;
    Ok(EXIT_SUCCESS)
}
