use crate::toolkit::{ArchiveToolkit, ToolkitError, ToolkitOpts};
use rapidos_schema::BuilderKind;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Drives the `u-root` command to compile packages and assemble the image.
pub struct UrootToolkit {
    binary: PathBuf,
}

impl Default for UrootToolkit {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("u-root"),
        }
    }
}

impl UrootToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn build_flag(builder: BuilderKind) -> &'static str {
        match builder {
            BuilderKind::CombinedBinary => "bb",
            BuilderKind::SeparateBinaries => "binary",
        }
    }

    pub fn command_args(opts: &ToolkitOpts<'_>, base_path: &Path) -> Vec<String> {
        let mut args = vec![
            "-format=cpio".to_owned(),
            format!("-build={}", Self::build_flag(opts.builder)),
            format!("-base={}", base_path.display()),
        ];
        args.extend(opts.extra_files.iter().map(|f| format!("-files={f}")));
        args.push(format!("-initcmd={}", opts.init_cmd));
        args.push(format!("-defaultsh={}", opts.default_shell));
        args.push(format!("-o={}", opts.output.display()));
        args.extend(opts.packages.iter().cloned());
        args
    }
}

impl ArchiveToolkit for UrootToolkit {
    fn name(&self) -> &'static str {
        "u-root"
    }

    fn create(&self, opts: &ToolkitOpts<'_>) -> Result<(), ToolkitError> {
        let base_path = opts.temp_dir.join("base.cpio");
        fs::write(&base_path, opts.base_archive)?;

        let args = Self::command_args(opts, &base_path);
        debug!("{} {}", self.binary.display(), args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .env("CGO_ENABLED", "0")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    ToolkitError::Unavailable(self.binary.display().to_string())
                }
                _ => ToolkitError::Io(e),
            })?;

        if !output.stdout.is_empty() {
            debug!("u-root: {}", String::from_utf8_lossy(&output.stdout).trim_end());
        }
        if output.status.success() {
            Ok(())
        } else {
            Err(ToolkitError::Failed {
                tool: self.binary.display().to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_owned(),
            })
        }
    }
}
