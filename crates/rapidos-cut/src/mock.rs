use crate::cpio::{ArchiveMd, NewcWriter};
use crate::toolkit::{ArchiveToolkit, ToolkitError, ToolkitOpts};
use std::fs;
use std::io;

/// Image path of the listing the mock toolkit writes in place of compiled
/// packages.
pub const MOCK_LISTING_PATH: &str = "rapidos-mock.txt";

/// Toolkit that needs no Go toolchain: the output is the base skeleton
/// followed by a second archive holding a plain text description of the
/// request. Extra file sources must exist, as with a real toolkit.
#[derive(Debug, Default)]
pub struct MockToolkit;

impl MockToolkit {
    pub fn new() -> Self {
        Self
    }

    pub fn listing(opts: &ToolkitOpts<'_>) -> String {
        let mut out = format!(
            "builder {}\ninit {}\nshell {}\n",
            opts.builder, opts.init_cmd, opts.default_shell
        );
        for pkg in opts.packages {
            out.push_str(&format!("package {pkg}\n"));
        }
        for file in opts.extra_files {
            out.push_str(&format!("file {file}\n"));
        }
        out
    }
}

impl ArchiveToolkit for MockToolkit {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn create(&self, opts: &ToolkitOpts<'_>) -> Result<(), ToolkitError> {
        for file in opts.extra_files {
            if !file.source.exists() {
                return Err(ToolkitError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} does not exist", file.source.display()),
                )));
            }
        }

        let mut w = NewcWriter::new(opts.base_archive.to_vec());
        w.append(
            MOCK_LISTING_PATH,
            &ArchiveMd::file(0o644),
            Self::listing(opts).as_bytes(),
        )?;
        let image = w.finish()?;
        fs::write(opts.output, image)?;
        Ok(())
    }
}
