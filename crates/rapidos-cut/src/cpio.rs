//! Minimal newc ("070701") cpio writer for the base image skeleton.
//!
//! Only the entry kinds the skeleton needs are supported: directories,
//! character devices and regular files with in-memory content. All entries
//! are owned by root with a zero mtime so the skeleton is reproducible.

use std::io::{self, Write};

pub const S_IFMT: u32 = 0o170_000;
pub const S_IFDIR: u32 = 0o040_000;
pub const S_IFCHR: u32 = 0o020_000;
pub const S_IFREG: u32 = 0o100_000;

const NEWC_MAGIC: &[u8; 6] = b"070701";
const NEWC_HDR_LEN: usize = 110;
const TRAILER: &str = "TRAILER!!!";

/// Image path of the serialized configuration read by the booted init.
pub const CONF_BLOB_PATH: &str = "rapidos.conf.bin";

/// `(path, permission bits)` for the skeleton directories.
pub const BASE_DIRS: &[(&str, u32)] = &[
    ("etc", 0o755),
    ("dev", 0o755),
    ("tmp", 0o777),
    ("ubin", 0o755),
    ("usr", 0o755),
    ("usr/lib", 0o755),
    ("var", 0o755),
    ("var/log", 0o777),
    ("lib64", 0o755),
    ("bin", 0o755),
];

/// `(path, permission bits, major, minor)` for the skeleton device nodes.
pub const BASE_DEVICES: &[(&str, u32, u32, u32)] = &[
    ("dev/console", 0o600, 5, 1),
    ("dev/tty", 0o666, 5, 0),
    ("dev/null", 0o666, 1, 3),
    ("dev/port", 0o640, 1, 4),
    ("dev/urandom", 0o666, 1, 9),
];

/// Metadata of one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMd {
    pub mode: u32,
    pub nlink: u32,
    pub rmajor: u32,
    pub rminor: u32,
}

impl ArchiveMd {
    pub fn dir(perm: u32) -> Self {
        Self {
            mode: S_IFDIR | perm,
            nlink: 2,
            rmajor: 0,
            rminor: 0,
        }
    }

    pub fn char_dev(perm: u32, major: u32, minor: u32) -> Self {
        Self {
            mode: S_IFCHR | perm,
            nlink: 1,
            rmajor: major,
            rminor: minor,
        }
    }

    pub fn file(perm: u32) -> Self {
        Self {
            mode: S_IFREG | perm,
            nlink: 1,
            rmajor: 0,
            rminor: 0,
        }
    }
}

pub struct NewcWriter<W: Write> {
    inner: W,
    next_ino: u32,
    offset: usize,
}

impl<W: Write> NewcWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            next_ino: 1,
            offset: 0,
        }
    }

    pub fn append(&mut self, path: &str, md: &ArchiveMd, data: &[u8]) -> io::Result<()> {
        let ino = self.next_ino;
        self.next_ino += 1;
        self.write_entry(ino, path, md, data)
    }

    /// Write the trailer and hand back the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        let md = ArchiveMd {
            mode: 0,
            nlink: 1,
            rmajor: 0,
            rminor: 0,
        };
        self.write_entry(0, TRAILER, &md, &[])?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn write_entry(&mut self, ino: u32, path: &str, md: &ArchiveMd, data: &[u8]) -> io::Result<()> {
        let filesize = u32::try_from(data.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "cpio entry too large"))?;
        let namesize = u32::try_from(path.len() + 1)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "cpio name too long"))?;

        let fields = [
            ino, md.mode, 0, 0, md.nlink, 0, filesize, 0, 0, md.rmajor, md.rminor, namesize, 0,
        ];
        let mut hdr = Vec::with_capacity(NEWC_HDR_LEN + path.len() + 4);
        hdr.extend_from_slice(NEWC_MAGIC);
        for field in fields {
            hdr.extend_from_slice(format!("{field:08x}").as_bytes());
        }
        hdr.extend_from_slice(path.as_bytes());
        hdr.push(0);
        self.write_padded(&hdr)?;
        self.write_padded(data)
    }

    fn write_padded(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)?;
        self.offset += buf.len();
        let pad = (4 - self.offset % 4) % 4;
        self.inner.write_all(&[0u8; 3][..pad])?;
        self.offset += pad;
        Ok(())
    }
}

/// The skeleton every image starts from: standard directories, device
/// nodes and the configuration blob at [`CONF_BLOB_PATH`].
pub fn base_archive(conf_blob: &[u8]) -> io::Result<Vec<u8>> {
    let mut w = NewcWriter::new(Vec::new());
    for (path, perm) in BASE_DIRS {
        w.append(path, &ArchiveMd::dir(*perm), &[])?;
    }
    for (path, perm, major, minor) in BASE_DEVICES {
        w.append(path, &ArchiveMd::char_dev(*perm, *major, *minor), &[])?;
    }
    w.append(CONF_BLOB_PATH, &ArchiveMd::file(0o600), conf_blob)?;
    w.finish()
}

/// One entry read back from a newc archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: String,
    pub md: ArchiveMd,
    pub data: Vec<u8>,
}

/// Parse a newc archive up to its trailer. Concatenated archives are read
/// one after another until the input is exhausted.
pub fn read_entries(mut buf: &[u8]) -> io::Result<Vec<Entry>> {
    let bad = |msg: &str| io::Error::new(io::ErrorKind::InvalidData, msg.to_owned());
    let mut entries = Vec::new();
    let start_len = buf.len();

    while !buf.is_empty() {
        if buf.iter().all(|b| *b == 0) {
            break;
        }
        if buf.len() < NEWC_HDR_LEN || &buf[..6] != NEWC_MAGIC {
            return Err(bad("bad newc header"));
        }
        let field = |i: usize| -> io::Result<u32> {
            let raw = &buf[6 + i * 8..6 + (i + 1) * 8];
            let text = std::str::from_utf8(raw).map_err(|_| bad("non-ascii header field"))?;
            u32::from_str_radix(text, 16).map_err(|_| bad("non-hex header field"))
        };
        let mode = field(1)?;
        let nlink = field(4)?;
        let filesize = field(6)? as usize;
        let rmajor = field(9)?;
        let rminor = field(10)?;
        let namesize = field(11)? as usize;

        let name_end = NEWC_HDR_LEN + namesize;
        if namesize == 0 || buf.len() < name_end {
            return Err(bad("truncated name"));
        }
        let path = String::from_utf8(buf[NEWC_HDR_LEN..name_end - 1].to_vec())
            .map_err(|_| bad("non-utf8 name"))?;
        let data_start = align4(start_len - buf.len() + name_end) - (start_len - buf.len());
        let data_end = data_start + filesize;
        if buf.len() < data_end {
            return Err(bad("truncated data"));
        }
        let data = buf[data_start..data_end].to_vec();
        let next = align4(start_len - buf.len() + data_end) - (start_len - buf.len());
        buf = &buf[next.min(buf.len())..];

        if path == TRAILER {
            continue;
        }
        entries.push(Entry {
            path,
            md: ArchiveMd {
                mode,
                nlink,
                rmajor,
                rminor,
            },
            data,
        });
    }
    Ok(entries)
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}
