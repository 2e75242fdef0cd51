//! Metadata returned by `lstat`, `stat` and `read_dir`

use crate::mode::{FileKind, Mode};

/// Metadata about a single destination entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Final path component
    pub name: String,
    pub kind: FileKind,
    pub mode: Mode,
    pub size: u64,
}

impl FileInfo {
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }

    /// Build from std metadata
    #[cfg(unix)]
    pub(crate) fn from_metadata(name: String, meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::PermissionsExt;

        Self {
            name,
            kind: kind_of(&meta.file_type()),
            mode: Mode::new(meta.permissions().mode()),
            size: meta.len(),
        }
    }

    /// Build from std metadata
    #[cfg(not(unix))]
    pub(crate) fn from_metadata(name: String, meta: &std::fs::Metadata) -> Self {
        let kind = kind_of(&meta.file_type());
        let mode = match (kind, meta.permissions().readonly()) {
            (FileKind::Dir, _) => Mode::new(0o777),
            (_, true) => Mode::new(0o444),
            (_, false) => Mode::new(0o666),
        };
        Self {
            name,
            kind,
            mode,
            size: meta.len(),
        }
    }
}

fn kind_of(file_type: &std::fs::FileType) -> FileKind {
    if file_type.is_symlink() {
        FileKind::Symlink
    } else if file_type.is_dir() {
        FileKind::Dir
    } else if file_type.is_file() {
        FileKind::File
    } else {
        special_kind(file_type)
    }
}

#[cfg(unix)]
fn special_kind(file_type: &std::fs::FileType) -> FileKind {
    use std::os::unix::fs::FileTypeExt;

    if file_type.is_fifo() {
        FileKind::NamedPipe
    } else if file_type.is_socket() {
        FileKind::Socket
    } else if file_type.is_block_device() {
        FileKind::Device
    } else if file_type.is_char_device() {
        FileKind::CharDevice
    } else {
        FileKind::Other
    }
}

#[cfg(not(unix))]
fn special_kind(_file_type: &std::fs::FileType) -> FileKind {
    FileKind::Other
}
