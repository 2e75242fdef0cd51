//! Permission bits and file kinds
//!
//! Raw OS mode bits are converted to these types only at the real
//! filesystem boundary.

use std::fmt;

/// Permission bits (setuid/setgid/sticky plus owner/group/other rwx)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mode(u32);

impl Mode {
    /// Mask of all bits a `Mode` may carry
    pub const MASK: u32 = 0o7777;

    /// Default umask applied to new files
    pub const DEFAULT_UMASK: Mode = Mode(0o022);

    /// Regular file default before umask
    pub const FILE: Mode = Mode(0o666);

    /// Directory / executable default before umask
    pub const EXECUTABLE: Mode = Mode(0o777);

    /// Create a mode, discarding any bits outside [`Mode::MASK`]
    pub const fn new(bits: u32) -> Self {
        Self(bits & Self::MASK)
    }

    /// Raw permission bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Parse an octal string such as `644`, `0755` or `0o600`
    ///
    /// Strings carrying bits outside the permission mask are rejected.
    pub fn parse_octal(s: &str) -> Option<Self> {
        let digits = s.strip_prefix("0o").unwrap_or(s);
        let bits = u32::from_str_radix(digits, 8).ok()?;
        if bits & Self::MASK != bits {
            return None;
        }
        Some(Self(bits))
    }

    /// Clear the bits set in `umask`
    pub const fn apply_umask(self, umask: Mode) -> Self {
        Self(self.0 & !umask.0)
    }

    /// Clear group and other bits
    pub const fn private(self) -> Self {
        Self(self.0 & !0o077)
    }

    /// Whether any execute bit is set
    pub const fn is_executable(self) -> bool {
        self.0 & 0o111 != 0
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03o}", self.0)
    }
}

/// Kind of a destination entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    File,
    Dir,
    Symlink,
    NamedPipe,
    Socket,
    /// Block device
    Device,
    CharDevice,
    /// Anything the platform does not classify
    Other,
}

impl FileKind {
    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            FileKind::File => "file",
            FileKind::Dir => "dir",
            FileKind::Symlink => "symlink",
            FileKind::NamedPipe => "named pipe",
            FileKind::Socket => "socket",
            FileKind::Device => "device",
            FileKind::CharDevice => "char device",
            FileKind::Other => "unknown",
        }
    }

    /// Git object mode prefix for this kind
    pub(crate) fn git_prefix(self) -> u32 {
        match self {
            FileKind::Dir => 0o040000,
            FileKind::Symlink => 0o120000,
            _ => 0o100000,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_octal() {
        assert_eq!(Mode::parse_octal("644"), Some(Mode::new(0o644)));
        assert_eq!(Mode::parse_octal("0755"), Some(Mode::new(0o755)));
        assert_eq!(Mode::parse_octal("0o600"), Some(Mode::new(0o600)));
        assert_eq!(Mode::parse_octal("99"), None);
        assert_eq!(Mode::parse_octal("170000"), None);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(FileKind::Dir.to_string(), "dir");
        assert_eq!(FileKind::NamedPipe.to_string(), "named pipe");
        assert_eq!(FileKind::Socket.to_string(), "socket");
        assert_eq!(FileKind::Device.to_string(), "device");
        assert_eq!(FileKind::CharDevice.to_string(), "char device");
    }

    #[test]
    fn test_umask_and_private() {
        let mode = Mode::FILE.apply_umask(Mode::DEFAULT_UMASK);
        assert_eq!(mode, Mode::new(0o644));
        assert_eq!(mode.private(), Mode::new(0o600));
        assert!(!mode.is_executable());
        assert!(Mode::EXECUTABLE.is_executable());
    }

    #[test]
    fn test_display() {
        assert_eq!(Mode::new(0o44).to_string(), "044");
        assert_eq!(FileKind::Symlink.to_string(), "symlink");
    }
}
