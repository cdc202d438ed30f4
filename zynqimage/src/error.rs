//! Error types for BIF parsing and boot image generation

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::arch::Arch;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the parser, the validator and the image compositor.
///
/// Every fallible operation in the crate returns this enum; no error is
/// downgraded or retried internally.
#[derive(Debug, Error)]
pub enum Error {
    /// BIF source text violates the grammar
    #[error("{origin}:{line}:{column}: {message}")]
    Parse {
        origin: String,
        line: u32,
        column: u32,
        message: String,
    },

    /// More than one partition carries the `bootloader` attribute
    #[error("duplicate bootloader attribute on '{}'", .path.display())]
    DuplicateBootloader { path: PathBuf },

    /// An attribute the selected architecture cannot express
    #[error("attribute '{attribute}' is not supported on {arch}")]
    UnsupportedAttribute { attribute: String, arch: Arch },

    /// An architecture attribute carries a value outside its accepted set
    #[error("invalid value '{value}' for attribute '{attribute}' of '{}'", .path.display())]
    InvalidAttributeValue {
        path: PathBuf,
        attribute: String,
        value: String,
    },

    /// The configuration holds more partitions than the boot ROM can walk
    #[error("too many partitions: {count} (limit is {limit} on {arch})")]
    TooManyPartitions {
        count: usize,
        limit: usize,
        arch: Arch,
    },

    /// An explicit partition offset is not 32-bit-word aligned
    #[error("offset {offset:#x} of '{}' is not word aligned", .path.display())]
    UnalignedOffset { path: PathBuf, offset: u64 },

    /// An address or offset does not fit the architecture's address space
    #[error("{what} {value:#x} of '{}' is out of range for {arch}", .path.display())]
    AddressOutOfRange {
        path: PathBuf,
        what: &'static str,
        value: u64,
        arch: Arch,
    },

    /// A partition overlaps the header region or another partition
    #[error("partition '{}' at {start:#x}..{end:#x} overlaps {other}", .path.display())]
    OffsetCollision {
        path: PathBuf,
        start: u64,
        end: u64,
        other: String,
    },

    /// A partition payload cannot be read
    #[error("cannot read partition file '{}'", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A partition payload is empty
    #[error("partition file '{}' is empty", .path.display())]
    EmptyFile { path: PathBuf },

    /// A payload changed size between placement planning and copying
    #[error(
        "partition file '{}' changed during image generation (expected {expected} bytes, found {found})",
        .path.display()
    )]
    FileChanged {
        path: PathBuf,
        expected: u64,
        found: u64,
    },

    /// The configuration has no partitions to compose
    #[error("no partitions to build")]
    NoPartitions,

    /// The caller-provided buffer cannot hold the planned image
    #[error("output buffer too small: need {needed} words, have {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// Output or payload I/O failure outside the cases above
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Build a parse error with a source location
    pub(crate) fn parse(origin: &str, line: u32, column: u32, message: impl Into<String>) -> Self {
        Self::Parse {
            origin: origin.to_string(),
            line,
            column,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_location() {
        let err = Error::parse("boot.bif", 3, 14, "expected '}'");
        assert_eq!(err.to_string(), "boot.bif:3:14: expected '}'");
    }

    #[test]
    fn test_collision_message_is_hex() {
        let err = Error::OffsetCollision {
            path: PathBuf::from("app.bin"),
            start: 0x1000,
            end: 0x1400,
            other: "'fsbl.elf'".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("0x1000"));
        assert!(text.contains("0x1400"));
        assert!(text.contains("fsbl.elf"));
    }
}
