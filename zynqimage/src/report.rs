//! Driver-facing partition report.
//!
//! Purely informational: drivers print it after a successful parse; the
//! compositor never consults it.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::bif::config::PartitionNode;

/// What a driver reports per partition after a successful parse
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionSummary {
    /// Payload path as written in the source
    pub path: PathBuf,
    /// Declared load address, if the node named one
    pub load: Option<u64>,
    /// Declared image offset, if the node named one
    pub offset: Option<u64>,
    /// Whether this partition is the first-stage bootloader
    pub bootloader: bool,
}

impl PartitionSummary {
    pub(crate) fn from_node(node: &PartitionNode) -> Self {
        Self {
            path: node.path.clone(),
            load: node.load,
            offset: node.offset,
            bootloader: node.bootloader,
        }
    }
}

impl fmt::Display for PartitionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if self.bootloader {
            write!(f, " (bootloader)")?;
        }
        if let Some(load) = self.load {
            write!(f, "\n  load:   {load:#010x}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, "\n  offset: {offset:#010x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> PartitionSummary {
        PartitionSummary {
            path: PathBuf::from("app.bin"),
            load: Some(0x300_0000),
            offset: Some(0x50_0000),
            bootloader: false,
        }
    }

    #[test]
    fn test_display_lists_declared_fields() {
        let text = summary().to_string();
        assert_eq!(text, "app.bin\n  load:   0x03000000\n  offset: 0x00500000");
    }

    #[test]
    fn test_display_marks_bootloader() {
        let s = PartitionSummary {
            path: PathBuf::from("fsbl.elf"),
            load: None,
            offset: None,
            bootloader: true,
        };
        assert_eq!(s.to_string(), "fsbl.elf (bootloader)");
    }

    #[test]
    fn test_serializes_to_json() {
        let value = serde_json::to_value(summary()).unwrap();
        assert_eq!(value["path"], "app.bin");
        assert_eq!(value["load"], 0x300_0000);
        assert_eq!(value["bootloader"], false);
    }
}
