//! Parsed BIF configuration model.
//!
//! The configuration owns every partition descriptor and path for its
//! lifetime; it is produced by the parser and consumed read-only by the
//! size estimator and the image compositor.

use std::path::PathBuf;

use crate::arch::{Arch, WORD_BYTES};
use crate::error::{Error, Result};
use crate::report::PartitionSummary;

/// One partition entry of a BIF `all` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionNode {
    /// Payload file path, taken verbatim from the source
    pub path: PathBuf,
    /// Explicit load (and execution) address, if the node named one
    pub load: Option<u64>,
    /// Explicit byte offset of the payload inside the image
    pub offset: Option<u64>,
    /// Marks the first-stage bootloader
    pub bootloader: bool,
    /// Architecture-specific attributes, opaque key/value pairs at this
    /// level; the selected architecture validates and interprets them
    pub extras: Vec<(String, String)>,
}

impl PartitionNode {
    /// New node with no attributes set
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            load: None,
            offset: None,
            bootloader: false,
            extras: Vec::new(),
        }
    }
}

/// The parsed program: an ordered set of partitions for one architecture.
///
/// Node order is significant — it fixes default placement and the boot
/// sequence — and matches the source text.
#[derive(Debug, Clone)]
pub struct BifConfig {
    /// Architecture selected before parsing
    pub arch: Arch,
    /// Partitions in source order
    pub nodes: Vec<PartitionNode>,
}

impl BifConfig {
    /// Empty configuration for `arch`
    pub fn new(arch: Arch) -> Self {
        Self {
            arch,
            nodes: Vec::new(),
        }
    }

    /// Check every invariant that needs no filesystem access.
    ///
    /// Runs automatically at the end of parsing and again before synthesis,
    /// so hand-assembled configurations get the same treatment as parsed
    /// ones. File readability is checked at placement time instead.
    pub fn validate(&self) -> Result<()> {
        let ops = self.arch.ops();
        let regions = ops.regions();
        if self.nodes.len() > regions.max_partitions {
            return Err(Error::TooManyPartitions {
                count: self.nodes.len(),
                limit: regions.max_partitions,
                arch: self.arch,
            });
        }
        let mut bootloader_seen = false;
        for node in &self.nodes {
            if node.bootloader {
                if bootloader_seen {
                    return Err(Error::DuplicateBootloader {
                        path: node.path.clone(),
                    });
                }
                bootloader_seen = true;
            }
            if let Some(offset) = node.offset {
                if offset % WORD_BYTES != 0 {
                    return Err(Error::UnalignedOffset {
                        path: node.path.clone(),
                        offset,
                    });
                }
                if offset > u32::MAX as u64 {
                    return Err(Error::AddressOutOfRange {
                        path: node.path.clone(),
                        what: "offset",
                        value: offset,
                        arch: self.arch,
                    });
                }
            }
            ops.validate_node(node)?;
        }
        Ok(())
    }

    /// Driver-facing per-partition report, in source order
    pub fn summary(&self) -> Vec<PartitionSummary> {
        self.nodes.iter().map(PartitionSummary::from_node).collect()
    }
}
