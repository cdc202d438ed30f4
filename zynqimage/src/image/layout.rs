//! Payload placement planning.
//!
//! The size estimator and the compositor must agree on every resolved
//! offset, so both derive their numbers from one [`plan`] pass. Planning is
//! the only stage before payload copying that touches the filesystem (file
//! sizes); it fails on unreadable or empty payloads, explicit offsets
//! colliding with the header region, and overlapping partitions.

use std::fs;
use std::path::{Path, PathBuf};

use log::trace;

use crate::arch::{BootOps, PartitionRole, WORD_BYTES};
use crate::bif::config::BifConfig;
use crate::error::{Error, Result};

/// One partition with every placement decision resolved
#[derive(Debug, Clone)]
pub struct PlannedPartition {
    /// Position in source order
    pub index: usize,
    pub path: PathBuf,
    pub bootloader: bool,
    /// Architecture attributes carried through from the node
    pub extras: Vec<(String, String)>,
    /// Resolved load address, explicit or the architecture default
    pub load: u64,
    /// Resolved execution address
    pub exec: u64,
    /// Resolved byte offset inside the image
    pub offset: u64,
    /// Payload size in bytes at planning time
    pub size: u64,
    /// Payload length in words, final partial word zero-padded
    pub data_words: usize,
}

impl PlannedPartition {
    /// First byte past the word-padded payload
    pub fn end(&self) -> u64 {
        self.offset + self.data_words as u64 * WORD_BYTES
    }
}

/// Fully resolved image layout
#[derive(Debug, Clone)]
pub struct ImageLayout {
    /// Partitions in source order
    pub parts: Vec<PlannedPartition>,
    /// Words the image spans, the compositor's exact output length
    pub total_words: usize,
}

impl ImageLayout {
    /// The partition flagged as bootloader, if the configuration has one
    pub fn bootloader(&self) -> Option<&PlannedPartition> {
        self.parts.iter().find(|p| p.bootloader)
    }
}

/// Resolve every partition placement for `cfg`.
///
/// Partitions keep source order: an unpinned partition lands on the first
/// alignment-rounded offset after its predecessor, a pinned one exactly
/// where its `offset` attribute says. `cfg.nodes` must be non-empty;
/// [`crate::image::estimate_words`] handles the empty case before calling
/// in.
pub fn plan(cfg: &BifConfig, ops: &dyn BootOps) -> Result<ImageLayout> {
    let regions = ops.regions();
    let header_end = regions.header_end(cfg.nodes.len());
    let mut parts: Vec<PlannedPartition> = Vec::with_capacity(cfg.nodes.len());
    let mut cursor = header_end;

    for (index, node) in cfg.nodes.iter().enumerate() {
        let size = payload_size(&node.path)?;
        let data_words = size.div_ceil(WORD_BYTES) as usize;
        let offset = match node.offset {
            Some(explicit) => {
                if explicit < header_end {
                    return Err(Error::OffsetCollision {
                        path: node.path.clone(),
                        start: explicit,
                        end: explicit + data_words as u64 * WORD_BYTES,
                        other: "the header region".to_string(),
                    });
                }
                explicit
            }
            None => cursor.next_multiple_of(regions.alignment as u64),
        };
        let role = if node.bootloader {
            PartitionRole::Bootloader
        } else {
            PartitionRole::Application
        };
        let load = node.load.unwrap_or_else(|| ops.default_load(role));
        let part = PlannedPartition {
            index,
            path: node.path.clone(),
            bootloader: node.bootloader,
            extras: node.extras.clone(),
            load,
            exec: load,
            offset,
            size,
            data_words,
        };
        trace!(
            "partition {} '{}' at {:#x}..{:#x}",
            index,
            part.path.display(),
            part.offset,
            part.end()
        );
        for other in &parts {
            if part.offset < other.end() && other.offset < part.end() {
                return Err(Error::OffsetCollision {
                    path: part.path.clone(),
                    start: part.offset,
                    end: part.end(),
                    other: format!("'{}'", other.path.display()),
                });
            }
        }
        cursor = part.end();
        parts.push(part);
    }

    let total_end = parts.iter().map(|p| p.end()).max().unwrap_or(header_end);
    let total_words = (total_end / WORD_BYTES) as usize;
    Ok(ImageLayout { parts, total_words })
}

fn payload_size(path: &Path) -> Result<u64> {
    let meta = fs::metadata(path).map_err(|source| Error::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    if meta.len() == 0 {
        return Err(Error::EmptyFile {
            path: path.to_path_buf(),
        });
    }
    Ok(meta.len())
}
