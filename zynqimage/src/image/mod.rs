//! Size estimation and image composition.
//!
//! The control flow here is architecture-agnostic; everything the two boot
//! ROMs disagree on comes through [`BootOps`](crate::arch::BootOps). The
//! caller-facing contract is a capacity/used pair: allocate at least
//! [`estimate_words`] words, let [`compose`] fill the buffer, truncate the
//! emitted output to the length it returns.

pub mod layout;

use std::fs;
use std::io::Cursor;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::arch::{self, PARTITION_ENTRY_WORDS, WORD_BYTES};
use crate::bif::config::BifConfig;
use crate::error::{Error, Result};
use layout::{PlannedPartition, plan};

/// Minimal number of words the final image spans.
///
/// Zero means "nothing to build": the configuration has no partitions.
/// Unreadable and empty payload files are reported here rather than while
/// the output buffer is being filled.
pub fn estimate_words(cfg: &BifConfig) -> Result<usize> {
    if cfg.nodes.is_empty() {
        return Ok(0);
    }
    cfg.validate()?;
    let layout = plan(cfg, cfg.arch.ops())?;
    Ok(layout.total_words)
}

/// Compose the boot image into `words` and return the words actually used.
///
/// `words` must hold at least [`estimate_words`] words. Words past the
/// returned length are not part of the image and must not be emitted.
pub fn compose(words: &mut [u32], cfg: &BifConfig) -> Result<usize> {
    if cfg.nodes.is_empty() {
        return Err(Error::NoPartitions);
    }
    cfg.validate()?;
    let ops = cfg.arch.ops();
    let layout = plan(cfg, ops)?;
    if words.len() < layout.total_words {
        return Err(Error::BufferTooSmall {
            needed: layout.total_words,
            capacity: words.len(),
        });
    }
    let words = &mut words[..layout.total_words];
    words.fill(0);

    ops.write_boot_header(words, &layout);
    arch::write_image_headers(words, &layout);
    for part in &layout.parts {
        let base = arch::partition_entry_word(part.index);
        ops.write_partition_entry(
            &mut words[base..base + PARTITION_ENTRY_WORDS],
            part.index,
            &layout,
        );
    }

    for part in &layout.parts {
        copy_payload(words, part)?;
    }

    // checksums last, over the final field values; the sentinel entry is
    // covered too (all-zero fields, checksum 0xFFFFFFFF)
    let span = ops.header_checksum_span();
    words[span.slot] = ops.checksum(&words[span.first..=span.last]);
    for index in 0..=layout.parts.len() {
        let base = arch::partition_entry_word(index);
        words[base + PARTITION_ENTRY_WORDS - 1] =
            ops.checksum(&words[base..base + PARTITION_ENTRY_WORDS - 1]);
    }

    debug!(
        "composed {} image: {} partitions, {} words",
        cfg.arch,
        layout.parts.len(),
        layout.total_words
    );
    Ok(layout.total_words)
}

/// Allocate, compose and truncate in one step
pub fn build(cfg: &BifConfig) -> Result<Vec<u32>> {
    let estimate = estimate_words(cfg)?;
    if estimate == 0 {
        return Err(Error::NoPartitions);
    }
    let mut words = vec![0u32; estimate];
    let used = compose(&mut words, cfg)?;
    words.truncate(used);
    Ok(words)
}

/// Serialize `words` little-endian and write the output file.
///
/// Only called after composition succeeded, so a failed run never leaves a
/// partially written image behind.
pub fn write_image<P: AsRef<Path>>(path: P, words: &[u32]) -> Result<()> {
    let mut bytes = Vec::with_capacity(words.len() * WORD_BYTES as usize);
    for &word in words {
        bytes.write_u32::<LittleEndian>(word)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

/// Copy one payload verbatim to its resolved offset, zero-padding the
/// final partial word. A size differing from the plan means the file
/// changed underneath the run.
fn copy_payload(words: &mut [u32], part: &PlannedPartition) -> Result<()> {
    let data = fs::read(&part.path).map_err(|source| Error::Unreadable {
        path: part.path.clone(),
        source,
    })?;
    if data.len() as u64 != part.size {
        return Err(Error::FileChanged {
            path: part.path.clone(),
            expected: part.size,
            found: data.len() as u64,
        });
    }
    let base = (part.offset / WORD_BYTES) as usize;
    let full_words = data.len() / WORD_BYTES as usize;
    let mut reader = Cursor::new(data.as_slice());
    for i in 0..full_words {
        words[base + i] = reader.read_u32::<LittleEndian>()?;
    }
    let tail = &data[full_words * WORD_BYTES as usize..];
    if !tail.is_empty() {
        let mut last = [0u8; 4];
        last[..tail.len()].copy_from_slice(tail);
        words[base + full_words] = u32::from_le_bytes(last);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::Arch;
    use crate::bif::config::PartitionNode;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_estimate_is_zero_only_for_empty() {
        let cfg = BifConfig::new(Arch::Zynq);
        assert_eq!(estimate_words(&cfg).unwrap(), 0);
    }

    #[test]
    fn test_compose_rejects_empty() {
        let cfg = BifConfig::new(Arch::Zynq);
        let mut words = vec![0u32; 16];
        let err = compose(&mut words, &cfg).unwrap_err();
        assert!(matches!(err, Error::NoPartitions));
    }

    #[test]
    fn test_compose_rejects_short_buffer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&[1, 2, 3, 4]).unwrap();
        drop(file);

        let mut cfg = BifConfig::new(Arch::Zynq);
        cfg.nodes.push(PartitionNode::new(path));
        let needed = estimate_words(&cfg).unwrap();
        let mut words = vec![0u32; needed - 1];
        let err = compose(&mut words, &cfg).unwrap_err();
        assert!(matches!(
            err,
            Error::BufferTooSmall { capacity, .. } if capacity == needed - 1
        ));
    }

    #[test]
    fn test_build_truncates_to_used_words() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        fs::write(&path, [0xAAu8; 10]).unwrap();

        let mut cfg = BifConfig::new(Arch::Zynq);
        cfg.nodes.push(PartitionNode::new(path));
        let words = build(&cfg).unwrap();
        assert_eq!(words.len(), estimate_words(&cfg).unwrap());
    }

    #[test]
    fn test_write_image_is_little_endian() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");
        write_image(&path, &[0xAA99_5566, 0x0000_0001]).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes, vec![0x66, 0x55, 0x99, 0xAA, 0x01, 0x00, 0x00, 0x00]);
    }
}
