//! Zynq-7000 boot ROM encoding.
//!
//! Header geometry follows the Zynq boot ROM specification: an interrupt
//! vector table, the identification words at `0x20`, bootloader source
//! fields, a 256-pair register initialization table at `0xA0`, and
//! `0xFFFFFFFF` padding up to the image header table.

use super::{
    Arch, BootOps, ChecksumSpan, IMAGE_HEADER_TABLE_OFFSET, IMAGE_ID,
    PARTITION_HEADER_TABLE_OFFSET, PartitionRole, Regions, WIDTH_DETECT, WORD_BYTES,
    image_header_word,
};
use crate::bif::config::PartitionNode;
use crate::error::{Error, Result};
use crate::image::layout::ImageLayout;

/// Vector table fill, an AArch32 branch-to-self
const VECTOR_FILL: u32 = 0xEAFF_FFFE;

/// Boot header version
const HEADER_VERSION: u32 = 0x0101_0000;

/// QSPI configuration word, fixed to 1 by the ROM spec
const QSPI_CONFIG: u32 = 0x0000_0001;

/// Word offset of the register initialization table (byte 0xA0)
const REG_INIT_WORD: usize = 0xA0 / WORD_BYTES as usize;

/// Address/value pairs in the register initialization table
const REG_INIT_PAIRS: usize = 256;

/// Address marker of an unused register-init pair
const REG_INIT_UNUSED: u32 = 0xFFFF_FFFF;

static REGIONS: Regions = Regions {
    alignment: 0x40,
    max_partitions: 14,
};

/// Operations table for the Zynq-7000 boot ROM
pub struct ZynqOps;

impl BootOps for ZynqOps {
    fn arch(&self) -> Arch {
        Arch::Zynq
    }

    fn regions(&self) -> &'static Regions {
        &REGIONS
    }

    fn default_load(&self, role: PartitionRole) -> u64 {
        match role {
            // the FSBL executes from OCM, mapped at zero at boot
            PartitionRole::Bootloader => 0x0000_0000,
            PartitionRole::Application => 0x0000_0000,
        }
    }

    fn validate_node(&self, node: &PartitionNode) -> Result<()> {
        if let Some((key, _)) = node.extras.first() {
            return Err(Error::UnsupportedAttribute {
                attribute: key.clone(),
                arch: Arch::Zynq,
            });
        }
        if let Some(load) = node.load {
            if load > u32::MAX as u64 {
                return Err(Error::AddressOutOfRange {
                    path: node.path.clone(),
                    what: "load address",
                    value: load,
                    arch: Arch::Zynq,
                });
            }
        }
        Ok(())
    }

    fn write_boot_header(&self, words: &mut [u32], layout: &ImageLayout) {
        for word in &mut words[..8] {
            *word = VECTOR_FILL;
        }
        words[8] = WIDTH_DETECT;
        words[9] = IMAGE_ID;
        words[10] = 0; // encryption status: not encrypted
        words[11] = HEADER_VERSION;
        if let Some(bl) = layout.bootloader() {
            words[12] = bl.offset as u32; // source offset
            words[13] = bl.size as u32;
            words[14] = bl.load as u32;
            words[15] = bl.exec as u32;
            words[16] = bl.size as u32; // total length, no authentication data
        }
        words[17] = QSPI_CONFIG;
        // words[18] is the checksum slot, written once all covered fields
        // are final
        words[38] = IMAGE_HEADER_TABLE_OFFSET;
        words[39] = PARTITION_HEADER_TABLE_OFFSET;
        for pair in 0..REG_INIT_PAIRS {
            words[REG_INIT_WORD + 2 * pair] = REG_INIT_UNUSED;
            words[REG_INIT_WORD + 2 * pair + 1] = 0;
        }
        let table = (IMAGE_HEADER_TABLE_OFFSET / WORD_BYTES as u32) as usize;
        for word in &mut words[REG_INIT_WORD + 2 * REG_INIT_PAIRS..table] {
            *word = 0xFFFF_FFFF;
        }
    }

    fn write_partition_entry(&self, entry: &mut [u32], part_index: usize, layout: &ImageLayout) {
        let part = &layout.parts[part_index];
        entry[0] = part.data_words as u32; // encrypted length
        entry[1] = part.data_words as u32; // unencrypted length
        entry[2] = part.data_words as u32; // total length
        entry[3] = part.load as u32;
        entry[4] = part.exec as u32;
        entry[5] = (part.offset / WORD_BYTES) as u32;
        entry[6] = 0; // attributes
        entry[7] = 1; // section count
        entry[8] = 0; // checksum table offset
        entry[9] = image_header_word(part_index) as u32;
        entry[10] = 0; // authentication certificate offset
        // entry[11..15] reserved; entry[15] is the checksum slot
    }

    fn header_checksum_span(&self) -> ChecksumSpan {
        // covers 0x20..=0x44, checksum lands at 0x48
        ChecksumSpan {
            first: 8,
            last: 17,
            slot: 18,
        }
    }

    fn checksum(&self, words: &[u32]) -> u32 {
        !words.iter().fold(0u32, |sum, &word| sum.wrapping_add(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::layout::PlannedPartition;
    use std::path::PathBuf;

    fn layout_with_bootloader() -> ImageLayout {
        ImageLayout {
            parts: vec![PlannedPartition {
                index: 0,
                path: PathBuf::from("fsbl.elf"),
                bootloader: true,
                extras: Vec::new(),
                load: 0,
                exec: 0,
                offset: 0xD00,
                size: 0x200,
                data_words: 0x80,
            }],
            total_words: 0xD00 / 4 + 0x80,
        }
    }

    #[test]
    fn test_checksum_inverts_sum() {
        assert_eq!(ZynqOps.checksum(&[1, 2, 3]), !6u32);
        assert_eq!(ZynqOps.checksum(&[0; 15]), 0xFFFF_FFFF);
    }

    #[test]
    fn test_boot_header_identification() {
        let layout = layout_with_bootloader();
        let mut words = vec![0u32; layout.total_words];
        ZynqOps.write_boot_header(&mut words, &layout);
        assert_eq!(words[0], 0xEAFF_FFFE);
        assert_eq!(words[7], 0xEAFF_FFFE);
        assert_eq!(words[8], WIDTH_DETECT);
        assert_eq!(words[9], IMAGE_ID);
        assert_eq!(words[11], HEADER_VERSION);
        assert_eq!(words[12], 0xD00);
        assert_eq!(words[13], 0x200);
        assert_eq!(words[17], QSPI_CONFIG);
        assert_eq!(words[38], 0x8C0);
        assert_eq!(words[39], 0xC80);
    }

    #[test]
    fn test_register_init_table_is_unused_pairs() {
        let layout = layout_with_bootloader();
        let mut words = vec![0u32; layout.total_words];
        ZynqOps.write_boot_header(&mut words, &layout);
        assert_eq!(words[REG_INIT_WORD], REG_INIT_UNUSED);
        assert_eq!(words[REG_INIT_WORD + 1], 0);
        assert_eq!(words[REG_INIT_WORD + 510], REG_INIT_UNUSED);
        assert_eq!(words[REG_INIT_WORD + 511], 0);
        // padding between the table and the image header table
        assert_eq!(words[0x8A0 / 4], 0xFFFF_FFFF);
        assert_eq!(words[0x8C0 / 4 - 1], 0xFFFF_FFFF);
    }

    #[test]
    fn test_rejects_zynqmp_attributes() {
        let mut node = PartitionNode::new("app.elf");
        node.extras
            .push(("destination_cpu".to_string(), "r5-0".to_string()));
        let err = ZynqOps.validate_node(&node).unwrap_err();
        assert!(matches!(err, Error::UnsupportedAttribute { .. }));
    }

    #[test]
    fn test_rejects_wide_load_address() {
        let mut node = PartitionNode::new("app.elf");
        node.load = Some(0x1_0000_0000);
        let err = ZynqOps.validate_node(&node).unwrap_err();
        assert!(matches!(err, Error::AddressOutOfRange { .. }));
    }

    #[test]
    fn test_partition_entry_fields() {
        let layout = layout_with_bootloader();
        let mut entry = [0u32; 16];
        ZynqOps.write_partition_entry(&mut entry, 0, &layout);
        assert_eq!(entry[0], 0x80);
        assert_eq!(entry[2], 0x80);
        assert_eq!(entry[5], 0xD00 / 4);
        assert_eq!(entry[7], 1);
        assert_eq!(entry[9], 0x900 / 4);
        assert_eq!(entry[15], 0); // checksum written by the compositor
    }
}
