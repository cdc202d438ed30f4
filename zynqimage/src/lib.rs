//! # zynqimage
//!
//! Boot image generation for Xilinx Zynq and ZynqMP platforms.
//!
//! The crate compiles a BIF (Boot Image Format) description of boot
//! partitions into the flat binary layout the hardware boot ROM expects:
//! boot header, image header table, partition header table and the payloads
//! themselves, checksummed and aligned per architecture.
//!
//! ## Example
//!
//! ```rust
//! use zynqimage::{Arch, bif};
//!
//! let source = r#"
//!     all: {
//!         fsbl.elf (bootloader)
//!         app.bin (load=0x100000, offset=0x2000)
//!     }
//! "#;
//! let cfg = bif::parse(source, "demo.bif", Arch::Zynq)?;
//! assert_eq!(cfg.nodes.len(), 2);
//! for part in cfg.summary() {
//!     println!("{part}");
//! }
//! # Ok::<(), zynqimage::Error>(())
//! ```
//!
//! Image generation is a two-number contract: allocate at least
//! [`estimate_words`] words, let [`compose`] fill the buffer, truncate the
//! output to the word count it returns. [`build`] and [`write_image`] wrap
//! the common allocate/compose/serialize path; parsing alone never touches
//! the filesystem.

pub mod arch;
pub mod bif;
pub mod error;
pub mod image;
pub mod report;

pub use arch::{Arch, BootOps};
pub use bif::{BifConfig, PartitionNode};
pub use error::{Error, Result};
pub use image::{build, compose, estimate_words, write_image};
pub use report::PartitionSummary;

/// Current version of the zynqimage implementation
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
