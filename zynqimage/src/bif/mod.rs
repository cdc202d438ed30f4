//! BIF front end: grammar, configuration model and parse entry points

pub mod config;
pub mod lexer;
pub mod parser;

pub use config::{BifConfig, PartitionNode};
pub use parser::parse;

use std::path::Path;

use crate::arch::Arch;
use crate::error::Result;

/// Wrap a bare binary in a minimal single-node configuration.
///
/// Synthesizes `all: { <path> }` in memory and runs it through the ordinary
/// grammar, so a raw bitstream needs no hand-written BIF file. The path is
/// taken verbatim; one containing whitespace or BIF structural characters
/// cannot be expressed this way.
pub fn wrap_single(path: &Path, arch: Arch) -> Result<BifConfig> {
    let source = format!("all: {{ {} }}\n", path.display());
    parse(&source, "<wrap>", arch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_wrap_single_produces_one_plain_node() {
        let cfg = wrap_single(Path::new("design.bit"), Arch::Zynq).unwrap();
        assert_eq!(cfg.nodes.len(), 1);
        assert_eq!(cfg.nodes[0].path, PathBuf::from("design.bit"));
        assert!(!cfg.nodes[0].bootloader);
        assert_eq!(cfg.nodes[0].load, None);
        assert_eq!(cfg.nodes[0].offset, None);
    }

    #[test]
    fn test_wrap_single_keeps_directories() {
        let cfg = wrap_single(Path::new("build/out/design.bit"), Arch::ZynqMp).unwrap();
        assert_eq!(cfg.nodes[0].path, PathBuf::from("build/out/design.bit"));
    }
}
