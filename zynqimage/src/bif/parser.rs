//! Recursive-descent parser for the BIF grammar.
//!
//! ```text
//! file   := "all" [":"] "{" node+ "}"
//! node   := path [ "(" attr ("," attr)* ")" ]
//! attr   := "bootloader"
//!         | ("load" | "offset") "=" number
//!         | key "=" value                 ; architecture attribute
//! number := "0x" hex-digits | decimal-digits
//! ```
//!
//! Parsing is deterministic and total: every token is consumed into the
//! configuration or produces an error with the origin label and a 1-based
//! line/column. Duplicate or conflicting attributes on one node are errors,
//! never last-write-wins, and the parser itself never touches the
//! filesystem.

use log::debug;

use super::config::{BifConfig, PartitionNode};
use super::lexer::{Lexer, Pos, Spanned, Token};
use crate::arch::Arch;
use crate::error::{Error, Result};

/// Attribute keys stored as architecture-specific extras; the selected
/// architecture decides whether it can express them
const EXTRA_KEYS: [&str; 4] = [
    "destination_cpu",
    "exception_level",
    "execution_state",
    "partition_owner",
];

/// Parse BIF source text into a validated configuration.
///
/// `origin` labels the source in diagnostics — typically a file name, or
/// `<wrap>` for auto-wrapped binaries. On success every model invariant and
/// every architecture-attribute combination has already been checked.
pub fn parse(source: &str, origin: &str, arch: Arch) -> Result<BifConfig> {
    let tokens = Lexer::new(source, origin).tokenize()?;
    let mut parser = Parser {
        origin,
        tokens,
        cursor: 0,
    };
    let cfg = parser.parse_file(arch)?;
    cfg.validate()?;
    debug!("parsed {} partition nodes from {}", cfg.nodes.len(), origin);
    Ok(cfg)
}

struct Parser<'a> {
    origin: &'a str,
    tokens: Vec<Spanned>,
    cursor: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.cursor)
    }

    fn bump(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn last_pos(&self) -> Pos {
        self.tokens
            .last()
            .map(|s| s.pos)
            .unwrap_or(Pos { line: 1, column: 1 })
    }

    fn error_at(&self, pos: Pos, message: impl Into<String>) -> Error {
        Error::parse(self.origin, pos.line, pos.column, message)
    }

    fn parse_file(&mut self, arch: Arch) -> Result<BifConfig> {
        let Some(head) = self.bump() else {
            return Err(self.error_at(Pos { line: 1, column: 1 }, "empty input, expected an 'all' block"));
        };
        match &head.token {
            Token::Word(name) if name == "all" => {}
            Token::Word(name) => {
                return Err(self.error_at(
                    head.pos,
                    format!("unknown top-level block '{name}', expected 'all'"),
                ));
            }
            _ => return Err(self.error_at(head.pos, "expected an 'all' block")),
        }
        if matches!(self.peek().map(|s| &s.token), Some(Token::Colon)) {
            self.cursor += 1;
        }
        match self.bump() {
            Some(Spanned {
                token: Token::LBrace,
                ..
            }) => {}
            Some(other) => {
                return Err(self.error_at(other.pos, "expected '{' to open the 'all' block"));
            }
            None => {
                return Err(
                    self.error_at(self.last_pos(), "expected '{' to open the 'all' block")
                );
            }
        }

        let mut cfg = BifConfig::new(arch);
        loop {
            let Some(next) = self.peek().cloned() else {
                return Err(self.error_at(self.last_pos(), "unterminated 'all' block, expected '}'"));
            };
            match next.token {
                Token::RBrace => {
                    self.cursor += 1;
                    if cfg.nodes.is_empty() {
                        return Err(self.error_at(
                            next.pos,
                            "empty 'all' block, at least one partition is required",
                        ));
                    }
                    break;
                }
                Token::Word(path) => {
                    self.cursor += 1;
                    cfg.nodes.push(self.parse_node(path)?);
                }
                _ => {
                    return Err(
                        self.error_at(next.pos, "expected a partition file path or '}'")
                    );
                }
            }
        }

        if let Some(extra) = self.peek() {
            return Err(self.error_at(extra.pos, "trailing input after the 'all' block"));
        }
        Ok(cfg)
    }

    fn parse_node(&mut self, path: String) -> Result<PartitionNode> {
        let mut node = PartitionNode::new(path);
        if !matches!(self.peek().map(|s| &s.token), Some(Token::LParen)) {
            return Ok(node);
        }
        self.cursor += 1;
        loop {
            self.parse_attribute(&mut node)?;
            match self.bump() {
                Some(Spanned {
                    token: Token::Comma,
                    ..
                }) => {}
                Some(Spanned {
                    token: Token::RParen,
                    ..
                }) => break,
                Some(other) => {
                    return Err(
                        self.error_at(other.pos, "expected ',' or ')' in the attribute list")
                    );
                }
                None => {
                    return Err(self.error_at(self.last_pos(), "unterminated attribute list"));
                }
            }
        }
        Ok(node)
    }

    fn parse_attribute(&mut self, node: &mut PartitionNode) -> Result<()> {
        let Some(key_token) = self.bump() else {
            return Err(self.error_at(self.last_pos(), "expected an attribute name"));
        };
        let Token::Word(key) = key_token.token else {
            return Err(self.error_at(key_token.pos, "expected an attribute name"));
        };
        let pos = key_token.pos;

        if key == "bootloader" {
            if node.bootloader {
                return Err(self.error_at(pos, "duplicate 'bootloader' attribute"));
            }
            node.bootloader = true;
            return Ok(());
        }

        match self.bump() {
            Some(Spanned {
                token: Token::Equals,
                ..
            }) => {}
            _ => {
                return Err(self.error_at(pos, format!("attribute '{key}' requires '=<value>'")));
            }
        }
        let Some(value_token) = self.bump() else {
            return Err(self.error_at(self.last_pos(), format!("missing value for '{key}'")));
        };
        let Token::Word(value) = value_token.token else {
            return Err(self.error_at(value_token.pos, format!("missing value for '{key}'")));
        };

        match key.as_str() {
            "load" => {
                if node.load.is_some() {
                    return Err(self.error_at(pos, "duplicate 'load' attribute"));
                }
                node.load = Some(self.parse_number(&value, value_token.pos)?);
            }
            "offset" => {
                if node.offset.is_some() {
                    return Err(self.error_at(pos, "duplicate 'offset' attribute"));
                }
                node.offset = Some(self.parse_number(&value, value_token.pos)?);
            }
            _ if EXTRA_KEYS.contains(&key.as_str()) => {
                if node.extras.iter().any(|(k, _)| *k == key) {
                    return Err(self.error_at(pos, format!("duplicate '{key}' attribute")));
                }
                node.extras.push((key.clone(), value));
            }
            _ => {
                return Err(self.error_at(pos, format!("unknown attribute '{key}'")));
            }
        }
        Ok(())
    }

    fn parse_number(&self, text: &str, pos: Pos) -> Result<u64> {
        let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => text.parse::<u64>(),
        };
        parsed.map_err(|_| self.error_at(pos, format!("invalid address '{text}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse_zynq(source: &str) -> Result<BifConfig> {
        parse(source, "<test>", Arch::Zynq)
    }

    #[test]
    fn test_parses_nodes_in_source_order() {
        let cfg = parse_zynq(
            "all: {\n  fsbl.elf (bootloader)\n  u-boot.elf\n  app.bin (load=0x3000000, offset=0x500000)\n}",
        )
        .unwrap();
        assert_eq!(cfg.nodes.len(), 3);
        assert_eq!(cfg.nodes[0].path, PathBuf::from("fsbl.elf"));
        assert!(cfg.nodes[0].bootloader);
        assert_eq!(cfg.nodes[1].path, PathBuf::from("u-boot.elf"));
        assert!(!cfg.nodes[1].bootloader);
        assert_eq!(cfg.nodes[2].load, Some(0x300_0000));
        assert_eq!(cfg.nodes[2].offset, Some(0x50_0000));
    }

    #[test]
    fn test_block_name_colon_is_optional() {
        assert!(parse_zynq("all { app.bin }").is_ok());
        assert!(parse_zynq("all: { app.bin }").is_ok());
    }

    #[test]
    fn test_decimal_and_hex_addresses() {
        let cfg = parse_zynq("all { a.bin (load=4096) b.bin (load=0X1000) }").unwrap();
        assert_eq!(cfg.nodes[0].load, Some(4096));
        assert_eq!(cfg.nodes[1].load, Some(4096));
    }

    #[test]
    fn test_unknown_block_is_rejected() {
        let err = parse_zynq("image: { app.bin }").unwrap_err();
        assert!(err.to_string().contains("unknown top-level block 'image'"));
    }

    #[test]
    fn test_empty_block_is_rejected() {
        let err = parse_zynq("all: { }").unwrap_err();
        assert!(err.to_string().contains("empty 'all' block"));
    }

    #[test]
    fn test_trailing_input_is_rejected() {
        let err = parse_zynq("all { a.bin } all { b.bin }").unwrap_err();
        assert!(err.to_string().contains("trailing input"));
    }

    #[test]
    fn test_duplicate_attribute_is_rejected() {
        let err = parse_zynq("all { a.bin (load=1, load=2) }").unwrap_err();
        assert!(err.to_string().contains("duplicate 'load'"));
        let err = parse_zynq("all { a.bin (bootloader, bootloader) }").unwrap_err();
        assert!(err.to_string().contains("duplicate 'bootloader'"));
    }

    #[test]
    fn test_unknown_attribute_is_rejected() {
        let err = parse_zynq("all { a.bin (checksum=md5) }").unwrap_err();
        assert!(err.to_string().contains("unknown attribute 'checksum'"));
    }

    #[test]
    fn test_second_bootloader_node_is_rejected() {
        let err =
            parse_zynq("all { a.elf (bootloader) b.elf (bootloader) }").unwrap_err();
        assert!(matches!(err, Error::DuplicateBootloader { .. }));
    }

    #[test]
    fn test_number_overflow_is_rejected() {
        let err = parse_zynq("all { a.bin (load=0x1FFFFFFFFFFFFFFFF) }").unwrap_err();
        assert!(err.to_string().contains("invalid address"));
    }

    #[test]
    fn test_error_location_points_at_offender() {
        let err = parse_zynq("all {\n  a.bin (speed=9)\n}").unwrap_err();
        assert_eq!(err.to_string(), "<test>:2:10: unknown attribute 'speed'");
    }

    #[test]
    fn test_zynqmp_attributes_reach_extras() {
        let cfg = parse(
            "all { app.elf (destination_cpu=r5-0, exception_level=el-3) }",
            "<test>",
            Arch::ZynqMp,
        )
        .unwrap();
        assert_eq!(
            cfg.nodes[0].extras,
            vec![
                ("destination_cpu".to_string(), "r5-0".to_string()),
                ("exception_level".to_string(), "el-3".to_string()),
            ]
        );
    }

    #[test]
    fn test_zynq_rejects_zynqmp_attributes() {
        let err = parse_zynq("all { app.elf (destination_cpu=r5-0) }").unwrap_err();
        assert!(matches!(err, Error::UnsupportedAttribute { .. }));
    }
}
