//! In-memory script sources.
//!
//! Script text sits in the dump as plain ASCII starting at a `scn` /
//! `ScriptName` declaration and running to a null terminator. Comment lines
//! (`;`) directly above the declaration belong to the script, so the parser
//! reports how many preceding bytes the extractor should pull back in.

use memchr::memchr;

use crate::formats::{Category, Format, ParseContext, ParseResult, Signature, keys};

const SIGNATURES: [Signature; 5] = [
    Signature {
        id: "script_scn",
        magic: b"scn ",
        description: "Script (scn)",
    },
    Signature {
        id: "script_scn_mixed",
        magic: b"Scn ",
        description: "Script (Scn)",
    },
    Signature {
        id: "script_scn_upper",
        magic: b"SCN ",
        description: "Script (SCN)",
    },
    Signature {
        id: "script_scriptname",
        magic: b"ScriptName ",
        description: "Script (ScriptName)",
    },
    Signature {
        id: "script_scriptname_lower",
        magic: b"scriptname ",
        description: "Script (scriptname)",
    },
];

/// How far past the declaration the null-terminator hunt reaches.
const TERMINATOR_SCAN_LIMIT: usize = 64 * 1024;
const FALLBACK_SIZE: u32 = 8 * 1024;
const MAX_LEADING_COMMENT: usize = 512;
const MAX_NAME_LEN: usize = 64;

pub struct ScriptFormat;

fn script_name(h: &[u8], magic_len: usize) -> Option<&str> {
    let rest = h.get(magic_len..)?;
    let end = rest
        .iter()
        .take(MAX_NAME_LEN)
        .position(|&b| !(b.is_ascii_alphanumeric() || b == b'_'))
        .unwrap_or(rest.len().min(MAX_NAME_LEN));
    if end == 0 {
        return None;
    }
    std::str::from_utf8(&rest[..end]).ok()
}

/// Bytes of contiguous `;`-comment lines immediately preceding the
/// declaration, capped at 512. A qualifying line ends with `\n` and starts
/// after the previous newline or null.
fn leading_comment_bytes(pre: &[u8]) -> usize {
    let mut start = pre.len();
    while start > 0 && pre[start - 1] == b'\n' {
        let body_end = start - 1;
        let mut line_start = body_end;
        while line_start > 0 {
            let b = pre[line_start - 1];
            if b == b'\n' || b == 0 {
                break;
            }
            line_start -= 1;
        }

        let mut line = &pre[line_start..body_end];
        while let Some((&first, rest)) = line.split_first() {
            if first == b' ' || first == b'\t' {
                line = rest;
            } else {
                break;
            }
        }
        if line.first() != Some(&b';') {
            break;
        }
        if pre.len() - line_start > MAX_LEADING_COMMENT {
            break;
        }
        start = line_start;
    }
    pre.len() - start
}

impl Format for ScriptFormat {
    fn format_id(&self) -> &'static str {
        "script"
    }

    fn display_name(&self) -> &'static str {
        "Script Source"
    }

    fn extension(&self) -> &'static str {
        ".txt"
    }

    fn category(&self) -> Category {
        Category::Script
    }

    fn output_folder(&self) -> &'static str {
        "scripts"
    }

    fn min_size(&self) -> u32 {
        8
    }

    fn max_size(&self) -> u32 {
        256 * 1024
    }

    fn signatures(&self) -> &'static [Signature] {
        &SIGNATURES
    }

    fn parse(&self, window: &[u8], at: usize, ctx: &ParseContext<'_>) -> Option<ParseResult> {
        let h = window.get(at..)?;
        let magic_len = SIGNATURES
            .iter()
            .find(|s| s.id == ctx.signature_id)
            .map(|s| s.magic.len())
            .unwrap_or(4);
        let name = script_name(h, magic_len)?;

        // Script text is null-terminated in process memory.
        let start = ctx.header_offset as usize;
        let probe_end = ctx.dump.len().min(start + TERMINATOR_SCAN_LIMIT);
        let estimated = match memchr(0, ctx.dump.get(start..probe_end)?) {
            Some(pos) => pos as u32,
            None => ctx.boundary.find_boundary(
                ctx.dump,
                start,
                self.min_size(),
                self.max_size(),
                FALLBACK_SIZE,
                None,
                true,
            ),
        };

        let leading = leading_comment_bytes(&window[..at]).min(MAX_LEADING_COMMENT);

        let mut result = ParseResult::new("Script", estimated);
        result.set(keys::SAFE_NAME, name);
        result.set("scriptName", name);
        if leading > 0 {
            result.set(keys::LEADING_COMMENT_SIZE, leading as u64);
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::testutil::{bare_boundary, ctx_at};

    fn parse_at(dump: &[u8], at: usize, sig: &'static str) -> Option<ParseResult> {
        let boundary = bare_boundary();
        let ctx = ctx_at(dump, at as u64, &boundary, sig);
        ScriptFormat.parse(dump, at, &ctx)
    }

    #[test]
    fn extracts_name_and_null_terminated_size() {
        let text = b"scn MyQuestScript\nshort doOnce\nend\n";
        let mut dump = text.to_vec();
        dump.push(0);
        dump.resize(1024, 0xCC);
        let r = parse_at(&dump, 0, "script_scn").expect("parse");
        assert_eq!(r.metadata[keys::SAFE_NAME], "MyQuestScript");
        assert_eq!(r.estimated_size as usize, text.len());
    }

    #[test]
    fn captures_leading_comment_block() {
        let pre = b"garbage\x00; setup for the gate puzzle\n; do not rename\n";
        let mut dump = pre.to_vec();
        let at = dump.len();
        dump.extend_from_slice(b"scn GatePuzzleScript\n\0");
        dump.resize(512, 0);

        let r = parse_at(&dump, at, "script_scn").expect("parse");
        let comments = b"; setup for the gate puzzle\n; do not rename\n".len() as u64;
        assert_eq!(r.leading_comment_size(), comments);
    }

    #[test]
    fn no_comments_reports_zero() {
        let mut dump = b"\x00\x00scn Simple\n\0".to_vec();
        dump.resize(128, 0);
        let r = parse_at(&dump, 2, "script_scn").expect("parse");
        assert_eq!(r.leading_comment_size(), 0);
    }

    #[test]
    fn scriptname_variant_uses_longer_magic() {
        let mut dump = b"ScriptName TrapController\n\0".to_vec();
        dump.resize(128, 0);
        let r = parse_at(&dump, 0, "script_scriptname").expect("parse");
        assert_eq!(r.metadata[keys::SAFE_NAME], "TrapController");
    }

    #[test]
    fn rejects_nameless_declaration() {
        let mut dump = b"scn \n\0".to_vec();
        dump.resize(128, 0);
        assert!(parse_at(&dump, 0, "script_scn").is_none());
    }
}
