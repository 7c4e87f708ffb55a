//! NIF / Gamebryo scene graphs and KF animation sequences.
//!
//! The header is self-describing up to its block count, which gives a usable
//! size estimate without walking the block graph. A controller sequence near
//! the head of the block list marks the file as a `.kf` animation.

use crate::formats::{Category, Format, ParseContext, ParseResult, Signature, keys};
use crate::reader;

const SIGNATURES: [Signature; 1] = [Signature {
    id: "nif_gamebryo",
    magic: b"Gamebryo File Format",
    description: "Gamebryo scene graph",
}];

const MAGIC_LEN: usize = 20;
const VERSION_PREFIX: &[u8] = b", Version ";
const MAX_BLOCKS: u32 = 10_000;
const MAX_ESTIMATE: u32 = 20 * 1024 * 1024;

/// Marker block type that distinguishes animation files from meshes.
const KF_MARKER: &[u8] = b"NiControllerSequence";

pub struct NifFormat;

fn parse_version_line(h: &[u8]) -> Option<(String, usize)> {
    if !h.starts_with(b"Gamebryo File Format") {
        return None;
    }
    let rest = h.get(MAGIC_LEN..)?;
    if !rest.starts_with(VERSION_PREFIX) {
        return None;
    }
    let after = &rest[VERSION_PREFIX.len()..];
    let nl = memchr::memchr(b'\n', &after[..after.len().min(32)])?;
    let version_bytes = &after[..nl];
    let version = std::str::from_utf8(version_bytes).ok()?;

    let parts: Vec<&str> = version.trim_end_matches('\r').split('.').collect();
    if parts.len() != 4 || !parts.iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }

    let header_line_len = MAGIC_LEN + VERSION_PREFIX.len() + nl + 1;
    Some((version.trim_end_matches('\r').to_string(), header_line_len))
}

impl Format for NifFormat {
    fn format_id(&self) -> &'static str {
        "nif"
    }

    fn display_name(&self) -> &'static str {
        "Gamebryo Model"
    }

    fn extension(&self) -> &'static str {
        ".nif"
    }

    fn category(&self) -> Category {
        Category::Model
    }

    fn output_folder(&self) -> &'static str {
        "meshes"
    }

    fn min_size(&self) -> u32 {
        64
    }

    fn max_size(&self) -> u32 {
        MAX_ESTIMATE
    }

    fn signatures(&self) -> &'static [Signature] {
        &SIGNATURES
    }

    fn parse(&self, window: &[u8], at: usize, _ctx: &ParseContext<'_>) -> Option<ParseResult> {
        let h = window.get(at..)?;
        let (version, binary_off) = parse_version_line(h)?;

        let _binary_version = reader::u32_le(h, binary_off)?;
        let little_endian = *h.get(binary_off + 4)? != 0;
        let num_blocks_off = binary_off + 9;
        let (user_version, num_blocks) = if little_endian {
            (
                reader::u32_le(h, binary_off + 5)?,
                reader::u32_le(h, num_blocks_off)?,
            )
        } else {
            (
                reader::u32_be(h, binary_off + 5)?,
                reader::u32_be(h, num_blocks_off)?,
            )
        };

        if num_blocks == 0 || num_blocks > MAX_BLOCKS {
            return None;
        }

        let estimated = (500u64 * num_blocks as u64 + 1000).min(MAX_ESTIMATE as u64) as u32;

        let probe = &h[..h.len().min(4096)];
        let is_kf = probe
            .windows(KF_MARKER.len())
            .any(|w| w == KF_MARKER);

        let mut result = ParseResult::new(if is_kf { "KF" } else { "NIF" }, estimated);
        result.set(keys::VERSION, version);
        result.set("numBlocks", num_blocks);
        result.set("userVersion", user_version);
        if is_kf {
            result.extension_override = Some(".kf");
            result.output_folder_override = Some("anims");
        }
        Some(result)
    }
}

#[cfg(test)]
pub(crate) fn synth_nif(num_blocks: u32, big_endian: bool, kf: bool) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"Gamebryo File Format, Version 20.0.0.4\n");
    data.extend_from_slice(&0x1400_0004u32.to_le_bytes());
    data.push(if big_endian { 0 } else { 1 });
    let put = |v: u32| {
        if big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    };
    data.extend_from_slice(&put(11)); // user version
    data.extend_from_slice(&put(num_blocks));
    if kf {
        data.extend_from_slice(b"\x14\x00\x00\x00NiControllerSequence");
    }
    data.extend_from_slice(&[0u8; 64]);
    data
}
