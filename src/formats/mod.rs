//! Format registry building blocks.
//!
//! Every supported file family implements [`Format`]: static descriptors
//! (signatures, size bounds, output folder) plus a `parse` that validates a
//! candidate header and estimates the file size. Conversion and repair are
//! optional capabilities queried at runtime through `as_converter` /
//! `as_repairer`.

pub mod bik;
pub mod dds;
pub mod ddx;
pub mod facegen;
pub mod lip;
pub mod nif;
pub mod plugin;
pub mod png;
pub mod scda;
pub mod script;
pub mod xdbf;
pub mod xex;
pub mod xma;
pub mod xui;

use serde_json::{Map, Value};

use crate::boundary::BoundaryScanner;
use crate::convert::{Converter, Repairer};

/// A scannable byte prefix owned by a format. `id` is globally unique.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    pub id: &'static str,
    pub magic: &'static [u8],
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Texture,
    Image,
    Audio,
    Video,
    Model,
    Module,
    Script,
    Xbox,
    Plugin,
    Header,
}

impl Category {
    /// Fixed ARGB display color for this category.
    pub fn color(self) -> u32 {
        match self {
            Category::Texture => 0xFF2E_CC71,
            Category::Image => 0xFF1A_BC9C,
            Category::Audio => 0xFFE7_4C3C,
            Category::Video => 0xFFAA_66CC,
            Category::Model => 0xFFF1_C40F,
            Category::Module => 0xFF9B_59B6,
            Category::Script => 0xFFE6_7E22,
            Category::Xbox => 0xFF34_98DB,
            Category::Plugin => 0xFFFF_6B9D,
            Category::Header => 0xFF60_7D8B,
        }
    }
}

/// Color reported for signature ids no format claims.
pub const UNKNOWN_COLOR: u32 = 0xFF3D_3D3D;

/// Conventional metadata keys recognized by the extractor and writer.
pub mod keys {
    pub const SAFE_NAME: &str = "safeName";
    pub const TEXTURE_PATH: &str = "texturePath";
    pub const EMBEDDED_PATH: &str = "embeddedPath";
    pub const LEADING_COMMENT_SIZE: &str = "leadingCommentSize";
    pub const DIMENSIONS: &str = "dimensions";
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
    pub const MIP_COUNT: &str = "mipCount";
    pub const FORMAT_NAME: &str = "formatName";
    pub const VERSION: &str = "version";
    pub const IS_TILED: &str = "isTiled";
    pub const GPU_FORMAT: &str = "gpuFormat";
    pub const NEEDS_REPAIR: &str = "needsRepair";
    pub const HAS_SEEK_CHUNK: &str = "hasSeekChunk";
    pub const FORMAT_TAG: &str = "formatTag";
    pub const IS_XBOX_360: &str = "isXbox360";
    pub const IS_XMA: &str = "isXma";
}

/// Outcome of a successful header parse.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub format_label: &'static str,
    pub estimated_size: u32,
    pub file_name: Option<String>,
    pub output_folder_override: Option<&'static str>,
    pub extension_override: Option<&'static str>,
    pub metadata: Map<String, Value>,
}

impl ParseResult {
    pub fn new(format_label: &'static str, estimated_size: u32) -> Self {
        Self {
            format_label,
            estimated_size,
            file_name: None,
            output_folder_override: None,
            extension_override: None,
            metadata: Map::new(),
        }
    }

    pub fn set<V: Into<Value>>(&mut self, key: &str, value: V) {
        self.metadata.insert(key.to_string(), value.into());
    }

    /// Sanitized filename stem, when the parser recovered one.
    pub fn safe_name(&self) -> Option<&str> {
        self.metadata.get(keys::SAFE_NAME).and_then(|v| v.as_str())
    }

    /// Bytes preceding the matched signature that belong to the file.
    pub fn leading_comment_size(&self) -> u64 {
        self.metadata
            .get(keys::LEADING_COMMENT_SIZE)
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    }

    /// Origin path recorded for the manifest, if any.
    pub fn original_path(&self) -> Option<&str> {
        self.metadata
            .get(keys::TEXTURE_PATH)
            .or_else(|| self.metadata.get(keys::EMBEDDED_PATH))
            .and_then(|v| v.as_str())
    }
}

/// Read-only services available to a parser: the whole mapped dump (for
/// forward boundary scans past the header window) and the shared boundary
/// scanner.
pub struct ParseContext<'a> {
    pub dump: &'a [u8],
    /// Absolute offset of the matched signature within `dump`.
    pub header_offset: u64,
    pub boundary: &'a BoundaryScanner,
    /// Signature id the scanner matched at `header_offset`.
    pub signature_id: &'static str,
}

/// One file family: descriptors plus header parsing, with optional
/// conversion/repair capabilities.
pub trait Format: Send + Sync {
    fn format_id(&self) -> &'static str;
    fn display_name(&self) -> &'static str;
    /// Default output extension, dot included.
    fn extension(&self) -> &'static str;
    fn category(&self) -> Category;
    fn output_folder(&self) -> &'static str;
    fn min_size(&self) -> u32;
    fn max_size(&self) -> u32;
    fn signatures(&self) -> &'static [Signature];
    fn show_in_filter(&self) -> bool {
        true
    }
    fn scan_enabled(&self) -> bool {
        true
    }

    /// Validate the bytes at `window[at..]` (the matched signature sits at
    /// `at`; `window[..at]` is pre-read context) and estimate the file size.
    /// `None` means the candidate is not a real header.
    fn parse(&self, window: &[u8], at: usize, ctx: &ParseContext<'_>) -> Option<ParseResult>;

    fn as_converter(&self) -> Option<&dyn Converter> {
        None
    }

    fn as_repairer(&self) -> Option<&dyn Repairer> {
        None
    }
}
