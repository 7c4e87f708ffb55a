//! The process-wide format registry.
//!
//! Every `Format` implementation is enumerated here at compile time. The
//! registry is built once, validated, and then only ever handed out by
//! shared reference; signature ids, format ids, and extensions are all
//! checked unique at construction.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::formats::{
    Category, Format, Signature, UNKNOWN_COLOR, bik::BikFormat, dds::DdsFormat, ddx::DdxFormat,
    facegen::FacegenFormat, lip::LipFormat, nif::NifFormat, plugin::PluginFormat, png::PngFormat,
    scda::ScdaFormat, script::ScriptFormat, xdbf::XdbfFormat, xex::XexFormat, xma::XmaFormat,
    xui::XuiFormat,
};
use crate::matcher::SignatureMatcher;

/// Pseudo-signature supplied by the minidump collaborator; never scanned,
/// but colored as a header region.
pub const MINIDUMP_HEADER_ID: &str = "minidump_header";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate format id: {0}")]
    DuplicateFormatId(String),
    #[error("duplicate signature id: {0}")]
    DuplicateSignatureId(String),
    #[error("duplicate extension: {0}")]
    DuplicateExtension(String),
    #[error("magic for signature {0} is shorter than 2 bytes")]
    MagicTooShort(String),
    #[error("format {0} has min_size > max_size")]
    BadSizeBounds(String),
    #[error("unknown type filter entry: {0}")]
    UnknownFilterEntry(String),
}

pub struct FormatRegistry {
    formats: Vec<Box<dyn Format>>,
    by_signature: HashMap<&'static str, usize>,
    by_extension: HashMap<String, usize>,
}

static GLOBAL: Lazy<FormatRegistry> =
    Lazy::new(|| FormatRegistry::new().expect("format registry invariants hold"));

impl FormatRegistry {
    /// The shared immutable registry.
    pub fn global() -> &'static FormatRegistry {
        &GLOBAL
    }

    pub fn new() -> Result<Self, RegistryError> {
        let formats: Vec<Box<dyn Format>> = vec![
            Box::new(DdsFormat),
            Box::new(DdxFormat),
            Box::new(XmaFormat),
            Box::new(NifFormat),
            Box::new(PngFormat),
            Box::new(XuiFormat),
            Box::new(XdbfFormat),
            Box::new(XexFormat),
            Box::new(PluginFormat),
            Box::new(LipFormat),
            Box::new(ScdaFormat),
            Box::new(ScriptFormat),
            Box::new(FacegenFormat),
            Box::new(BikFormat),
        ];

        let mut by_format_id: HashMap<String, usize> = HashMap::new();
        let mut by_signature: HashMap<&'static str, usize> = HashMap::new();
        let mut by_extension: HashMap<String, usize> = HashMap::new();

        for (idx, format) in formats.iter().enumerate() {
            let fid = format.format_id().to_ascii_lowercase();
            if by_format_id.insert(fid, idx).is_some() {
                return Err(RegistryError::DuplicateFormatId(
                    format.format_id().to_string(),
                ));
            }
            if format.min_size() > format.max_size() {
                return Err(RegistryError::BadSizeBounds(format.format_id().to_string()));
            }
            for sig in format.signatures() {
                if sig.magic.len() < 2 {
                    return Err(RegistryError::MagicTooShort(sig.id.to_string()));
                }
                if by_signature.insert(sig.id, idx).is_some() {
                    return Err(RegistryError::DuplicateSignatureId(sig.id.to_string()));
                }
            }
            let ext = format.extension().to_ascii_lowercase();
            if by_extension.insert(ext, idx).is_some() {
                return Err(RegistryError::DuplicateExtension(
                    format.extension().to_string(),
                ));
            }
        }

        Ok(Self {
            formats,
            by_signature,
            by_extension,
        })
    }

    pub fn all(&self) -> &[Box<dyn Format>] {
        &self.formats
    }

    pub fn by_format_id(&self, id: &str) -> Option<&dyn Format> {
        self.formats
            .iter()
            .find(|f| f.format_id().eq_ignore_ascii_case(id))
            .map(|f| f.as_ref())
    }

    pub fn by_signature_id(&self, sig_id: &str) -> Option<&dyn Format> {
        self.by_signature
            .get(sig_id)
            .map(|&idx| self.formats[idx].as_ref())
    }

    pub fn by_extension(&self, ext: &str) -> Option<&dyn Format> {
        let normalized = ext.trim_start_matches('.').to_ascii_lowercase();
        self.by_extension
            .get(&format!(".{normalized}"))
            .map(|&idx| self.formats[idx].as_ref())
    }

    /// ARGB display color for a signature id; unknown ids fall back to the
    /// neutral gray.
    pub fn get_color(&self, sig_id: &str) -> u32 {
        if sig_id == MINIDUMP_HEADER_ID {
            return Category::Header.color();
        }
        self.by_signature_id(sig_id)
            .map(|f| f.category().color())
            .unwrap_or(UNKNOWN_COLOR)
    }

    /// The `Signature` record for an id, when registered.
    pub fn signature(&self, sig_id: &str) -> Option<&'static Signature> {
        let format = self.by_signature_id(sig_id)?;
        format.signatures().iter().find(|s| s.id == sig_id)
    }

    /// Every scannable `(signature id, magic)` pair, in registration order.
    pub fn scan_signatures(&self) -> Vec<&'static Signature> {
        self.formats
            .iter()
            .filter(|f| f.scan_enabled())
            .flat_map(|f| f.signatures().iter())
            .collect()
    }

    /// Every registered magic, for boundary scanning.
    pub fn boundary_magics(&self) -> Vec<&'static [u8]> {
        self.formats
            .iter()
            .flat_map(|f| f.signatures().iter().map(|s| s.magic))
            .collect()
    }

    /// Build and seal the Aho-Corasick matcher over all scannable magics.
    pub fn build_matcher(&self) -> SignatureMatcher {
        let mut matcher = SignatureMatcher::new();
        for sig in self.scan_signatures() {
            matcher
                .add_pattern(sig.id, sig.magic)
                .expect("registry magics satisfy matcher constraints");
        }
        matcher.build();
        matcher
    }

    /// Tolerant resolver for user-supplied type names: signature ids, format
    /// ids, extensions, display names, and a few well-known keywords all
    /// resolve to a canonical signature id.
    pub fn normalize_to_signature_id(&self, freeform: &str) -> Option<&'static str> {
        let needle = freeform.trim().trim_start_matches('.').to_ascii_lowercase();
        if needle.is_empty() {
            return None;
        }

        if let Some(&idx) = self.by_signature.get(needle.as_str()) {
            let format = &self.formats[idx];
            return format
                .signatures()
                .iter()
                .find(|s| s.id == needle)
                .map(|s| s.id);
        }

        let keyword = match needle.as_str() {
            "texture" | "textures" => Some("dds"),
            "module" | "executable" => Some("xex"),
            "image" | "images" => Some("png"),
            "audio" | "sound" | "music" => Some("xma_riff"),
            "model" | "mesh" | "meshes" => Some("nif_gamebryo"),
            "video" => Some("bik"),
            "profile" | "dashboard" => Some("xdbf"),
            "ui" => Some("xui_binary"),
            _ => None,
        };
        if let Some(id) = keyword {
            return Some(id);
        }

        let format = self
            .by_format_id(&needle)
            .or_else(|| self.by_extension(&needle))
            .or_else(|| {
                self.formats
                    .iter()
                    .find(|f| f.display_name().eq_ignore_ascii_case(&needle))
                    .map(|f| f.as_ref())
            })?;
        format.signatures().first().map(|s| s.id)
    }

    /// Resolve a CLI type filter to the set of signature ids it selects. An
    /// entry that resolves to a format id selects all of that format's
    /// signatures.
    pub fn resolve_filter(
        &self,
        entries: &[String],
    ) -> Result<std::collections::HashSet<&'static str>, RegistryError> {
        let mut selected = std::collections::HashSet::new();
        for entry in entries {
            let sig_id = self
                .normalize_to_signature_id(entry)
                .ok_or_else(|| RegistryError::UnknownFilterEntry(entry.clone()))?;
            let format = self
                .by_signature_id(sig_id)
                .ok_or_else(|| RegistryError::UnknownFilterEntry(entry.clone()))?;
            if format.format_id().eq_ignore_ascii_case(entry.trim()) {
                for sig in format.signatures() {
                    selected.insert(sig.id);
                }
            } else {
                selected.insert(sig_id);
            }
        }
        Ok(selected)
    }
}
