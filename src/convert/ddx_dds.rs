//! DDX to DDS conversion through the external `ddxconv` tool.

use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::convert::{
    ConversionStats, ConvertError, Converted, Converter, run_tool, tool_from_env,
};

/// Environment variable naming the converter executable.
pub const DDXCONV_ENV: &str = "DDXCONV_PATH";

pub struct DdxConverter {
    exe: Option<PathBuf>,
    stats: ConversionStats,
}

impl DdxConverter {
    pub fn from_env() -> Self {
        Self {
            exe: tool_from_env(DDXCONV_ENV),
            stats: ConversionStats::default(),
        }
    }
}

impl Converter for DdxConverter {
    fn name(&self) -> &'static str {
        "ddxconv"
    }

    fn target_folder(&self) -> &'static str {
        "textures"
    }

    fn target_extension(&self) -> &'static str {
        ".dds"
    }

    fn can_convert(&self, signature_id: &str, _metadata: &Map<String, Value>) -> bool {
        // Both DDX variants are claimed; 3XDR conversions fail fast inside
        // `convert` so the caller records them and keeps the raw bytes.
        signature_id == "ddx_3xdo" || signature_id == "ddx_3xdr"
    }

    fn convert(
        &self,
        data: &[u8],
        metadata: &Map<String, Value>,
    ) -> Result<Converted, ConvertError> {
        if metadata.get("variant").and_then(|v| v.as_str()) == Some("3XDR") {
            return Err(ConvertError::Failed("3XDR is not convertible".to_string()));
        }
        let exe = self
            .exe
            .as_deref()
            .ok_or_else(|| ConvertError::Unavailable(format!("{DDXCONV_ENV} not set")))?;

        let (dds, atlas) = run_tool(exe, data, ".ddx", ".dds")?;
        let is_partial = dds.len() < 128;
        Ok(Converted {
            data: dds,
            atlas,
            is_partial,
            notes: None,
        })
    }

    fn stats(&self) -> &ConversionStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_both_ddx_variants_only() {
        let conv = DdxConverter {
            exe: None,
            stats: ConversionStats::default(),
        };
        let meta = Map::new();
        assert!(conv.can_convert("ddx_3xdo", &meta));
        assert!(conv.can_convert("ddx_3xdr", &meta));
        assert!(!conv.can_convert("dds", &meta));
    }

    #[test]
    fn rejects_3xdr_before_tool_lookup() {
        let conv = DdxConverter {
            exe: None,
            stats: ConversionStats::default(),
        };
        let mut meta = Map::new();
        meta.insert("variant".to_string(), Value::from("3XDR"));
        let err = conv.convert(&[0u8; 16], &meta).unwrap_err();
        assert!(matches!(err, ConvertError::Failed(_)));
    }

    #[test]
    fn missing_env_is_unavailable() {
        let conv = DdxConverter {
            exe: None,
            stats: ConversionStats::default(),
        };
        let err = conv.convert(&[0u8; 16], &Map::new()).unwrap_err();
        assert!(matches!(err, ConvertError::Unavailable(_)));
    }
}
