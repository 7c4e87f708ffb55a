//! XUR (binary UI) to XUI conversion through the external `xuihelper` tool.

use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::convert::{
    ConversionStats, ConvertError, Converted, Converter, run_tool, tool_from_env,
};

/// Environment variable naming the converter executable.
pub const XUIHELPER_ENV: &str = "XUIHELPER_PATH";

pub struct XuiConverter {
    exe: Option<PathBuf>,
    stats: ConversionStats,
}

impl XuiConverter {
    pub fn from_env() -> Self {
        Self {
            exe: tool_from_env(XUIHELPER_ENV),
            stats: ConversionStats::default(),
        }
    }
}

impl Converter for XuiConverter {
    fn name(&self) -> &'static str {
        "xuihelper"
    }

    fn target_folder(&self) -> &'static str {
        "xui"
    }

    fn target_extension(&self) -> &'static str {
        ".xui"
    }

    fn can_convert(&self, signature_id: &str, _metadata: &Map<String, Value>) -> bool {
        // The XUIS "Scene" form is declared unsupported upstream; skipping it
        // here is deliberate and not counted as a failure.
        signature_id == "xui_binary"
    }

    fn convert(
        &self,
        data: &[u8],
        _metadata: &Map<String, Value>,
    ) -> Result<Converted, ConvertError> {
        let exe = self
            .exe
            .as_deref()
            .ok_or_else(|| ConvertError::Unavailable(format!("{XUIHELPER_ENV} not set")))?;

        let (xui, _atlas) = run_tool(exe, data, ".xur", ".xui")?;
        Ok(Converted {
            data: xui,
            atlas: None,
            is_partial: false,
            notes: None,
        })
    }

    fn stats(&self) -> &ConversionStats {
        &self.stats
    }
}
