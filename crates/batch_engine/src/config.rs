use std::ffi::OsString;
use std::path::{Path, PathBuf};

use batch_core::{ProgressParser, StopPolicy, DEFAULT_NOISE_MARKERS};
use serde::{Deserialize, Serialize};

/// How the external download tool is invoked.
///
/// The command line has the shape
/// `<program> [program_args..] download <identifier> --output <dir>/<template>.<format>
/// --format <format> --bitrate <bitrate>`. Template placeholders such as
/// `{artist}` are resolved by the tool, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub program: String,
    /// Arguments placed before `download`, e.g. `["-m", "spotdl"]` with `python`.
    pub program_args: Vec<String>,
    pub format: String,
    pub bitrate: String,
    pub output_template: String,
    pub noise_markers: Vec<String>,
    pub stop_policy: StopPolicy,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "spotdl".to_string(),
            program_args: Vec::new(),
            format: "mp3".to_string(),
            bitrate: "320k".to_string(),
            output_template: "{artist}/{album}/{title}".to_string(),
            noise_markers: DEFAULT_NOISE_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
            stop_policy: StopPolicy::Finish,
        }
    }
}

impl ToolConfig {
    /// Output path pattern handed to the tool for `output_dir`.
    pub fn output_pattern(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}.{}", self.output_template, self.format))
    }

    /// Arguments after `program`, in order.
    pub fn command_args(&self, identifier: &str, output_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.program_args.iter().map(OsString::from).collect();
        args.extend([
            OsString::from("download"),
            OsString::from(identifier),
            OsString::from("--output"),
            self.output_pattern(output_dir).into_os_string(),
            OsString::from("--format"),
            OsString::from(&self.format),
            OsString::from("--bitrate"),
            OsString::from(&self.bitrate),
        ]);
        args
    }

    pub fn parser(&self) -> ProgressParser {
        ProgressParser::new(self.noise_markers.iter().cloned())
    }
}
