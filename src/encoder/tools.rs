//! Encoder binary detection.

use std::path::PathBuf;
use std::process::Command;

/// Information about the configured encoder binary.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name (or configured path) of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Probe the encoder by running its version query.
///
/// Used by the `check-tools` CLI; the health endpoint uses the cheaper
/// [`encoder_available`].
pub fn check_encoder(name: &str) -> ToolInfo {
    let result = Command::new(name).arg("-version").output();

    match result {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string());

            let path = which::which(name).ok();

            ToolInfo {
                name: name.to_string(),
                available: true,
                version,
                path,
            }
        }
        _ => ToolInfo {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        },
    }
}

/// PATH-lookup-only availability probe, cheap enough for every health call.
pub fn encoder_available(name: &str) -> bool {
    which::which(name).is_ok()
}
