use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub overlay: OverlayConfig,

    #[serde(default)]
    pub direct: DirectConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Hostname advertised in stream URLs (falls back to the bind host,
    /// or "localhost" when bound to 0.0.0.0).
    #[serde(default)]
    pub public_host: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_host: None,
        }
    }
}

impl ServerConfig {
    /// Base URL external players should use to reach this server.
    pub fn public_base_url(&self) -> String {
        let host = self.public_host.clone().unwrap_or_else(|| {
            if self.host == "0.0.0.0" {
                "localhost".to_string()
            } else {
                self.host.clone()
            }
        });
        format!("http://{}:{}", host, self.port)
    }
}

/// Knobs for the supervised HLS encoder invocation.
///
/// The original deployment shipped several near-identical server variants
/// (SD/HD/debug); those differences are all expressible here.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Encoder binary name or path.
    #[serde(default = "default_encoder")]
    pub encoder: String,

    /// Directory the encoder writes the manifest and segments into.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// x264 preset (ultrafast for low-latency SD, fast for HD).
    #[serde(default = "default_preset")]
    pub preset: String,

    #[serde(default = "default_crf")]
    pub crf: u32,

    /// Rate cap, e.g. "4M". Unset means CRF-only.
    #[serde(default)]
    pub max_bitrate: Option<String>,

    /// Rate-control buffer, e.g. "8M".
    #[serde(default)]
    pub buffer_size: Option<String>,

    #[serde(default = "default_segment_duration")]
    pub segment_duration_secs: u32,

    /// Sliding-window size: the encoder keeps this many chunks in the
    /// manifest and deletes older ones.
    #[serde(default = "default_playlist_size")]
    pub playlist_size: u32,

    /// Start the stream as soon as the server has booted.
    #[serde(default)]
    pub auto_start: bool,

    /// How long a freshly launched encoder must stay alive before the
    /// session is considered active.
    #[serde(default = "default_startup_grace")]
    pub startup_grace_secs: u64,

    /// Bound on graceful termination before escalating to a hard kill.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,

    /// Pause between stop and start during a restart, letting OS resources
    /// release.
    #[serde(default = "default_restart_pause")]
    pub restart_pause_ms: u64,
}

fn default_encoder() -> String {
    "ffmpeg".to_string()
}
fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join("patterncast").join("hls")
}
fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}
fn default_frame_rate() -> u32 {
    30
}
fn default_preset() -> String {
    "ultrafast".to_string()
}
fn default_crf() -> u32 {
    23
}
fn default_segment_duration() -> u32 {
    2
}
fn default_playlist_size() -> u32 {
    5
}
fn default_startup_grace() -> u64 {
    3
}
fn default_stop_timeout() -> u64 {
    5
}
fn default_restart_pause() -> u64 {
    2000
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            encoder: default_encoder(),
            output_dir: default_output_dir(),
            width: default_width(),
            height: default_height(),
            frame_rate: default_frame_rate(),
            preset: default_preset(),
            crf: default_crf(),
            max_bitrate: None,
            buffer_size: None,
            segment_duration_secs: default_segment_duration(),
            playlist_size: default_playlist_size(),
            auto_start: false,
            startup_grace_secs: default_startup_grace(),
            stop_timeout_secs: default_stop_timeout(),
            restart_pause_ms: default_restart_pause(),
        }
    }
}

/// Text rendered on top of the test pattern.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OverlayConfig {
    #[serde(default = "default_heading")]
    pub heading: String,

    #[serde(default = "default_subtitle")]
    pub subtitle: String,

    /// Font used by the encoder's drawtext filter. Unset lets the encoder
    /// pick its built-in default.
    #[serde(default)]
    pub font_file: Option<PathBuf>,
}

fn default_heading() -> String {
    "Server Uptime".to_string()
}
fn default_subtitle() -> String {
    "HLS Live Stream".to_string()
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            heading: default_heading(),
            subtitle: default_subtitle(),
            font_file: None,
        }
    }
}

/// Settings for the pass-through pipe stream (`GET /stream`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectConfig {
    #[serde(default = "default_direct_enabled")]
    pub enabled: bool,

    #[serde(default = "default_direct_container")]
    pub container: String,

    #[serde(default = "default_direct_codec")]
    pub video_codec: String,

    #[serde(default = "default_direct_bitrate")]
    pub bitrate: String,
}

fn default_direct_enabled() -> bool {
    true
}
fn default_direct_container() -> String {
    "webm".to_string()
}
fn default_direct_codec() -> String {
    "libvpx-vp8".to_string()
}
fn default_direct_bitrate() -> String {
    "1M".to_string()
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            enabled: default_direct_enabled(),
            container: default_direct_container(),
            video_codec: default_direct_codec(),
            bitrate: default_direct_bitrate(),
        }
    }
}
