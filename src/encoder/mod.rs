//! External encoder invocation.
//!
//! The encoder (ffmpeg by default) is an opaque collaborator: it is handed a
//! fully-specified, non-interactive argument vector and is expected to either
//! exit non-zero quickly or run indefinitely, writing chunks and rewriting the
//! manifest while deleting chunks that fall out of the sliding window.

mod handle;
pub mod tools;

pub use handle::{EncoderHandle, Startup};

use std::path::PathBuf;

use crate::config::{DirectConfig, OverlayConfig, StreamConfig};
use crate::store::SegmentStore;

/// Fully-resolved parameters for one encoder invocation.
///
/// Collapses what used to be separate SD/HD/debug/WebM server variants into
/// one parameterized invocation.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub program: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub preset: String,
    pub crf: u32,
    pub max_bitrate: Option<String>,
    pub buffer_size: Option<String>,
    pub segment_duration_secs: u32,
    pub playlist_size: u32,
    pub heading: String,
    pub subtitle: String,
    pub font_file: Option<PathBuf>,
}

impl EncoderConfig {
    pub fn from_config(stream: &StreamConfig, overlay: &OverlayConfig) -> Self {
        Self {
            program: stream.encoder.clone(),
            width: stream.width,
            height: stream.height,
            frame_rate: stream.frame_rate,
            preset: stream.preset.clone(),
            crf: stream.crf,
            max_bitrate: stream.max_bitrate.clone(),
            buffer_size: stream.buffer_size.clone(),
            segment_duration_secs: stream.segment_duration_secs,
            playlist_size: stream.playlist_size,
            heading: overlay.heading.clone(),
            subtitle: overlay.subtitle.clone(),
            font_file: overlay.font_file.clone(),
        }
    }

    /// Argument vector for the rotating file-based HLS invocation.
    ///
    /// `-hls_base_url segment/` keeps manifest entries resolvable against the
    /// `/segment/{name}` route when the manifest itself is served from the
    /// server root.
    pub fn hls_args(&self, store: &SegmentStore) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-f".into(),
            "lavfi".into(),
            "-i".into(),
            format!(
                "testsrc2=size={}x{}:rate={}",
                self.width, self.height, self.frame_rate
            ),
            "-vf".into(),
            self.filter_graph(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            self.preset.clone(),
            "-tune".into(),
            "zerolatency".into(),
            "-crf".into(),
            self.crf.to_string(),
        ];

        if let Some(rate) = &self.max_bitrate {
            args.push("-maxrate".into());
            args.push(rate.clone());
        }
        if let Some(buf) = &self.buffer_size {
            args.push("-bufsize".into());
            args.push(buf.clone());
        }

        args.extend([
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-f".into(),
            "hls".into(),
            "-hls_time".into(),
            self.segment_duration_secs.to_string(),
            "-hls_list_size".into(),
            self.playlist_size.to_string(),
            "-hls_flags".into(),
            "delete_segments+independent_segments".into(),
            "-hls_base_url".into(),
            "segment/".into(),
            "-hls_segment_filename".into(),
            store.chunk_pattern().to_string_lossy().into_owned(),
            store.manifest_path().to_string_lossy().into_owned(),
        ]);

        args
    }

    /// Argument vector for the pass-through pipe invocation: same synthetic
    /// source and overlay, muxed straight to stdout.
    pub fn direct_args(&self, direct: &DirectConfig) -> Vec<String> {
        vec![
            "-f".into(),
            "lavfi".into(),
            "-i".into(),
            format!(
                "testsrc2=size={}x{}:rate={}",
                self.width, self.height, self.frame_rate
            ),
            "-vf".into(),
            self.filter_graph(),
            "-c:v".into(),
            direct.video_codec.clone(),
            "-b:v".into(),
            direct.bitrate.clone(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-f".into(),
            direct.container.clone(),
            "pipe:1".into(),
        ]
    }

    /// Video filter graph: an orbiting box over the test pattern, a heading,
    /// the encoder-side uptime timer, and a subtitle line.
    fn filter_graph(&self) -> String {
        // Orbit radius and box size scale with the frame so SD and HD
        // configurations both look right.
        let orbit = self.width / 8;
        let box_size = self.width / 6;
        let font = self
            .font_file
            .as_ref()
            .map(|p| format!(":fontfile={}", p.display()))
            .unwrap_or_default();

        let mut filters = Vec::new();
        filters.push(format!(
            "drawbox=x={orbit}+{orbit}*cos(t*2*PI/5):y={orbit}+{orbit}*sin(t*2*PI/5):\
             w={box_size}:h={box_size}:color=red@0.8:t=fill"
        ));
        filters.push(format!(
            "drawtext=text='{}':x=10:y=30:fontsize=24:fontcolor=white{font}",
            self.heading
        ));
        filters.push(format!(
            "drawtext=text='%{{pts\\:hms}}':x=10:y=60:fontsize=32:fontcolor=yellow{font}"
        ));
        filters.push(format!(
            "drawtext=text='{}':x=10:y=100:fontsize=20:fontcolor=cyan{font}",
            self.subtitle
        ));
        filters.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_encoder() -> (EncoderConfig, SegmentStore) {
        let config = Config::default();
        let encoder = EncoderConfig::from_config(&config.stream, &config.overlay);
        let store = SegmentStore::new("/tmp/patterncast-test/hls");
        (encoder, store)
    }

    #[test]
    fn test_hls_args_sliding_window() {
        let (encoder, store) = test_encoder();
        let args = encoder.hls_args(&store);

        let time_at = args.iter().position(|a| a == "-hls_time").unwrap();
        assert_eq!(args[time_at + 1], "2");
        let size_at = args.iter().position(|a| a == "-hls_list_size").unwrap();
        assert_eq!(args[size_at + 1], "5");
        assert!(args
            .iter()
            .any(|a| a == "delete_segments+independent_segments"));
    }

    #[test]
    fn test_hls_args_manifest_is_final_argument() {
        let (encoder, store) = test_encoder();
        let args = encoder.hls_args(&store);
        assert_eq!(
            args.last().map(String::as_str),
            store.manifest_path().to_str()
        );
    }

    #[test]
    fn test_hls_args_base_url_targets_segment_route() {
        let (encoder, store) = test_encoder();
        let args = encoder.hls_args(&store);
        let at = args.iter().position(|a| a == "-hls_base_url").unwrap();
        assert_eq!(args[at + 1], "segment/");
    }

    #[test]
    fn test_hls_args_rate_cap_optional() {
        let (mut encoder, store) = test_encoder();
        assert!(!encoder.hls_args(&store).iter().any(|a| a == "-maxrate"));

        encoder.max_bitrate = Some("4M".into());
        encoder.buffer_size = Some("8M".into());
        let args = encoder.hls_args(&store);
        let at = args.iter().position(|a| a == "-maxrate").unwrap();
        assert_eq!(args[at + 1], "4M");
        let at = args.iter().position(|a| a == "-bufsize").unwrap();
        assert_eq!(args[at + 1], "8M");
    }

    #[test]
    fn test_direct_args_pipe_to_stdout() {
        let (encoder, _) = test_encoder();
        let direct = DirectConfig::default();
        let args = encoder.direct_args(&direct);
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
        assert!(args.iter().any(|a| a == "libvpx-vp8"));
        assert!(args.iter().any(|a| a == "webm"));
    }

    #[test]
    fn test_filter_graph_contains_timer() {
        let (encoder, _) = test_encoder();
        let graph = encoder.filter_graph();
        assert!(graph.contains("pts\\:hms"));
        assert!(graph.contains("Server Uptime"));
        assert!(graph.contains("drawbox"));
        // No font configured, so no fontfile clause.
        assert!(!graph.contains("fontfile"));
    }

    #[test]
    fn test_filter_graph_with_font() {
        let (mut encoder, _) = test_encoder();
        encoder.font_file = Some(PathBuf::from("/usr/share/fonts/DejaVuSans-Bold.ttf"));
        assert!(encoder
            .filter_graph()
            .contains(":fontfile=/usr/share/fonts/DejaVuSans-Bold.ttf"));
    }
}
