use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Bytes per sample for s16le PCM.
const BYTES_PER_SAMPLE: u32 = 2;

fn default_url() -> String {
    "wss://streaming.assemblyai.com/v3/ws".to_string()
}

fn default_sample_rate() -> u32 {
    16_000
}

fn default_target_frame_ms() -> u32 {
    100
}

fn default_min_flush_ms() -> u32 {
    50
}

fn default_idle_flush_ms() -> u64 {
    200
}

fn default_trailing_min_ms() -> u32 {
    10
}

/// Streaming speech recognizer settings (`[asr]` in the server config).
#[derive(Clone, Serialize, Deserialize)]
pub struct AsrConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Frame size forwarded to the recognizer, in milliseconds of audio.
    #[serde(default = "default_target_frame_ms")]
    pub target_frame_ms: u32,
    /// Smallest partial frame flushed after an idle gap.
    #[serde(default = "default_min_flush_ms")]
    pub min_flush_ms: u32,
    #[serde(default = "default_idle_flush_ms")]
    pub idle_flush_ms: u64,
    /// Smallest trailing buffer still worth sending on teardown.
    #[serde(default = "default_trailing_min_ms")]
    pub trailing_min_ms: u32,
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_key: String::new(),
            sample_rate: default_sample_rate(),
            target_frame_ms: default_target_frame_ms(),
            min_flush_ms: default_min_flush_ms(),
            idle_flush_ms: default_idle_flush_ms(),
            trailing_min_ms: default_trailing_min_ms(),
        }
    }
}

impl fmt::Debug for AsrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsrConfig")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .field("sample_rate", &self.sample_rate)
            .field("target_frame_ms", &self.target_frame_ms)
            .field("min_flush_ms", &self.min_flush_ms)
            .field("idle_flush_ms", &self.idle_flush_ms)
            .field("trailing_min_ms", &self.trailing_min_ms)
            .finish()
    }
}

impl AsrConfig {
    pub fn packetizer(&self) -> PacketizerConfig {
        PacketizerConfig {
            sample_rate: self.sample_rate,
            target_frame_ms: self.target_frame_ms,
            min_flush_ms: self.min_flush_ms,
            idle_flush: Duration::from_millis(self.idle_flush_ms),
            trailing_min_ms: self.trailing_min_ms,
        }
    }
}

/// Frame sizing for mono s16le audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketizerConfig {
    pub sample_rate: u32,
    pub target_frame_ms: u32,
    pub min_flush_ms: u32,
    pub idle_flush: Duration,
    pub trailing_min_ms: u32,
}

impl Default for PacketizerConfig {
    fn default() -> Self {
        AsrConfig::default().packetizer()
    }
}

impl PacketizerConfig {
    fn bytes_for(&self, ms: u32) -> usize {
        (u64::from(self.sample_rate) * u64::from(BYTES_PER_SAMPLE) * u64::from(ms) / 1000) as usize
    }

    /// Never zero, so a frame always makes progress through the buffer.
    pub fn target_frame_bytes(&self) -> usize {
        self.bytes_for(self.target_frame_ms).max(BYTES_PER_SAMPLE as usize)
    }

    pub fn min_flush_bytes(&self) -> usize {
        self.bytes_for(self.min_flush_ms)
    }

    pub fn trailing_min_bytes(&self) -> usize {
        self.bytes_for(self.trailing_min_ms)
    }
}
