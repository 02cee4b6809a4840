//! Re-framing of inbound PCM into fixed-size recognizer frames.

use crate::config::PacketizerConfig;
use crate::connector::TurnConnector;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Accumulates arbitrary-sized audio chunks and slices them into frames of
/// exactly `target_frame_bytes`.
#[derive(Debug)]
pub struct Packetizer {
    buffer: Vec<u8>,
    target: usize,
    min_flush: usize,
    trailing_min: usize,
}

impl Packetizer {
    pub fn new(config: PacketizerConfig) -> Self {
        let target = config.target_frame_bytes();
        Self {
            buffer: Vec::with_capacity(target * 2),
            target,
            min_flush: config.min_flush_bytes(),
            trailing_min: config.trailing_min_bytes(),
        }
    }

    /// Buffers `bytes` and returns every complete frame now available.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::with_capacity(self.buffer.len() / self.target);
        while self.buffer.len() >= self.target {
            frames.push(self.buffer.drain(..self.target).collect());
        }
        frames
    }

    /// Called after an idle gap. Releases the buffer if it holds at least
    /// the minimum flush size; smaller remainders keep waiting.
    pub fn flush_idle(&mut self) -> Option<Vec<u8>> {
        if !self.buffer.is_empty() && self.buffer.len() >= self.min_flush {
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        }
    }

    /// Drains the buffer on teardown. Remainders below the trailing threshold
    /// are discarded.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        let rest = std::mem::take(&mut self.buffer);
        (!rest.is_empty() && rest.len() >= self.trailing_min).then_some(rest)
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Drives a [`Packetizer`] from an audio channel until the channel closes,
/// then flushes the tail and disconnects the recognizer.
///
/// Forwarding failures are logged and the frame is dropped; they never end
/// the ingest loop.
pub async fn run_ingest(
    config: PacketizerConfig,
    mut audio_rx: mpsc::Receiver<Vec<u8>>,
    connector: Arc<dyn TurnConnector>,
) {
    let mut packetizer = Packetizer::new(config);
    let mut frames_sent: u64 = 0;

    loop {
        match tokio::time::timeout(config.idle_flush, audio_rx.recv()).await {
            Ok(Some(chunk)) => {
                for frame in packetizer.push(&chunk) {
                    forward(connector.as_ref(), frame, &mut frames_sent).await;
                }
            }
            Ok(None) => break,
            Err(_) => {
                if let Some(frame) = packetizer.flush_idle() {
                    debug!(bytes = frame.len(), "idle flush");
                    forward(connector.as_ref(), frame, &mut frames_sent).await;
                }
            }
        }
    }

    if let Some(frame) = packetizer.finish() {
        forward(connector.as_ref(), frame, &mut frames_sent).await;
    }
    if let Err(e) = connector.disconnect().await {
        warn!(error = %e, "failed to disconnect transcriber");
    }
    debug!(frames_sent, "audio ingest finished");
}

async fn forward(connector: &dyn TurnConnector, frame: Vec<u8>, frames_sent: &mut u64) {
    let bytes = frame.len();
    match connector.stream(frame).await {
        Ok(()) => *frames_sent += 1,
        Err(e) => warn!(bytes, error = %e, "failed to forward audio frame"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoiceError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingConnector {
        frames: Mutex<Vec<usize>>,
        disconnected: AtomicBool,
        fail_streams: bool,
    }

    #[async_trait]
    impl TurnConnector for RecordingConnector {
        async fn stream(&self, frame: Vec<u8>) -> Result<(), VoiceError> {
            if self.fail_streams {
                return Err(VoiceError::Closed);
            }
            self.frames.lock().unwrap().push(frame.len());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), VoiceError> {
            self.disconnected.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn push_emits_exact_frames_and_keeps_remainder() {
        let mut packetizer = Packetizer::new(PacketizerConfig::default());
        assert!(packetizer.push(&[0; 1000]).is_empty());
        let frames = packetizer.push(&[1; 6000]);
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.len() == 3200));
        assert_eq!(packetizer.buffered(), 600);
    }

    #[test]
    fn frames_preserve_byte_order() {
        let mut packetizer = Packetizer::new(PacketizerConfig::default());
        let input: Vec<u8> = (0..3200u32).map(|i| (i % 251) as u8).collect();
        packetizer.push(&input[..1234]);
        let frames = packetizer.push(&input[1234..]);
        assert_eq!(frames, vec![input]);
    }

    #[test]
    fn idle_flush_respects_minimum() {
        let mut packetizer = Packetizer::new(PacketizerConfig::default());
        packetizer.push(&[0; 1599]);
        assert!(packetizer.flush_idle().is_none());
        packetizer.push(&[0; 1]);
        assert_eq!(packetizer.flush_idle().map(|f| f.len()), Some(1600));
        assert_eq!(packetizer.buffered(), 0);
    }

    #[test]
    fn finish_drops_tiny_tail() {
        let mut packetizer = Packetizer::new(PacketizerConfig::default());
        packetizer.push(&[0; 319]);
        assert!(packetizer.finish().is_none());
        packetizer.push(&[0; 320]);
        assert_eq!(packetizer.finish().map(|f| f.len()), Some(320));
    }

    #[tokio::test(start_paused = true)]
    async fn ingest_flushes_on_idle_and_disconnects_on_close() {
        let connector = Arc::new(RecordingConnector::default());
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(run_ingest(
            PacketizerConfig::default(),
            rx,
            connector.clone(),
        ));

        tx.send(vec![0; 5000]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(*connector.frames.lock().unwrap(), vec![3200, 1800]);

        tx.send(vec![0; 100]).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(*connector.frames.lock().unwrap(), vec![3200, 1800]);
        assert!(connector.disconnected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn forwarding_failures_do_not_stop_ingest() {
        let connector = Arc::new(RecordingConnector {
            fail_streams: true,
            ..Default::default()
        });
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(run_ingest(
            PacketizerConfig::default(),
            rx,
            connector.clone(),
        ));

        tx.send(vec![0; 6400]).await.unwrap();
        tx.send(vec![0; 3200]).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(connector.disconnected.load(Ordering::SeqCst));
    }
}
