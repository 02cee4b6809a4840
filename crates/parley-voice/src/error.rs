use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Transcriber connection failed: {0}")]
    Connect(String),

    #[error("Transcriber WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Transcriber connection is closed")]
    Closed,
}
