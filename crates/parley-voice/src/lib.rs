//! Audio and turn handling for Parley voice sessions.
//!
//! Inbound PCM is packetized into fixed frames and streamed to a turn-based
//! speech recognizer through a [`TurnConnector`]. Recognizer results come back
//! as [`ConnectorEvent`]s on a channel owned by the connection loop, where the
//! [`TurnDispatcher`] decides which finals become assistant turns.
//!
//! Only one turn runs per session at a time. The [`TurnGate`] hands out a
//! [`TurnPermit`] that releases the gate when dropped, whether the turn
//! finishes, fails, times out or is aborted.

pub mod assemblyai;
pub mod config;
pub mod connector;
pub mod dispatcher;
pub mod error;
pub mod packetizer;

pub use assemblyai::AssemblyAiFactory;
pub use config::{AsrConfig, PacketizerConfig};
pub use connector::{ConnectorEvent, ConnectorFactory, RawTurn, StreamParams, TurnConnector};
pub use dispatcher::{TurnDecision, TurnDispatcher, TurnGate, TurnPermit, TurnState};
pub use error::VoiceError;
pub use packetizer::{run_ingest, Packetizer};
