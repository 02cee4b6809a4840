//! Decides which recognizer turns become assistant turns.

use parley_types::TurnEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-session dispatch state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnState {
    /// Latest partial transcript since the previous final.
    pub partial: String,
    /// The last transcript handed to the orchestrator.
    pub last_dispatched: Option<String>,
}

/// Per-session mutual exclusion for orchestrator runs.
#[derive(Debug, Clone, Default)]
pub struct TurnGate {
    busy: Arc<AtomicBool>,
}

impl TurnGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the gate, or returns `None` if a turn is already running.
    pub fn try_acquire(&self) -> Option<TurnPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TurnPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof of an acquired [`TurnGate`]; the gate reopens when this drops.
#[derive(Debug)]
pub struct TurnPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for TurnPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub enum TurnDecision {
    /// Live caption for the client; no turn.
    Caption(String),
    /// Final too short to act on. The client gets an empty `end`.
    TooShort,
    /// Same transcript as the previous dispatch.
    Duplicate,
    /// Another turn holds the gate. The final is dropped.
    Busy,
    /// Run the orchestrator while holding `permit`.
    Run {
        transcript: String,
        permit: TurnPermit,
    },
    /// Empty partial.
    Ignored,
}

#[derive(Debug, Clone, Copy)]
pub struct TurnDispatcher {
    min_chars: usize,
}

impl TurnDispatcher {
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }

    pub fn dispatch(&self, state: &mut TurnState, gate: &TurnGate, event: TurnEvent) -> TurnDecision {
        if !event.is_final {
            if event.text.trim().is_empty() {
                return TurnDecision::Ignored;
            }
            state.partial.clone_from(&event.text);
            return TurnDecision::Caption(event.text);
        }

        let partial = std::mem::take(&mut state.partial);
        let transcript = if event.text.trim().is_empty() {
            partial
        } else {
            event.text
        };
        let transcript = transcript.trim();

        if transcript.chars().count() < self.min_chars {
            return TurnDecision::TooShort;
        }
        if state.last_dispatched.as_deref() == Some(transcript) {
            return TurnDecision::Duplicate;
        }

        match gate.try_acquire() {
            Some(permit) => {
                state.last_dispatched = Some(transcript.to_string());
                TurnDecision::Run {
                    transcript: transcript.to_string(),
                    permit,
                }
            }
            None => TurnDecision::Busy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> TurnDispatcher {
        TurnDispatcher::new(4)
    }

    fn expect_run(decision: TurnDecision) -> (String, TurnPermit) {
        match decision {
            TurnDecision::Run { transcript, permit } => (transcript, permit),
            other => panic!("expected Run, got {other:?}"),
        }
    }

    #[test]
    fn partials_only_caption() {
        let mut state = TurnState::default();
        let gate = TurnGate::new();
        let decision = dispatcher().dispatch(&mut state, &gate, TurnEvent::partial("what's the"));
        assert!(matches!(decision, TurnDecision::Caption(ref t) if t == "what's the"));
        assert_eq!(state.partial, "what's the");
        assert!(!gate.is_busy());

        let decision = dispatcher().dispatch(&mut state, &gate, TurnEvent::partial("  "));
        assert!(matches!(decision, TurnDecision::Ignored));
    }

    #[test]
    fn final_prefers_own_text_over_partial() {
        let mut state = TurnState::default();
        let gate = TurnGate::new();
        dispatcher().dispatch(&mut state, &gate, TurnEvent::partial("what's the wea"));
        let (transcript, _permit) = expect_run(dispatcher().dispatch(
            &mut state,
            &gate,
            TurnEvent::final_("What's the weather?"),
        ));
        assert_eq!(transcript, "What's the weather?");
        assert!(state.partial.is_empty());
    }

    #[test]
    fn empty_final_falls_back_to_partial() {
        let mut state = TurnState::default();
        let gate = TurnGate::new();
        dispatcher().dispatch(&mut state, &gate, TurnEvent::partial("turn on the lights"));
        let (transcript, _permit) =
            expect_run(dispatcher().dispatch(&mut state, &gate, TurnEvent::final_("")));
        assert_eq!(transcript, "turn on the lights");
    }

    #[test]
    fn short_finals_are_rejected() {
        let mut state = TurnState::default();
        let gate = TurnGate::new();
        let decision = dispatcher().dispatch(&mut state, &gate, TurnEvent::final_("ok "));
        assert!(matches!(decision, TurnDecision::TooShort));
        assert!(!gate.is_busy());
        assert!(state.last_dispatched.is_none());
    }

    #[test]
    fn identical_finals_dispatch_once() {
        let mut state = TurnState::default();
        let gate = TurnGate::new();
        let (_, permit) = expect_run(dispatcher().dispatch(
            &mut state,
            &gate,
            TurnEvent::final_("Call mom tomorrow"),
        ));
        drop(permit);

        let decision =
            dispatcher().dispatch(&mut state, &gate, TurnEvent::final_("Call mom tomorrow"));
        assert!(matches!(decision, TurnDecision::Duplicate));
    }

    #[test]
    fn busy_gate_drops_final_without_recording_it() {
        let mut state = TurnState::default();
        let gate = TurnGate::new();
        let (_, permit) =
            expect_run(dispatcher().dispatch(&mut state, &gate, TurnEvent::final_("first question")));

        let decision =
            dispatcher().dispatch(&mut state, &gate, TurnEvent::final_("second question"));
        assert!(matches!(decision, TurnDecision::Busy));
        assert_eq!(state.last_dispatched.as_deref(), Some("first question"));

        drop(permit);
        assert!(!gate.is_busy());
        let (transcript, _permit) =
            expect_run(dispatcher().dispatch(&mut state, &gate, TurnEvent::final_("second question")));
        assert_eq!(transcript, "second question");
    }

    #[test]
    fn permit_released_when_task_is_aborted() {
        let gate = TurnGate::new();
        let permit = gate.try_acquire().unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let handle = tokio::spawn(async move {
                let _permit = permit;
                std::future::pending::<()>().await;
            });
            tokio::task::yield_now().await;
            handle.abort();
            let _ = handle.await;
        });
        assert!(!gate.is_busy());
    }
}
