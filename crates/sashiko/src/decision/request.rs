//! The request/response protocol between the decisioning engine and the
//! external decision client.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use m3u8_rs::MediaPlaylist;
use tokio::sync::oneshot;

use crate::{
    event::{Cue, InitialEvent, InterstitialEvent},
    opportunity::OpportunityDescriptor,
};

/// The external ad decision client.
///
/// Both entry points are synchronous: returning `true` commits the client to
/// eventually calling `finish` or `cancel` on the request; returning `false`
/// is treated as an immediate cancellation. The engine suspends until the
/// request reaches a terminal state — no internal timeout is enforced.
pub trait DecisionHandler: Send + Sync + 'static {
    fn should_wait_for_decision(&self, request: DecisionRequest) -> bool;

    fn should_wait_for_initial_decision(&self, request: InitialDecisionRequest) -> bool;
}

/// Events decided by the client, keyed by opportunity id. Ids missing from
/// the map are treated as "no event".
#[derive(Debug, Default)]
pub struct DecisionResult {
    pub events: HashMap<String, InterstitialEvent>,
}

/// Result of the one-time initial decision: per-opportunity events plus
/// pre-rolls and VOD-wide pre-scheduled events.
#[derive(Debug, Default)]
pub struct InitialDecisionResult {
    pub events: HashMap<String, InterstitialEvent>,
    pub pre_rolls: Vec<InterstitialEvent>,
    pub initial_events: Vec<InitialEvent>,
}

#[derive(Debug)]
pub(crate) enum DecisionOutcome {
    Finished {
        events: HashMap<String, InterstitialEvent>,
        pre_rolls: Vec<InterstitialEvent>,
        initial_events: Vec<InitialEvent>,
    },
    Cancelled,
}

enum RequestState {
    Pending(oneshot::Sender<DecisionOutcome>),
    Finished,
    Cancelled,
}

struct RequestInner {
    descriptors: Vec<OpportunityDescriptor>,
    state: Mutex<RequestState>,
}

/// A pending ad decision covering one or more opportunity descriptors.
///
/// Cheap to clone; all clones share the lifecycle. `Pending → {Finished |
/// Cancelled}` transitions are terminal and idempotent: whichever of
/// [`finish`](Self::finish) and [`cancel`](Self::cancel) happens first wins,
/// later calls are no-ops.
#[derive(Clone)]
pub struct DecisionRequest {
    inner: Arc<RequestInner>,
}

impl DecisionRequest {
    pub(crate) fn new(
        descriptors: Vec<OpportunityDescriptor>,
    ) -> (Self, oneshot::Receiver<DecisionOutcome>) {
        let (sender, receiver) = oneshot::channel();
        let request = Self {
            inner: Arc::new(RequestInner {
                descriptors,
                state: Mutex::new(RequestState::Pending(sender)),
            }),
        };
        (request, receiver)
    }

    /// The descriptors awaiting a decision, merged across all fetches that
    /// observed them.
    pub fn descriptors(&self) -> &[OpportunityDescriptor] {
        &self.inner.descriptors
    }

    pub fn is_finished(&self) -> bool {
        matches!(*self.inner.state.lock().unwrap(), RequestState::Finished)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(*self.inner.state.lock().unwrap(), RequestState::Cancelled)
    }

    /// Completes the request with the client's decision. The result is
    /// re-keyed against the requested ids: entries for ids that were never
    /// requested are dropped, and requested ids without an entry degrade to
    /// "no event".
    pub fn finish(&self, result: DecisionResult) {
        self.complete(
            RequestState::Finished,
            DecisionOutcome::Finished {
                events: self.rekey(result.events),
                pre_rolls: Vec::new(),
                initial_events: Vec::new(),
            },
        );
    }

    /// Cancels the request: every covered id degrades to "no event".
    pub fn cancel(&self) {
        self.complete(RequestState::Cancelled, DecisionOutcome::Cancelled);
    }

    fn rekey(
        &self,
        mut events: HashMap<String, InterstitialEvent>,
    ) -> HashMap<String, InterstitialEvent> {
        let requested: HashSet<&str> = self
            .inner
            .descriptors
            .iter()
            .map(|descriptor| descriptor.id.as_str())
            .collect();
        events.retain(|id, _| requested.contains(id.as_str()));
        events
    }

    fn complete(&self, next: RequestState, outcome: DecisionOutcome) {
        let mut state = self.inner.state.lock().unwrap();
        match std::mem::replace(&mut *state, next) {
            RequestState::Pending(sender) => {
                // The engine may have stopped listening; the transition still
                // counts.
                let _ = sender.send(outcome);
            }
            terminal => *state = terminal,
        }
    }
}

/// The one-time initial decision request. In addition to any opportunity
/// descriptors it exposes the media playlist that triggered decisioning as
/// read-only context, and its result may carry pre-rolls and pre-scheduled
/// VOD events.
#[derive(Clone)]
pub struct InitialDecisionRequest {
    request: DecisionRequest,
    playlist: Arc<MediaPlaylist>,
}

impl InitialDecisionRequest {
    pub(crate) fn new(request: DecisionRequest, playlist: Arc<MediaPlaylist>) -> Self {
        Self { request, playlist }
    }

    pub fn descriptors(&self) -> &[OpportunityDescriptor] {
        self.request.descriptors()
    }

    /// The media playlist this decision was triggered by.
    pub fn playlist(&self) -> &MediaPlaylist {
        &self.playlist
    }

    pub fn is_finished(&self) -> bool {
        self.request.is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        self.request.is_cancelled()
    }

    /// Completes the initial request. Per-opportunity events are re-keyed
    /// like any other decision; only events cued for join are retained as
    /// pre-rolls.
    pub fn finish(&self, result: InitialDecisionResult) {
        let mut pre_rolls = result.pre_rolls;
        pre_rolls.retain(|event| event.cue == Cue::Join);
        self.request.complete(
            RequestState::Finished,
            DecisionOutcome::Finished {
                events: self.request.rekey(result.events),
                pre_rolls,
                initial_events: result.initial_events,
            },
        );
    }

    pub fn cancel(&self) {
        self.request.cancel();
    }
}
