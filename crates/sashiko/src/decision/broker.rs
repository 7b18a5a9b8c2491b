//! Deduplicating, caching core of the ad decisioning engine.
//!
//! Concurrent resolution calls are inevitable: every rendition of a live
//! stream re-fetches the same media playlist, usually in parallel. The
//! broker collapses overlapping calls into the minimum number of round
//! trips to the decision client while every caller observes a monotonically
//! growing cache. All state lives behind one mutex whose lock is never held
//! across an await; in-flight work is represented by shared completion
//! futures so any number of callers can await the same decision task.

use std::{
    collections::{hash_map::Entry, HashMap, HashSet},
    sync::{Arc, Mutex},
};

use futures::{future::BoxFuture, future::Shared, FutureExt};
use m3u8_rs::MediaPlaylist;
use tokio::sync::oneshot;

use crate::{
    decision::{
        request::{DecisionHandler, DecisionRequest, InitialDecisionRequest},
        DecisionOutcome,
    },
    event::{InitialEvent, InterstitialEvent},
    opportunity::OpportunityDescriptor,
};

type TaskDone = Shared<BoxFuture<'static, ()>>;

/// Accumulated decisioning state returned to the splicer.
#[derive(Debug, Clone, Default)]
pub struct ResolvedEvents {
    /// Opportunity id → resolved event.
    pub id_to_event: HashMap<String, InterstitialEvent>,
    /// Ids explicitly decided to carry no event.
    pub empty_ids: HashSet<String>,
    /// Pre-roll events from the completed initial decision.
    pub pre_rolls: Vec<InterstitialEvent>,
    /// One-time VOD events from the completed initial decision. Empty until
    /// the initial decision completes.
    pub initial_events: Vec<InitialEvent>,
}

enum InitialState {
    NotStarted,
    InProgress,
    Completed {
        pre_rolls: Vec<InterstitialEvent>,
        initial_events: Vec<InitialEvent>,
    },
}

struct BrokerInner {
    id_to_event: HashMap<String, InterstitialEvent>,
    empty_ids: HashSet<String>,
    /// Merged descriptors for ids that are not decided yet.
    tracked: HashMap<String, OpportunityDescriptor>,
    /// One in-flight decision task per undecided id.
    active: HashMap<String, TaskDone>,
    initial: InitialState,
    /// Event id → opportunity id, for the out-of-band asset list lookup.
    event_index: HashMap<String, String>,
}

impl BrokerInner {
    fn is_decided(&self, id: &str) -> bool {
        self.id_to_event.contains_key(id) || self.empty_ids.contains(id)
    }

    fn snapshot(&self) -> ResolvedEvents {
        let (pre_rolls, initial_events) = match &self.initial {
            InitialState::Completed {
                pre_rolls,
                initial_events,
            } => (pre_rolls.clone(), initial_events.clone()),
            _ => (Vec::new(), Vec::new()),
        };
        ResolvedEvents {
            id_to_event: self.id_to_event.clone(),
            empty_ids: self.empty_ids.clone(),
            pre_rolls,
            initial_events,
        }
    }
}

pub struct DecisionBroker {
    handler: Arc<dyn DecisionHandler>,
    inner: Arc<Mutex<BrokerInner>>,
}

impl DecisionBroker {
    pub fn new(handler: Arc<dyn DecisionHandler>) -> Self {
        Self {
            handler,
            inner: Arc::new(Mutex::new(BrokerInner {
                id_to_event: HashMap::new(),
                empty_ids: HashSet::new(),
                tracked: HashMap::new(),
                active: HashMap::new(),
                initial: InitialState::NotStarted,
                event_index: HashMap::new(),
            })),
        }
    }

    /// Resolves the given opportunity descriptors, reusing cached decisions
    /// and in-flight tasks wherever possible. Each undecided id is covered
    /// by exactly one decision task; the very first call additionally runs
    /// the one-time initial decision (even with no descriptors at all).
    ///
    /// Never fails: declined or cancelled decisions degrade to "no event".
    pub async fn resolve(
        &self,
        descriptors: Vec<OpportunityDescriptor>,
        playlist: Arc<MediaPlaylist>,
    ) -> ResolvedEvents {
        let tasks = {
            let mut inner = self.inner.lock().unwrap();
            let is_initial = matches!(inner.initial, InitialState::NotStarted);

            // Requested ids in manifest order, merged into the tracked set.
            let mut requested = Vec::new();
            for descriptor in descriptors {
                if inner.is_decided(&descriptor.id) {
                    continue;
                }
                if !requested.iter().any(|id| id == &descriptor.id) {
                    requested.push(descriptor.id.clone());
                }
                match inner.tracked.entry(descriptor.id.clone()) {
                    Entry::Occupied(mut entry) => entry.get_mut().merge(&descriptor),
                    Entry::Vacant(entry) => {
                        entry.insert(descriptor);
                    }
                }
            }

            // Ids still pending from earlier fetches ride along, so every
            // caller settles against everything in flight, not just the ids
            // its own manifest mentions.
            let pending: Vec<String> = inner
                .active
                .keys()
                .filter(|id| !requested.iter().any(|requested_id| requested_id == *id))
                .cloned()
                .collect();
            requested.extend(pending);

            if !is_initial
                && requested.is_empty()
                && matches!(inner.initial, InitialState::Completed { .. })
            {
                return inner.snapshot();
            }

            let mut tasks: Vec<TaskDone> = Vec::new();
            let mut needs_decision = Vec::new();
            for id in &requested {
                if let Some(task) = inner.active.get(id) {
                    if !tasks.iter().any(|known| known.ptr_eq(task)) {
                        tasks.push(task.clone());
                    }
                } else if let Some(descriptor) = inner.tracked.get(id) {
                    needs_decision.push(descriptor.clone());
                }
            }

            if !needs_decision.is_empty() || is_initial {
                tasks.push(self.spawn_decision(
                    &mut inner,
                    needs_decision,
                    is_initial,
                    playlist,
                ));
            }
            tasks
        };

        for task in tasks {
            task.await;
        }
        self.inner.lock().unwrap().snapshot()
    }

    /// Looks up a resolved event by its own event id (not the opportunity
    /// id), for out-of-band asset resolution. Falls back to scanning the
    /// completed pre-roll and initial collections.
    pub fn event_for_event_id(&self, event_id: &str) -> Option<InterstitialEvent> {
        let inner = self.inner.lock().unwrap();
        if let Some(event) = inner
            .event_index
            .get(event_id)
            .and_then(|opportunity_id| inner.id_to_event.get(opportunity_id))
        {
            return Some(event.clone());
        }
        match &inner.initial {
            InitialState::Completed {
                pre_rolls,
                initial_events,
            } => pre_rolls
                .iter()
                .find(|event| event.id() == event_id)
                .cloned()
                .or_else(|| {
                    initial_events
                        .iter()
                        .find(|initial| initial.event.id() == event_id)
                        .map(|initial| initial.event.clone())
                }),
            _ => None,
        }
    }

    fn spawn_decision(
        &self,
        inner: &mut BrokerInner,
        descriptors: Vec<OpportunityDescriptor>,
        is_initial: bool,
        playlist: Arc<MediaPlaylist>,
    ) -> TaskDone {
        let (done_sender, done_receiver) = oneshot::channel::<()>();
        let task: TaskDone = done_receiver.map(|_| ()).boxed().shared();

        for descriptor in &descriptors {
            inner.active.insert(descriptor.id.clone(), task.clone());
        }
        if is_initial {
            inner.initial = InitialState::InProgress;
        }

        let ids: Vec<String> = descriptors
            .iter()
            .map(|descriptor| descriptor.id.clone())
            .collect();
        let handler = self.handler.clone();
        let state = self.inner.clone();
        tokio::spawn(async move {
            let outcome = run_decision(handler, descriptors, is_initial, playlist).await;
            apply_outcome(&state, &ids, is_initial, outcome);
            let _ = done_sender.send(());
        });

        task
    }
}

async fn run_decision(
    handler: Arc<dyn DecisionHandler>,
    descriptors: Vec<OpportunityDescriptor>,
    is_initial: bool,
    playlist: Arc<MediaPlaylist>,
) -> DecisionOutcome {
    if descriptors.is_empty() && !is_initial {
        return DecisionOutcome::Finished {
            events: HashMap::new(),
            pre_rolls: Vec::new(),
            initial_events: Vec::new(),
        };
    }

    let (request, receiver) = DecisionRequest::new(descriptors);
    let committed = if is_initial {
        handler.should_wait_for_initial_decision(InitialDecisionRequest::new(
            request.clone(),
            playlist,
        ))
    } else {
        handler.should_wait_for_decision(request.clone())
    };
    if !committed {
        tracing::debug!("Decision handler declined the request, cancelling");
        request.cancel();
    }

    receiver.await.unwrap_or(DecisionOutcome::Cancelled)
}

fn apply_outcome(
    state: &Arc<Mutex<BrokerInner>>,
    ids: &[String],
    is_initial: bool,
    outcome: DecisionOutcome,
) {
    let mut inner = state.lock().unwrap();
    match outcome {
        DecisionOutcome::Finished {
            events,
            pre_rolls,
            initial_events,
        } => {
            for id in ids {
                match events.get(id) {
                    Some(event) => {
                        inner
                            .event_index
                            .insert(event.id().to_string(), id.clone());
                        inner.id_to_event.insert(id.clone(), event.clone());
                    }
                    None => {
                        inner.empty_ids.insert(id.clone());
                    }
                }
            }
            if is_initial {
                inner.initial = InitialState::Completed {
                    pre_rolls,
                    initial_events,
                };
            }
        }
        DecisionOutcome::Cancelled => {
            for id in ids {
                inner.empty_ids.insert(id.clone());
            }
            if is_initial {
                inner.initial = InitialState::Completed {
                    pre_rolls: Vec::new(),
                    initial_events: Vec::new(),
                };
            }
        }
    }
    for id in ids {
        inner.active.remove(id);
        inner.tracked.remove(id);
    }
}
