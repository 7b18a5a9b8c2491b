#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use sashiko::{
    Asset, Cue, DecisionHandler, DecisionRequest, DecisionResult, EventAssets, InitialDecisionRequest,
    InitialDecisionResult, InitialEvent, InterstitialEvent, OpportunityDescriptor,
};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub async fn mock(server: &MockServer, mock_path: &str, body: impl AsRef<str>) {
    Mock::given(method("GET"))
        .and(path(mock_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.as_ref()))
        .mount(server)
        .await;
}

pub fn list_event(id: &str, assets: &[(&str, f64)]) -> InterstitialEvent {
    InterstitialEvent::new(EventAssets::List(
        assets
            .iter()
            .map(|(uri, duration)| Asset::new(uri.parse().unwrap(), *duration))
            .collect(),
    ))
    .with_id(id)
}

pub fn uri_event(id: &str, uris: &[&str]) -> InterstitialEvent {
    InterstitialEvent::new(EventAssets::Uris(
        uris.iter().map(|uri| uri.parse().unwrap()).collect(),
    ))
    .with_id(id)
}

pub fn descriptor(id: &str, start_date: &str) -> OpportunityDescriptor {
    OpportunityDescriptor {
        id: id.to_string(),
        start_date: start_date.parse().unwrap(),
        class: None,
        end_date: None,
        duration: None,
        planned_duration: None,
        end_on_next: false,
        scte35_cmd: None,
        scte35_out: None,
        scte35_in: None,
        custom_attributes: HashMap::new(),
    }
}

pub enum Mode {
    /// Refuse every request; the engine treats this as cancellation.
    Decline,
    /// Answer synchronously from the configured event map.
    Resolve {
        events: HashMap<String, InterstitialEvent>,
        pre_rolls: Vec<InterstitialEvent>,
        initial_events: Vec<InitialEvent>,
    },
    /// Keep requests pending until the test finishes them.
    Hold,
}

/// Decision client test double: records every request it sees and answers
/// according to its mode.
pub struct RecordingHandler {
    mode: Mode,
    pub requests: Mutex<Vec<Vec<OpportunityDescriptor>>>,
    pub initial_calls: AtomicUsize,
    pub held: Mutex<Vec<DecisionRequest>>,
    pub held_initial: Mutex<Vec<InitialDecisionRequest>>,
}

impl RecordingHandler {
    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            requests: Mutex::new(Vec::new()),
            initial_calls: AtomicUsize::new(0),
            held: Mutex::new(Vec::new()),
            held_initial: Mutex::new(Vec::new()),
        }
    }

    pub fn declining() -> Self {
        Self::with_mode(Mode::Decline)
    }

    pub fn holding() -> Self {
        Self::with_mode(Mode::Hold)
    }

    pub fn resolving(events: &[(&str, InterstitialEvent)]) -> Self {
        Self::resolving_initial(events, Vec::new(), Vec::new())
    }

    pub fn resolving_initial(
        events: &[(&str, InterstitialEvent)],
        pre_rolls: Vec<InterstitialEvent>,
        initial_events: Vec<InitialEvent>,
    ) -> Self {
        Self::with_mode(Mode::Resolve {
            events: events
                .iter()
                .map(|(id, event)| (id.to_string(), event.clone()))
                .collect(),
            pre_rolls,
            initial_events,
        })
    }

    /// Total number of decision entry point invocations (initial included).
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// How many requests covered the given opportunity id.
    pub fn times_requested(&self, id: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|descriptors| descriptors.iter().any(|descriptor| descriptor.id == id))
            .count()
    }

    pub fn recorded_descriptor(&self, id: &str) -> Option<OpportunityDescriptor> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .find(|descriptor| descriptor.id == id)
            .cloned()
    }

    fn record(&self, descriptors: &[OpportunityDescriptor]) {
        self.requests.lock().unwrap().push(descriptors.to_vec());
    }

    fn decided_events(
        &self,
        descriptors: &[OpportunityDescriptor],
    ) -> HashMap<String, InterstitialEvent> {
        match &self.mode {
            Mode::Resolve { events, .. } => descriptors
                .iter()
                .filter_map(|descriptor| {
                    events
                        .get(&descriptor.id)
                        .map(|event| (descriptor.id.clone(), event.clone()))
                })
                .collect(),
            _ => HashMap::new(),
        }
    }
}

impl DecisionHandler for RecordingHandler {
    fn should_wait_for_decision(&self, request: DecisionRequest) -> bool {
        self.record(request.descriptors());
        match &self.mode {
            Mode::Decline => false,
            Mode::Resolve { .. } => {
                let events = self.decided_events(request.descriptors());
                request.finish(DecisionResult { events });
                true
            }
            Mode::Hold => {
                self.held.lock().unwrap().push(request);
                true
            }
        }
    }

    fn should_wait_for_initial_decision(&self, request: InitialDecisionRequest) -> bool {
        self.initial_calls.fetch_add(1, Ordering::SeqCst);
        self.record(request.descriptors());
        match &self.mode {
            Mode::Decline => false,
            Mode::Resolve {
                pre_rolls,
                initial_events,
                ..
            } => {
                let events = self.decided_events(request.descriptors());
                request.finish(InitialDecisionResult {
                    events,
                    pre_rolls: pre_rolls.clone(),
                    initial_events: initial_events.clone(),
                });
                true
            }
            Mode::Hold => {
                self.held_initial.lock().unwrap().push(request);
                true
            }
        }
    }
}

/// Polls until the handler holds `count` pending requests (normal plus
/// initial) or the timeout elapses.
pub async fn wait_for_held(handler: &RecordingHandler, count: usize) {
    for _ in 0..500 {
        let held =
            handler.held.lock().unwrap().len() + handler.held_initial.lock().unwrap().len();
        if held >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("timed out waiting for {count} held decision request(s)");
}

/// A pre-roll event must carry the join cue to survive re-keying.
pub fn pre_roll(id: &str, uri: &str) -> InterstitialEvent {
    uri_event(id, &[uri]).with_cue(Cue::Join)
}
