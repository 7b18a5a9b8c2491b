//! Interstitial event model: the resolved ad content and playback
//! restriction metadata handed back by the decision client.

use serde::Serialize;
use url::Url;

/// One ad asset: a playable URI and its duration in seconds.
///
/// Field names follow the asset list JSON contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Asset {
    #[serde(rename = "URI")]
    pub uri: Url,
    #[serde(rename = "DURATION")]
    pub duration: f64,
}

impl Asset {
    pub fn new(uri: Url, duration: f64) -> Self {
        Self { uri, duration }
    }
}

/// Asset list JSON body served for `X-ASSET-LIST` fetches:
/// `{"ASSETS": [{"URI": ..., "DURATION": ...}, ...]}`.
#[derive(Debug, Clone, Serialize)]
pub struct AssetListResponse {
    #[serde(rename = "ASSETS")]
    pub assets: Vec<Asset>,
}

/// How an event references its ad content.
#[derive(Debug, Clone, PartialEq)]
pub enum EventAssets {
    /// Served through the asset list endpoint (`X-ASSET-LIST`).
    List(Vec<Asset>),
    /// Referenced directly, one `X-ASSET-URI` tag per URI.
    Uris(Vec<Url>),
}

/// Where the interstitial is cued relative to joining/leaving the primary
/// asset. `NoCue` schedules purely by start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cue {
    #[default]
    NoCue,
    /// Play when joining playback (`CUE="PRE"`).
    Join,
    /// Play when leaving playback (`CUE="POST"`).
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snap {
    /// Transition out of primary content at the nearest segment boundary.
    pub snap_out: bool,
    /// Resume primary content at the nearest segment boundary.
    pub snap_in: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Restrictions {
    /// Seeking across the interstitial must first play it.
    pub jump: bool,
    /// No skipping forward while the interstitial plays.
    pub skip: bool,
}

/// Resolved ad content for one opportunity or pre-roll.
#[derive(Debug, Clone, PartialEq)]
pub struct InterstitialEvent {
    id: String,
    pub assets: EventAssets,
    /// Primary-timeline offset applied when resuming, in seconds.
    pub resume_offset: Option<f64>,
    /// Upper bound on interstitial playout, in seconds.
    pub playout_limit: Option<f64>,
    pub snap: Snap,
    pub restrictions: Restrictions,
    pub cue: Cue,
}

impl InterstitialEvent {
    /// Creates an event with a generated, session-unique id. The id is
    /// distinct from any opportunity id and names the event in synthesized
    /// tags and asset list URLs.
    pub fn new(assets: EventAssets) -> Self {
        Self {
            id: format!("{:016x}", rand::random::<u64>()),
            assets,
            resume_offset: None,
            playout_limit: None,
            snap: Snap::default(),
            restrictions: Restrictions::default(),
            cue: Cue::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Overrides the generated event id. Ids must be unique within a
    /// playback session.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_resume_offset(mut self, seconds: f64) -> Self {
        self.resume_offset = Some(seconds);
        self
    }

    pub fn with_playout_limit(mut self, seconds: f64) -> Self {
        self.playout_limit = Some(seconds);
        self
    }

    pub fn with_snap(mut self, snap: Snap) -> Self {
        self.snap = snap;
        self
    }

    pub fn with_restrictions(mut self, restrictions: Restrictions) -> Self {
        self.restrictions = restrictions;
        self
    }

    pub fn with_cue(mut self, cue: Cue) -> Self {
        self.cue = cue;
        self
    }

    /// The assets served for an asset list fetch, when this event uses the
    /// asset list reference style.
    pub fn asset_list(&self) -> Option<&[Asset]> {
        match &self.assets {
            EventAssets::List(assets) => Some(assets),
            EventAssets::Uris(_) => None,
        }
    }
}

/// An interstitial scheduled at an absolute offset from asset open. Used
/// once per session to pre-schedule VOD breaks; not tied to any in-manifest
/// opportunity id.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialEvent {
    pub event: InterstitialEvent,
    /// Offset from the start of the primary asset, in seconds.
    pub start_time: f64,
}

impl InitialEvent {
    pub fn new(event: InterstitialEvent, start_time: f64) -> Self {
        Self { event, start_time }
    }
}
