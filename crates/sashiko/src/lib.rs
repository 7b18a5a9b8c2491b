//! HLS interstitial stitching.
//!
//! `sashiko` intercepts manifest fetches for one playback session and
//! rewrites them on the fly to splice in dynamically decided interstitial
//! (ad) content:
//!
//! ```text
//!               ┌─────────┐   master   ┌───────────────────┐
//! marker URL ──►│ Fetcher ├───────────►│ URI rewrite       ├──► bytes
//!               │         │            │ (marker scheme)   │
//!               │         │   media    ├───────────────────┤
//!               │         ├───────────►│ Splicer           ├──► bytes
//!               └─────────┘            │   │               │
//!                                      │   ▼               │
//!                                      │ DecisionBroker ◄──┼──► decision
//!                                      └───────────────────┘    client
//! ```
//!
//! Opportunity tags (`EXT-X-DATERANGE`) are decided at most once per
//! session even when the same live manifest is re-fetched concurrently
//! across renditions; in-flight decisions are deduplicated and shared. A
//! failed or declined decision degrades to "no event" — it never breaks
//! primary playback.

pub mod decision;
pub mod error;
pub mod event;
pub mod fetch;
mod loader;
pub mod opportunity;
pub mod playlist;
pub mod scheme;
pub mod scte35;
pub mod util;

pub use decision::{
    DecisionBroker, DecisionHandler, DecisionRequest, DecisionResult, InitialDecisionRequest,
    InitialDecisionResult, ResolvedEvents,
};
pub use error::{SashikoError, SashikoResult};
pub use event::{
    Asset, AssetListResponse, Cue, EventAssets, InitialEvent, InterstitialEvent, Restrictions,
    Snap,
};
pub use loader::PlaylistLoader;
pub use m3u8_rs;
pub use opportunity::{CustomAttributeValue, OpportunityDescriptor};
pub use scheme::InterstitialUrl;
pub use util::http::HttpClient;
