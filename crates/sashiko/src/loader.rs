use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use bytes::Bytes;
use url::Url;

use crate::{
    decision::{DecisionBroker, DecisionHandler},
    error::{SashikoError, SashikoResult},
    event::{AssetListResponse, InitialEvent},
    fetch::PlaylistFetcher,
    playlist::{
        classify, rewrite_master_urls, rewrite_media_urls, splice_media_playlist,
        ClassifiedPlaylist,
    },
    scheme::InterstitialUrl,
    util::http::HttpClient,
};

/// The interception entry point for one playback session.
///
/// Given a marker-scheme manifest URL it returns the rewritten manifest
/// bytes; given an asset list URL it returns the JSON asset list for the
/// event named by the URL's query parameter. One loader owns one
/// [`DecisionBroker`], so decisions are shared across every rendition the
/// player fetches through it.
pub struct PlaylistLoader {
    fetcher: PlaylistFetcher,
    broker: Arc<DecisionBroker>,
    initial_events: Vec<InitialEvent>,
    master_seen: AtomicBool,
}

impl PlaylistLoader {
    pub fn new(handler: Arc<dyn DecisionHandler>) -> Self {
        Self::with_client(handler, HttpClient::default())
    }

    pub fn with_client(handler: Arc<dyn DecisionHandler>, client: HttpClient) -> Self {
        Self {
            fetcher: PlaylistFetcher::new(client),
            broker: Arc::new(DecisionBroker::new(handler)),
            initial_events: Vec::new(),
            master_seen: AtomicBool::new(false),
        }
    }

    /// Pre-schedules interstitials for this session, in addition to any the
    /// decision client supplies with its initial decision. Injected into
    /// VOD playlists together with (ahead of) the client-decided ones.
    pub fn with_initial_events(mut self, events: Vec<InitialEvent>) -> Self {
        self.initial_events = events;
        self
    }

    pub fn broker(&self) -> &Arc<DecisionBroker> {
        &self.broker
    }

    /// Fetches and rewrites one manifest. Accepts marker- or real-scheme
    /// URLs; the fetch always goes out on the real scheme.
    ///
    /// Master playlists get their nested URIs moved to the marker scheme;
    /// media playlists are spliced and their URIs resolved back to the real
    /// scheme; unclassifiable bytes pass through unchanged.
    pub async fn load_playlist(&self, url: &Url) -> SashikoResult<Bytes> {
        let real_url = url.from_interstitial_url();
        tracing::debug!("Loading playlist {real_url}");
        let bytes = self.fetcher.fetch(&real_url).await?;

        match classify(&bytes)? {
            ClassifiedPlaylist::Unknown => Ok(bytes),
            ClassifiedPlaylist::Master(mut playlist) => {
                self.master_seen.store(true, Ordering::SeqCst);
                rewrite_master_urls(&mut playlist, &real_url);
                let mut output = Vec::new();
                playlist.write_to(&mut output)?;
                Ok(Bytes::from(output))
            }
            ClassifiedPlaylist::Media(mut playlist) => {
                // A media playlist with no preceding master is a
                // caller-sequencing bug, not a recoverable condition.
                if !self.master_seen.load(Ordering::SeqCst) {
                    return Err(SashikoError::MediaBeforeMaster(real_url));
                }
                splice_media_playlist(&self.broker, &mut playlist, &self.initial_events).await;
                rewrite_media_urls(&mut playlist, &real_url);
                let mut output = Vec::new();
                playlist.write_to(&mut output)?;
                Ok(Bytes::from(output))
            }
        }
    }

    /// Serves the asset list JSON for an `X-ASSET-LIST` fetch:
    /// `{"ASSETS": [{"URI": ..., "DURATION": ...}, ...]}`.
    pub async fn load_asset_list(&self, url: &Url) -> SashikoResult<Bytes> {
        let event_id = url
            .is_asset_list_url()
            .then(|| url.interstitial_event_id())
            .flatten()
            .ok_or_else(|| SashikoError::NotAnAssetListUrl(url.clone()))?;

        let assets = self
            .broker
            .event_for_event_id(&event_id)
            .and_then(|event| event.asset_list().map(<[_]>::to_vec))
            .ok_or(SashikoError::AssetListUnavailable(event_id))?;

        let body = serde_json::to_vec(&AssetListResponse { assets })?;
        Ok(Bytes::from(body))
    }
}
