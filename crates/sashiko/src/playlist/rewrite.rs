//! Playlist classification and URI rewriting.
//!
//! Master playlists have every nested manifest reference moved to the
//! marker scheme so that child fetches are intercepted too. Media playlists
//! get the opposite treatment: segment data must remain directly fetchable
//! by the playback engine, so their URIs are resolved to absolute
//! real-scheme URLs.

use m3u8_rs::{MasterPlaylist, MediaPlaylist, Playlist};
use url::Url;

use crate::{
    error::{SashikoError, SashikoResult},
    scheme::InterstitialUrl,
};

pub enum ClassifiedPlaylist {
    Master(MasterPlaylist),
    Media(MediaPlaylist),
    /// The parser cannot classify the bytes. The original bytes pass
    /// through unchanged; structure is never fabricated.
    Unknown,
}

pub fn classify(bytes: &[u8]) -> SashikoResult<ClassifiedPlaylist> {
    // Every HLS playlist starts with #EXTM3U; anything else is not ours to
    // interpret.
    if !bytes.starts_with(b"#EXTM3U") {
        return Ok(ClassifiedPlaylist::Unknown);
    }
    match m3u8_rs::parse_playlist_res(bytes) {
        Ok(Playlist::MasterPlaylist(playlist)) => Ok(ClassifiedPlaylist::Master(playlist)),
        Ok(Playlist::MediaPlaylist(playlist)) => Ok(ClassifiedPlaylist::Media(playlist)),
        Err(error) => Err(SashikoError::PlaylistParseError(error.to_string())),
    }
}

/// Rewrites every nested manifest URI (variant streams, trick-play i-frame
/// streams, alternative renditions) to an absolute marker-scheme URL.
pub fn rewrite_master_urls(playlist: &mut MasterPlaylist, playlist_url: &Url) {
    for variant in &mut playlist.variants {
        variant.uri = to_marker(&variant.uri, playlist_url);
    }
    for alternative in &mut playlist.alternatives {
        if let Some(uri) = &alternative.uri {
            alternative.uri = Some(to_marker(uri, playlist_url));
        }
    }
}

/// Rewrites segment, initialization-section and key URIs to absolute
/// real-scheme URLs.
pub fn rewrite_media_urls(playlist: &mut MediaPlaylist, playlist_url: &Url) {
    for segment in &mut playlist.segments {
        segment.uri = to_real(&segment.uri, playlist_url);
        if let Some(map) = &mut segment.map {
            map.uri = to_real(&map.uri, playlist_url);
        }
        if let Some(key) = &mut segment.key {
            if let Some(uri) = &key.uri {
                key.uri = Some(to_real(uri, playlist_url));
            }
        }
    }
}

fn to_marker(uri: &str, playlist_url: &Url) -> String {
    convert(uri, playlist_url, |url| url.to_interstitial_url())
}

fn to_real(uri: &str, playlist_url: &Url) -> String {
    convert(uri, playlist_url, |url| url.from_interstitial_url())
}

fn convert(uri: &str, playlist_url: &Url, direction: impl Fn(&Url) -> Url) -> String {
    match playlist_url.join(uri) {
        Ok(absolute) => direction(&absolute).to_string(),
        Err(error) => {
            log::warn!("Leaving unresolvable URI {uri:?} untouched: {error}");
            uri.to_string()
        }
    }
}
