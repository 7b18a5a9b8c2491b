//! The interstitial splicer: turns decided ad events into daterange tags
//! inside a media playlist.

use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use chrono::{DateTime, Duration, FixedOffset, Utc};
use m3u8_rs::{ExtTag, MediaPlaylist, MediaPlaylistType};

use crate::{
    decision::DecisionBroker,
    event::InitialEvent,
    opportunity::OpportunityDescriptor,
    playlist::tags::{daterange_tags, INTERSTITIAL_CLASS},
};

/// Fixed anchor used when a VOD playlist carries no absolute time of its
/// own.
fn epoch() -> DateTime<FixedOffset> {
    DateTime::<Utc>::UNIX_EPOCH.fixed_offset()
}

/// Splices decided interstitial events into a media playlist.
///
/// Extracts ad opportunities, resolves them through the broker (which
/// deduplicates against everything already decided or in flight), and
/// attaches synthesized daterange tags:
///
/// - one-time VOD events at `epoch + start_time` behind a synthesized
///   program-date-time anchor, skipped entirely when the playlist already
///   carries an absolute time;
/// - pre-rolls at epoch 0 on the first playable segment;
/// - per-opportunity events immediately after the opportunity tag that
///   produced them, anchored at its start date.
///
/// Insertions are applied in descending segment-index order (stable within
/// one segment), so output tag order is deterministic for identical inputs
/// and identical decisions.
pub async fn splice_media_playlist(
    broker: &DecisionBroker,
    playlist: &mut MediaPlaylist,
    session_initial_events: &[InitialEvent],
) {
    let (order, by_id) = extract_opportunities(playlist);

    let descriptors = order
        .iter()
        .filter_map(|id| by_id.get(id).map(|(_, descriptor)| descriptor.clone()))
        .collect();
    let resolved = broker
        .resolve(descriptors, Arc::new(playlist.clone()))
        .await;

    let mut insertions: Vec<(usize, ExtTag)> = Vec::new();
    let mut vod_anchor = None;

    // One-time VOD injection. A playlist that already carries an absolute
    // time anchor is left alone (cross-rendition anchor mismatches are out
    // of scope).
    let is_vod = matches!(playlist.playlist_type, Some(MediaPlaylistType::Vod));
    let has_program_date_time = playlist
        .segments
        .iter()
        .any(|segment| segment.program_date_time.is_some());
    if is_vod && !has_program_date_time && !playlist.segments.is_empty() {
        vod_anchor = Some(epoch());
        let initial_events = session_initial_events
            .iter()
            .chain(resolved.initial_events.iter());
        for initial in initial_events {
            let offset = Duration::milliseconds((initial.start_time * 1000.0).round() as i64);
            for tag in daterange_tags(&initial.event, epoch() + offset) {
                insertions.push((0, tag));
            }
        }
    }

    // Pre-rolls play before any content, independent of the manifest's own
    // timestamps.
    if !playlist.segments.is_empty() {
        for event in &resolved.pre_rolls {
            for tag in daterange_tags(event, epoch()) {
                insertions.push((0, tag));
            }
        }
    }

    // Per-opportunity events, anchored at the original tag's start date.
    for id in &order {
        let Some(event) = resolved.id_to_event.get(id) else {
            continue;
        };
        let Some((index, descriptor)) = by_id.get(id) else {
            continue;
        };
        for tag in daterange_tags(event, descriptor.start_date) {
            insertions.push((*index, tag));
        }
    }

    // Descending index order; the sort is stable, so tags attached to the
    // same segment keep their step order.
    insertions.sort_by(|a, b| b.0.cmp(&a.0));
    for (index, tag) in insertions {
        playlist.segments[index].unknown_tags.push(tag);
    }
    if let Some(anchor) = vod_anchor {
        playlist.segments[0].program_date_time = Some(anchor);
    }
}

/// Collects ad opportunity descriptors from a media playlist in tag order,
/// merging duplicates that share an id. Dateranges that already carry the
/// interstitial class are this pipeline's own output and are not
/// opportunities.
fn extract_opportunities(
    playlist: &MediaPlaylist,
) -> (Vec<String>, HashMap<String, (usize, OpportunityDescriptor)>) {
    let mut order = Vec::new();
    let mut by_id: HashMap<String, (usize, OpportunityDescriptor)> = HashMap::new();

    for (index, segment) in playlist.segments.iter().enumerate() {
        let Some(daterange) = &segment.daterange else {
            continue;
        };
        if daterange.class.as_deref() == Some(INTERSTITIAL_CLASS) {
            continue;
        }
        let descriptor = OpportunityDescriptor::from_daterange(daterange);
        match by_id.entry(descriptor.id.clone()) {
            Entry::Occupied(mut entry) => entry.get_mut().1.merge(&descriptor),
            Entry::Vacant(entry) => {
                order.push(descriptor.id.clone());
                entry.insert((index, descriptor));
            }
        }
    }

    (order, by_id)
}
