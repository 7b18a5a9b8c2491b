//! Synthesis of interstitial `EXT-X-DATERANGE` tags.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use m3u8_rs::ExtTag;

use crate::{
    event::{Cue, EventAssets, InterstitialEvent},
    scheme,
};

/// `CLASS` attribute marking a daterange as interstitial ad content.
pub const INTERSTITIAL_CLASS: &str = "com.apple.hls.interstitial";

/// Encodes a resolved event as daterange tags anchored at the given time:
/// one tag referencing the asset list endpoint, or one tag per asset URI
/// when the event carries bare URIs. Attributes with absent or default
/// values are omitted.
pub fn daterange_tags(event: &InterstitialEvent, anchor: DateTime<FixedOffset>) -> Vec<ExtTag> {
    match &event.assets {
        EventAssets::List(_) => {
            let asset_list = scheme::asset_list_url(event.id());
            vec![interstitial_tag(
                event.id(),
                anchor,
                format!("X-ASSET-LIST=\"{asset_list}\""),
                event,
            )]
        }
        EventAssets::Uris(uris) => uris
            .iter()
            .enumerate()
            .map(|(index, uri)| {
                let id = if uris.len() == 1 {
                    event.id().to_string()
                } else {
                    format!("{}-{}", event.id(), index)
                };
                interstitial_tag(&id, anchor, format!("X-ASSET-URI=\"{uri}\""), event)
            })
            .collect(),
    }
}

fn interstitial_tag(
    id: &str,
    anchor: DateTime<FixedOffset>,
    asset_attribute: String,
    event: &InterstitialEvent,
) -> ExtTag {
    let start_date = anchor.to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut attributes = vec![
        format!("ID=\"{id}\""),
        format!("CLASS=\"{INTERSTITIAL_CLASS}\""),
        format!("START-DATE=\"{start_date}\""),
        asset_attribute,
    ];

    if let Some(offset) = event.resume_offset {
        attributes.push(format!("X-RESUME-OFFSET={offset}"));
    }
    if let Some(limit) = event.playout_limit {
        attributes.push(format!("X-PLAYOUT-LIMIT={limit}"));
    }
    if event.snap.snap_out || event.snap.snap_in {
        attributes.push(format!("X-SNAP=\"{}\"", flag_list(event.snap.snap_out, "OUT", event.snap.snap_in, "IN")));
    }
    if event.restrictions.skip || event.restrictions.jump {
        attributes.push(format!(
            "X-RESTRICT=\"{}\"",
            flag_list(event.restrictions.skip, "SKIP", event.restrictions.jump, "JUMP")
        ));
    }
    match event.cue {
        Cue::NoCue => {}
        Cue::Join => attributes.push("CUE=\"PRE\"".to_string()),
        Cue::Leave => attributes.push("CUE=\"POST\"".to_string()),
    }

    ExtTag {
        tag: "X-DATERANGE".to_string(),
        rest: Some(attributes.join(",")),
    }
}

fn flag_list(first: bool, first_name: &str, second: bool, second_name: &str) -> String {
    match (first, second) {
        (true, true) => format!("{first_name},{second_name}"),
        (true, false) => first_name.to_string(),
        (false, true) => second_name.to_string(),
        (false, false) => String::new(),
    }
}
