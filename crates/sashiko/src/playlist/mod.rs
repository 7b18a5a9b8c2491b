mod rewrite;
mod splice;
mod tags;

pub use rewrite::{classify, rewrite_master_urls, rewrite_media_urls, ClassifiedPlaylist};
pub use splice::splice_media_playlist;
pub use tags::{daterange_tags, INTERSTITIAL_CLASS};
