use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum SashikoError {
    #[error("request for {url} failed (status: {status:?})")]
    RequestError {
        url: Url,
        status: Option<StatusCode>,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected empty response (status: {status:?}) from {url}")]
    UnexpectedEmptyResponse {
        url: Url,
        status: Option<StatusCode>,
    },

    #[error("invalid playlist: {0}")]
    PlaylistParseError(String),

    #[error("media playlist {0} loaded before its master playlist")]
    MediaBeforeMaster(Url),

    #[error("invalid splice info section: {0}")]
    Scte35ParseError(String),

    #[error("no asset list available for interstitial event {0}")]
    AssetListUnavailable(String),

    #[error("not an asset list URL: {0}")]
    NotAnAssetListUrl(Url),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    HexDecodeError(#[from] hex::FromHexError),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

pub type SashikoResult<T> = Result<T, SashikoError>;
