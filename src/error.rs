use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("The selector you are trying to scrape for is invalid. Selector: {0}")]
    ParseInvalidSelector(String),

    #[error("Couldn't parse URL `{input}`: {source}")]
    UrlParse {
        input: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Episode reference has no `{param}` query parameter: {url}")]
    EpisodeParamMissing { url: String, param: &'static str },
    #[error("Episode parameter `{value}` is not a number: {url}")]
    EpisodeParamInvalid { url: String, value: String },
    #[error("Image source has no file name: {0}")]
    ImageWithoutName(String),

    #[error("Malformed header line (expected `Key: Value`): {0:?}")]
    HeaderLine(String),
    #[error("Invalid header name: {0}")]
    HeaderName(#[from] reqwest::header::InvalidHeaderName),
    #[error("Invalid header value: {0}")]
    HeaderValue(#[from] reqwest::header::InvalidHeaderValue),

    #[error("OCR failed for {path} (exit code {code:?}): {stderr}")]
    Ocr {
        path: PathBuf,
        code: Option<i32>,
        stderr: String,
    },
    #[error("Image directory {path} is not inside the image root {root}")]
    PathOutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Couldn't parse title list: {0}")]
    TitleList(#[from] toml::de::Error),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
}
