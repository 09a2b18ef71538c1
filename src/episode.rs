use url::Url;

use crate::{Error, Result, EPISODE_PARAM};

pub fn parse_url(input: &str) -> Result<Url> {
    Url::parse(input).map_err(|source| Error::UrlParse {
        input: input.to_string(),
        source,
    })
}

/// Reads the episode number out of an episode reference (`...detail?titleId=1&no=30` -> 30).
pub fn episode_number(page: &Url) -> Result<u32> {
    let value = page
        .query_pairs()
        .find(|(key, _)| key == EPISODE_PARAM)
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| Error::EpisodeParamMissing {
            url: page.to_string(),
            param: EPISODE_PARAM,
        })?;
    value.parse().map_err(|_| Error::EpisodeParamInvalid {
        url: page.to_string(),
        value,
    })
}

/// Returns a copy of `page` pointing at episode `no`. Every other query pair keeps its position.
pub fn with_episode(page: &Url, no: u32) -> Url {
    let pairs: Vec<(String, String)> = page
        .query_pairs()
        .map(|(key, value)| {
            if key == EPISODE_PARAM {
                (key.into_owned(), no.to_string())
            } else {
                (key.into_owned(), value.into_owned())
            }
        })
        .collect();

    let mut episode = page.clone();
    episode.query_pairs_mut().clear().extend_pairs(pairs);
    episode
}

/// Enumerates the pages of episodes `1..=N`, where `N` is the episode of `latest_page`.
pub fn episode_pages(latest_page: &str) -> Result<Vec<Url>> {
    let latest = parse_url(latest_page)?;
    let last = episode_number(&latest)?;
    Ok((1..=last).map(|no| with_episode(&latest, no)).collect())
}
