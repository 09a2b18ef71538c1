use scraper::{Html, Selector};
use tokio::task::spawn_blocking;

use crate::{Error, Result, VIEWER_IMAGE_SELECTOR};

/// Attempts to parse the episode page, extracting the `src` of every image inside the viewer.
/// Sources are returned in document order, unresolved. Images without a `src` are skipped.
pub(crate) async fn parse_image_sources(html: String) -> Result<Vec<String>> {
    let sources = spawn_blocking(move || -> Result<Vec<String>> {
        let doc = Html::parse_document(&html);
        let img_selector = create_selector(VIEWER_IMAGE_SELECTOR)?;

        let sources = doc
            .select(&img_selector)
            .filter_map(|img| img.value().attr("src"))
            .map(|src| src.trim().to_string())
            .filter(|src| !src.is_empty())
            .collect();
        Ok(sources)
    })
    .await??;

    Ok(sources)
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseInvalidSelector(sel_str.into()))
}
