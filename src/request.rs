use std::path::{Path, PathBuf};

use reqwest::{header::HeaderMap, Client};
use tokio::{fs, fs::File, io::AsyncWriteExt};
use url::Url;

use crate::config::Layout;
use crate::episode::episode_number;
use crate::header::HeaderSet;
use crate::parse::parse_image_sources;
use crate::store::is_present;
use crate::{Error, Result};

/// What happened to a single image of an episode.
#[derive(Debug)]
pub enum ImageFetch {
    Downloaded(PathBuf),
    /// A non-empty file was already on disk, nothing was requested.
    AlreadyPresent(PathBuf),
    Failed { src: String, reason: Error },
}

/// Result of fetching one episode. `dir` is returned even if every image failed.
#[derive(Debug)]
pub struct EpisodeImages {
    pub dir: PathBuf,
    pub images: Vec<ImageFetch>,
}

impl EpisodeImages {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.images.iter().filter_map(|image| match image {
            ImageFetch::Failed { src, reason } => Some((src.as_str(), reason)),
            _ => None,
        })
    }

    /// (downloaded, already present, failed)
    pub fn counts(&self) -> (usize, usize, usize) {
        self.images
            .iter()
            .fold((0, 0, 0), |(new, old, bad), image| match image {
                ImageFetch::Downloaded(_) => (new + 1, old, bad),
                ImageFetch::AlreadyPresent(_) => (new, old + 1, bad),
                ImageFetch::Failed { .. } => (new, old, bad + 1),
            })
    }
}

/// Downloads every viewer image of the episode at `page` into
/// `<img_root>/<title>/<episode-no>/`, skipping images already on disk.
///
/// Failing to get the page itself is an error. A failing image is recorded in the returned
/// [`EpisodeImages`] and the remaining images are still attempted.
pub async fn fetch_episode_images(
    client: &Client,
    page: &Url,
    title: &str,
    headers: &HeaderSet,
    layout: &Layout,
) -> Result<EpisodeImages> {
    let dir = layout.image_dir(title, episode_number(page)?);

    let html = request_page_html(client, page, headers.page()).await?;
    let sources = parse_image_sources(html).await?;

    fs::create_dir_all(&dir).await?;

    let mut images = Vec::with_capacity(sources.len());
    for src in sources {
        let fetched = match fetch_image(client, page, &src, &dir, headers.image()).await {
            Ok(fetched) => fetched,
            Err(reason) => ImageFetch::Failed { src, reason },
        };
        images.push(fetched);
    }

    Ok(EpisodeImages { dir, images })
}

/// Requests a page and returns a `Result<String>` containing the HTML.
async fn request_page_html(client: &Client, page: &Url, headers: &HeaderMap) -> Result<String> {
    let res = client
        .get(page.clone())
        .headers(headers.clone())
        .send()
        .await?
        .error_for_status()?;
    let html = res.text().await?;
    Ok(html)
}

async fn fetch_image(
    client: &Client,
    page: &Url,
    src: &str,
    dir: &Path,
    headers: &HeaderMap,
) -> Result<ImageFetch> {
    let src_url = page.join(src).map_err(|source| Error::UrlParse {
        input: src.to_string(),
        source,
    })?;
    let img_path = dir.join(image_basename(&src_url)?);

    if is_present(&img_path).await? {
        return Ok(ImageFetch::AlreadyPresent(img_path));
    }

    download_image(client, &src_url, &img_path, headers).await?;
    Ok(ImageFetch::Downloaded(img_path))
}

/// Last path segment of the image URL, query and fragment ignored.
fn image_basename(src: &Url) -> Result<String> {
    src.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .ok_or_else(|| Error::ImageWithoutName(src.to_string()))
}

/// Streams the image body to `path`. A body cut off halfway removes the partial file.
async fn download_image(
    client: &Client,
    src: &Url,
    path: &Path,
    headers: &HeaderMap,
) -> Result<()> {
    let mut res = client
        .get(src.clone())
        .headers(headers.clone())
        .send()
        .await?
        .error_for_status()?;

    let mut file = File::create(path).await?;
    let written: Result<()> = async {
        while let Some(chunk) = res.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    if written.is_err() {
        drop(file);
        let _ = fs::remove_file(path).await;
    }
    written
}
