use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use reqwest::Client;
use tokio::{fs, fs::File, io::AsyncWriteExt, task::JoinSet};
use url::Url;

use crate::config::{Layout, StudyGroup, TitleEntry};
use crate::episode::episode_pages;
use crate::extract::{extract_text, Extraction};
use crate::header::HeaderSet;
use crate::ocr::Ocr;
use crate::request::fetch_episode_images;
use crate::store::{is_present, list_files};
use crate::{error_time, info_time, Result};

/// What `process_title` did for one title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleOutcome {
    /// The corpus file already existed, nothing was fetched.
    Skipped(PathBuf),
    Written { path: PathBuf, episodes: usize },
    /// Some episode tasks ended in an error. No corpus file was written, so the next run
    /// picks the title up again and only redoes what is missing.
    Incomplete {
        episodes: usize,
        failed_episodes: usize,
    },
}

/// Everything a worker needs. Cheap to clone: the client and the rest are behind `Arc`s.
#[derive(Clone)]
pub struct Pipeline {
    client: Client,
    headers: Arc<HeaderSet>,
    ocr: Arc<dyn Ocr>,
    layout: Arc<Layout>,
    processes: usize,
}

impl Pipeline {
    pub fn new(
        client: Client,
        headers: HeaderSet,
        ocr: impl Ocr + 'static,
        layout: Layout,
        processes: usize,
    ) -> Self {
        Self {
            client,
            headers: Arc::new(headers),
            ocr: Arc::new(ocr),
            layout: Arc::new(layout),
            processes: processes.max(1),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Runs every group in order, titles one at a time, numbering the titles of each group from 1.
    /// Only the episodes of a single title are ever processed concurrently.
    pub async fn process_run(&self, groups: &[StudyGroup]) -> Result<()> {
        for group in groups {
            info_time!(
                "Processing group `{}`: {} titles",
                group.label,
                group.entries.len()
            );
            for (i, entry) in group.entries.iter().enumerate() {
                self.process_title(entry, &group.label, i + 1).await?;
            }
        }
        Ok(())
    }

    /// Downloads and OCRs every episode of `entry` on a pool of `processes` workers, then
    /// concatenates the episode texts into the title's corpus file.
    ///
    /// A non-empty corpus file short-circuits everything, episodes aren't even enumerated.
    /// Failing episodes are logged and don't stop the others, but any failure leaves the corpus
    /// unwritten ([`TitleOutcome::Incomplete`]). A malformed latest-episode reference is an error.
    pub async fn process_title(
        &self,
        entry: &TitleEntry,
        label: &str,
        index: usize,
    ) -> Result<TitleOutcome> {
        let start_time = Local::now();
        let corpus_path = self.layout.corpus_path(label, index, &entry.title);
        if is_present(&corpus_path).await? {
            info_time!("Output (already present): {}", corpus_path.display());
            return Ok(TitleOutcome::Skipped(corpus_path));
        }
        if let Some(parent) = corpus_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let pages = episode_pages(&entry.latest)?;
        let episodes = pages.len();
        let title: Arc<str> = Arc::from(entry.title.as_str());

        let mut pool = JoinSet::new();
        let mut failed_episodes = 0;
        for page in pages {
            while pool.len() >= self.processes {
                if let Some(joined) = pool.join_next().await {
                    failed_episodes += log_episode_failure(&title, joined);
                }
            }
            pool.spawn({
                let pipeline = self.clone();
                let title = title.clone();
                async move {
                    let res = pipeline.process_episode(&page, &title).await;
                    (page, res)
                }
            });
        }
        while let Some(joined) = pool.join_next().await {
            failed_episodes += log_episode_failure(&title, joined);
        }

        if failed_episodes > 0 {
            error_time!(
                "Not writing {}: {} of {} episodes of {} failed, rerun to retry them",
                corpus_path.display(),
                failed_episodes,
                episodes,
                title
            );
            return Ok(TitleOutcome::Incomplete {
                episodes,
                failed_episodes,
            });
        }

        self.write_corpus(&entry.title, &corpus_path).await?;
        info_time!(start_time, "Output: {}", corpus_path.display());

        Ok(TitleOutcome::Written {
            path: corpus_path,
            episodes,
        })
    }

    /// One unit of pool work: download the episode's images, then OCR them.
    /// Per-image download failures are logged here and don't fail the episode.
    pub async fn process_episode(&self, page: &Url, title: &str) -> Result<Extraction> {
        let fetched =
            fetch_episode_images(&self.client, page, title, &self.headers, &self.layout).await?;

        for (src, reason) in fetched.failures() {
            error_time!("Image failed: {} <- {} ({}): {}", title, page, src, reason);
        }
        let (downloaded, present, failed) = fetched.counts();
        info_time!(
            "Download complete: {} (new {}, present {}, failed {})",
            fetched.dir.display(),
            downloaded,
            present,
            failed
        );

        let extraction = extract_text(&fetched.dir, &self.layout, self.ocr.clone()).await?;
        match &extraction {
            Extraction::Written { path, .. } => {
                info_time!("Extract Text Complete: {}", path.display())
            }
            Extraction::AlreadyPresent(path) => {
                info_time!("Extract Text (already present): {}", path.display())
            }
        }
        Ok(extraction)
    }

    /// Appends every episode text file of `title` to `corpus_path`, in natural file order.
    async fn write_corpus(&self, title: &str, corpus_path: &Path) -> Result<()> {
        let texts = list_files(&self.layout.title_text_dir(title)).await?;
        let mut corpus = File::create(corpus_path).await?;
        for txt in texts
            .iter()
            .filter(|path| path.extension().is_some_and(|ext| ext == "txt"))
        {
            let text = fs::read(txt).await?;
            corpus.write_all(&text).await?;
        }
        corpus.flush().await?;
        Ok(())
    }
}

/// Logs a failed or panicked episode task. Returns 1 if the task failed, 0 otherwise.
fn log_episode_failure(
    title: &str,
    joined: core::result::Result<(Url, Result<Extraction>), tokio::task::JoinError>,
) -> usize {
    match joined {
        Ok((_, Ok(_))) => 0,
        Ok((page, Err(err))) => {
            error_time!("Episode failed: {} <- {}: {}", title, page, err);
            1
        }
        Err(err) => {
            error_time!("Episode task for {} didn't finish: {}", title, err);
            1
        }
    }
}
