use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result, CORPUS_INDEX_WIDTH};

/// Where every stage of the pipeline reads and writes.
///
/// - images: `<img_root>/<title>/<episode-no>/<basename>`
/// - episode text: `<text_root>/<title>/<episode-no>.txt`
/// - corpus: `<dataset_root>/<label>/<index:03>-<title>.txt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub img_root: PathBuf,
    pub text_root: PathBuf,
    pub dataset_root: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            img_root: PathBuf::from("imgs"),
            text_root: PathBuf::from("text"),
            dataset_root: PathBuf::from("dataset"),
        }
    }
}

impl Layout {
    /// Places all three trees under `base`.
    pub fn under(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        let default = Self::default();
        Self {
            img_root: base.join(default.img_root),
            text_root: base.join(default.text_root),
            dataset_root: base.join(default.dataset_root),
        }
    }

    pub fn image_dir(&self, title: &str, episode: u32) -> PathBuf {
        self.img_root
            .join(path_safe_title(title))
            .join(episode.to_string())
    }

    /// Mirrors an episode image directory into the text tree: `imgs/T/3` -> `text/T/3.txt`.
    pub fn text_path_for(&self, img_dir: &Path) -> Result<PathBuf> {
        let rel = img_dir
            .strip_prefix(&self.img_root)
            .map_err(|_| Error::PathOutsideRoot {
                path: img_dir.to_path_buf(),
                root: self.img_root.clone(),
            })?;
        let mut txt_path = self.text_root.join(rel).into_os_string();
        txt_path.push(".txt");
        Ok(PathBuf::from(txt_path))
    }

    /// Directory holding every episode text file of a title.
    pub fn title_text_dir(&self, title: &str) -> PathBuf {
        self.text_root.join(path_safe_title(title))
    }

    pub fn corpus_path(&self, label: &str, index: usize, title: &str) -> PathBuf {
        self.dataset_root.join(label).join(format!(
            "{:0width$}-{}.txt",
            index,
            path_safe_title(title),
            width = CORPUS_INDEX_WIDTH
        ))
    }
}

/// Strips the characters that aren't allowed in file names on at least one platform.
pub fn path_safe_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !r#"<>:"/\|?*"#.contains(*c))
        .collect()
}

/// One curated title: its display name and the URL of its latest episode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TitleEntry {
    pub title: String,
    pub latest: String,
}

impl TitleEntry {
    pub fn new(title: impl Into<String>, latest: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            latest: latest.into(),
        }
    }
}

/// A labelled cohort of titles. The label names the corpus sub-directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StudyGroup {
    pub label: String,
    #[serde(default)]
    pub entries: Vec<TitleEntry>,
}

/// The curated input, groups in processing order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TitleList {
    #[serde(rename = "group", default)]
    pub groups: Vec<StudyGroup>,
}

impl TitleList {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }
}
