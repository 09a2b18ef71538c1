use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::{fs, fs::File, io::AsyncWriteExt, task::spawn_blocking};

use crate::config::Layout;
use crate::ocr::Ocr;
use crate::store::{is_present, list_files};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The text file was already there and non-empty; no OCR ran.
    AlreadyPresent(PathBuf),
    Written { path: PathBuf, images: usize },
}

impl Extraction {
    pub fn path(&self) -> &Path {
        match self {
            Extraction::AlreadyPresent(path) | Extraction::Written { path, .. } => path.as_path(),
        }
    }
}

/// OCRs every image in `img_dir` and writes the text, unseparated and in natural file order,
/// to the mirrored file under the text root.
///
/// The text file is created before the first image is read, so an OCR failure halfway leaves a
/// partial file behind and aborts the extraction.
pub async fn extract_text(
    img_dir: &Path,
    layout: &Layout,
    ocr: Arc<dyn Ocr>,
) -> Result<Extraction> {
    let txt_path = layout.text_path_for(img_dir)?;
    if is_present(&txt_path).await? {
        return Ok(Extraction::AlreadyPresent(txt_path));
    }
    if let Some(parent) = txt_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let images = list_files(img_dir).await?;
    let mut file = File::create(&txt_path).await?;
    for img_path in &images {
        let text = spawn_blocking({
            let ocr = ocr.clone();
            let img_path = img_path.clone();
            move || ocr.recognize(&img_path)
        })
        .await??;
        file.write_all(text.as_bytes()).await?;
    }
    file.flush().await?;

    Ok(Extraction::Written {
        path: txt_path,
        images: images.len(),
    })
}
