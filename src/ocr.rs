use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{Error, Result, DEFAULT_OCR_LANG};

/// Turns one image into text.
///
/// Implementations are blocking; callers run them inside `spawn_blocking`.
pub trait Ocr: Send + Sync {
    fn recognize(&self, image: &Path) -> Result<String>;
}

/// Runs the `tesseract` CLI: `tesseract <image> stdout -l <lang>`.
#[derive(Debug, Clone)]
pub struct Tesseract {
    program: PathBuf,
    lang: String,
}

impl Default for Tesseract {
    fn default() -> Self {
        Self::new("tesseract", DEFAULT_OCR_LANG)
    }
}

impl Tesseract {
    pub fn new(program: impl Into<PathBuf>, lang: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            lang: lang.into(),
        }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }
}

impl Ocr for Tesseract {
    fn recognize(&self, image: &Path) -> Result<String> {
        let output = Command::new(&self.program)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .output()?;

        if !output.status.success() {
            return Err(Error::Ocr {
                path: image.to_path_buf(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
