//! Tesseract OCR backend
//!
//! Drives the `tesseract` executable. Each call writes the image to a
//! temporary PNG and parses the engine's stdout, TSV for word boxes and
//! plain text for full-page recognition.

use image::{GrayImage, ImageFormat};
use std::process::Command;
use tracing::{debug, info};

use super::{BoxRecognizer, RecognitionConfig, WordBox};
use crate::config::EngineSettings;
use crate::error::EngineError;

/// Word level in Tesseract's TSV hierarchy
const TSV_WORD_LEVEL: u32 = 5;

/// Tesseract command-line engine wrapper
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: String,
    language: String,
    oem: u32,
}

impl TesseractCli {
    /// Create an engine handle from settings
    pub fn new(settings: &EngineSettings) -> Self {
        info!(
            "Using tesseract engine `{}` (language: {}, oem: {})",
            settings.tesseract_path, settings.language, settings.oem
        );
        Self {
            program: settings.tesseract_path.clone(),
            language: settings.language.clone(),
            oem: settings.oem,
        }
    }

    /// Get the configured language
    pub fn language(&self) -> &str {
        &self.language
    }

    /// First line of `tesseract --version`
    pub fn version(&self) -> Result<String, EngineError> {
        let stdout = self.exec(&["--version"])?;
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    /// Languages the installed engine can recognize
    pub fn available_languages(&self) -> Result<Vec<String>, EngineError> {
        let stdout = self.exec(&["--list-langs"])?;
        Ok(stdout
            .lines()
            .skip(1)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Run the engine on `image`, optionally selecting an output config such as `tsv`
    fn run(
        &self,
        image: &GrayImage,
        config: &RecognitionConfig,
        output: Option<&str>,
    ) -> Result<String, EngineError> {
        let file = tempfile::Builder::new()
            .prefix("ocr-fusion-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(file.path(), ImageFormat::Png)?;

        let psm = config.mode.psm().to_string();
        let oem = self.oem.to_string();
        let path = file.path().to_string_lossy();

        let mut args = vec![
            &*path,
            "stdout",
            "-l",
            self.language.as_str(),
            "--oem",
            oem.as_str(),
            "--psm",
            psm.as_str(),
        ];
        if let Some(output) = output {
            args.push(output);
        }

        debug!(
            "tesseract: {}x{} image, psm {}, output {:?}",
            image.width(),
            image.height(),
            psm,
            output
        );

        self.exec(&args)
    }

    fn exec(&self, args: &[&str]) -> Result<String, EngineError> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(EngineError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl BoxRecognizer for TesseractCli {
    fn recognize_boxes(
        &self,
        image: &GrayImage,
        config: &RecognitionConfig,
    ) -> Result<Vec<WordBox>, EngineError> {
        let tsv = self.run(image, config, Some("tsv"))?;
        let boxes = parse_tsv_boxes(&tsv)?;
        debug!("tesseract: {} word boxes", boxes.len());
        Ok(boxes)
    }

    fn recognize_full_text(
        &self,
        image: &GrayImage,
        config: &RecognitionConfig,
    ) -> Result<String, EngineError> {
        self.run(image, config, None)
    }
}

/// Parse word rows out of Tesseract TSV output
///
/// Columns: level, page, block, par, line, word, left, top, width, height, conf, text.
/// Non-word rows, negative confidences and blank words are skipped.
pub fn parse_tsv_boxes(tsv: &str) -> Result<Vec<WordBox>, EngineError> {
    let mut boxes = Vec::new();

    for (idx, row) in tsv.lines().enumerate() {
        if row.trim().is_empty() || row.starts_with("level") {
            continue;
        }

        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 11 {
            return Err(EngineError::Parse(format!(
                "line {}: expected at least 11 columns, found {}",
                idx + 1,
                cols.len()
            )));
        }

        let level: u32 = parse_column(cols[0], "level", idx)?;
        if level != TSV_WORD_LEVEL {
            continue;
        }

        let left: u32 = parse_column(cols[6], "left", idx)?;
        let top: u32 = parse_column(cols[7], "top", idx)?;
        let width: u32 = parse_column(cols[8], "width", idx)?;
        let height: u32 = parse_column(cols[9], "height", idx)?;
        let conf: f32 = parse_column(cols[10], "conf", idx)?;
        if conf < 0.0 {
            continue;
        }

        let text = cols.get(11).copied().unwrap_or_default();
        if let Some(word) = WordBox::new(left, top, width, height, text, conf) {
            boxes.push(word);
        }
    }

    Ok(boxes)
}

fn parse_column<T: std::str::FromStr>(value: &str, name: &str, idx: usize) -> Result<T, EngineError> {
    value.trim().parse().map_err(|_| {
        EngineError::Parse(format!("line {}: invalid {} value {:?}", idx + 1, name, value))
    })
}
