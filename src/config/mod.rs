//! Application Configuration
//!
//! Assembly options, engine settings and output preferences stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::InputError;
use crate::vision::SegmentationMode;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Row scanning, selection and fusion options
    pub assembly: AssemblyOptions,
    /// Recognition engine settings
    pub engine: EngineSettings,
    /// Output settings
    pub output: OutputSettings,
}

/// Options for one document assembly call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyOptions {
    /// Word boxes must have confidence strictly above this value (0 - 100)
    pub min_confidence: f32,
    /// Window heights tried by the multi-scale selector, in pixels
    pub window_heights: Vec<u32>,
    /// Overlap between consecutive windows as a fraction of the window height
    pub overlap_fraction: f32,
    /// Persist annotated window images through the visualization sink
    pub visualize: bool,
    /// Windows with a mean intensity above this are treated as blank (0 - 255)
    pub blank_threshold: f32,
    /// Similarity above which two rows or lines are considered the same text
    pub similarity_threshold: f32,
    /// Fusion falls back to the global pass when fused lines < ratio x global lines
    pub fallback_ratio: f32,
    /// Binarization level applied before recognition; `None` disables it
    pub binarize_threshold: Option<u8>,
    /// Segmentation modes tried on every window, in order
    pub row_modes: Vec<SegmentationMode>,
    /// Segmentation mode of the whole-page pass
    pub global_mode: SegmentationMode,
    /// Replace a sparse single-height scan with the global text
    pub sparse_row_fallback: bool,
    /// Derive a single window height per page from its word heights
    /// instead of trying `window_heights`
    pub auto_window_height: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            min_confidence: 40.0,
            window_heights: vec![50, 100, 150],
            overlap_fraction: 1.0 / 3.0,
            visualize: false,
            blank_threshold: 250.0,
            similarity_threshold: 0.5,
            fallback_ratio: 0.5,
            binarize_threshold: Some(150),
            row_modes: vec![
                SegmentationMode::Block,
                SegmentationMode::SingleLine,
                SegmentationMode::Auto,
            ],
            global_mode: SegmentationMode::AutoWithOsd,
            sparse_row_fallback: false,
            auto_window_height: false,
        }
    }
}

impl AssemblyOptions {
    /// Overlap in pixels for a given window height
    pub fn overlap_for(&self, window_height: u32) -> u32 {
        (window_height as f32 * self.overlap_fraction) as u32
    }

    /// Check value ranges before any recognition work starts
    pub fn validate(&self) -> Result<(), InputError> {
        let invalid = |msg: String| Err(InputError::InvalidOptions(msg));

        if !(0.0..=100.0).contains(&self.min_confidence) {
            return invalid(format!("min_confidence {} outside 0..=100", self.min_confidence));
        }
        if self.window_heights.is_empty() {
            return invalid("window_heights must not be empty".to_string());
        }
        if self.window_heights.contains(&0) {
            return invalid("window heights must be positive".to_string());
        }
        if !(0.0..1.0).contains(&self.overlap_fraction) {
            return invalid(format!("overlap_fraction {} outside 0..1", self.overlap_fraction));
        }
        if !(0.0..=255.0).contains(&self.blank_threshold) {
            return invalid(format!("blank_threshold {} outside 0..=255", self.blank_threshold));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return invalid(format!(
                "similarity_threshold {} outside 0..=1",
                self.similarity_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.fallback_ratio) {
            return invalid(format!("fallback_ratio {} outside 0..=1", self.fallback_ratio));
        }
        if self.row_modes.is_empty() {
            return invalid("row_modes must not be empty".to_string());
        }
        Ok(())
    }
}

/// Recognition engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Path or name of the tesseract executable
    pub tesseract_path: String,
    /// Recognition language (e.g., "eng", "eng+deu")
    pub language: String,
    /// OCR engine mode passed as `--oem`
    pub oem: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tesseract_path: "tesseract".to_string(),
            language: "eng".to_string(),
            oem: 3,
        }
    }
}

/// Output-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory for visualization images; defaults to the data directory
    pub visualization_dir: Option<PathBuf>,
    /// Header inserted before each page, `{n}` is replaced by the 1-based page number
    pub page_separator: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            visualization_dir: None,
            page_separator: "--- Page {n} ---".to_string(),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_assembly_options() {
        let options = AssemblyOptions::default();

        assert!((options.min_confidence - 40.0).abs() < 0.01);
        assert_eq!(options.window_heights, vec![50, 100, 150]);
        assert!(!options.visualize);
        assert!((options.blank_threshold - 250.0).abs() < 0.01);
        assert!((options.similarity_threshold - 0.5).abs() < 0.01);
        assert_eq!(options.binarize_threshold, Some(150));
        assert_eq!(options.global_mode, SegmentationMode::AutoWithOsd);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_overlap_matches_integer_thirds() {
        let options = AssemblyOptions::default();
        assert_eq!(options.overlap_for(50), 16);
        assert_eq!(options.overlap_for(100), 33);
        assert_eq!(options.overlap_for(150), 50);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut options = AssemblyOptions::default();
        options.window_heights.clear();
        assert!(matches!(options.validate(), Err(InputError::InvalidOptions(_))));

        let mut options = AssemblyOptions::default();
        options.overlap_fraction = 1.0;
        assert!(options.validate().is_err());

        let mut options = AssemblyOptions::default();
        options.window_heights = vec![100, 0];
        assert!(options.validate().is_err());

        let mut options = AssemblyOptions::default();
        options.row_modes.clear();
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
[assembly]
window_heights = [80, 160]
visualize = true

[engine]
language = "deu"
"#;
        let parsed: AppConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(parsed.assembly.window_heights, vec![80, 160]);
        assert!(parsed.assembly.visualize);
        assert!((parsed.assembly.min_confidence - 40.0).abs() < 0.01);
        assert_eq!(parsed.engine.language, "deu");
        assert_eq!(parsed.engine.tesseract_path, "tesseract");
        assert_eq!(parsed.output.page_separator, "--- Page {n} ---");
    }

    #[test]
    fn test_segmentation_modes_in_toml() {
        let toml_str = r#"
[assembly]
row_modes = ["single_line", "block"]
global_mode = "auto"
"#;
        let parsed: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            parsed.assembly.row_modes,
            vec![SegmentationMode::SingleLine, SegmentationMode::Block]
        );
        assert_eq!(parsed.assembly.global_mode, SegmentationMode::Auto);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.assembly.min_confidence = 55.0;
        config.output.visualization_dir = Some(PathBuf::from("/tmp/rows"));

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert!((loaded.assembly.min_confidence - 55.0).abs() < 0.01);
        assert_eq!(loaded.output.visualization_dir, Some(PathBuf::from("/tmp/rows")));
        assert_eq!(loaded.assembly.row_modes, config.assembly.row_modes);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
