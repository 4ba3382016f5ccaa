//! OCR Fusion - Row-based OCR text assembly
//!
//! Reads a page twice: once as a whole, and as overlapping horizontal
//! windows at several heights. The best windowed reading is fused line by
//! line with the whole-page reading.

pub mod assembly;
pub mod config;
pub mod error;
pub mod source;
pub mod storage;
pub mod vision;
pub mod visualize;

#[cfg(test)]
pub(crate) mod testing;

pub use assembly::{assemble_file, assemble_pages, assemble_text, FusionResult};
pub use config::{AppConfig, AssemblyOptions};
pub use error::{AssemblyError, EngineError, InputError};
pub use source::{FileImageSource, ImageSource, PageImage};
pub use vision::{BoxRecognizer, TesseractCli, WordBox};
pub use visualize::{FileVisualizationSink, VisualizationSink};
