//! Multi-scale selection
//!
//! Runs the row scan and merge at several window heights, adds one
//! whole-page reading, and keeps the candidate with the best quality score.

use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use super::merge::merge_rows;
use super::scanner::{scan_rows, RowScan, ScanParams};
use super::text::{quality_score, text_len};
use crate::config::AssemblyOptions;
use crate::error::{AssemblyError, EngineError, InputError};
use crate::source::PageImage;
use crate::vision::{BoxRecognizer, RecognitionConfig};
use crate::visualize::VisualizationSink;

/// Strategy that produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Row scan at the given window height
    Window { height: u32 },
    /// Whole-page recognition without windowing
    Global,
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateSource::Window { height } => write!(f, "window height {}", height),
            CandidateSource::Global => write!(f, "global"),
        }
    }
}

/// One full-document candidate with its quality score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub source: CandidateSource,
    pub text: String,
    pub quality_score: f64,
}

impl ScoredCandidate {
    pub fn new(source: CandidateSource, text: String) -> Self {
        let quality_score = quality_score(&text);
        Self {
            source,
            text,
            quality_score,
        }
    }
}

/// Visualization references gathered during selection
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VisualizationReport {
    /// Composite for the winning window height
    pub best: Option<String>,
    /// Composites for every window height, in scan order
    pub all: Vec<String>,
}

/// Result of multi-scale selection
#[derive(Debug, Serialize)]
pub struct Selection {
    /// Candidates in generation order: window heights, then global
    pub candidates: Vec<ScoredCandidate>,
    /// Index of the winner; `None` when no candidate has any words
    pub best: Option<usize>,
    /// Text of the whole-page pass, if it succeeded
    pub global_text: Option<String>,
    /// Visualization references, if visualization was requested
    pub visualization: Option<VisualizationReport>,
}

impl Selection {
    /// The winning candidate
    pub fn best_candidate(&self) -> Option<&ScoredCandidate> {
        self.best.and_then(|i| self.candidates.get(i))
    }

    /// Winning text, empty when nothing was read
    pub fn best_text(&self) -> &str {
        self.best_candidate().map(|c| c.text.as_str()).unwrap_or_default()
    }

    /// Winning score, zero when nothing was read
    pub fn best_score(&self) -> f64 {
        self.best_candidate().map(|c| c.quality_score).unwrap_or_default()
    }
}

/// Index of the highest-scoring candidate; earlier candidates win ties
///
/// Returns `None` when no candidate scores above zero.
pub fn select_best(candidates: &[ScoredCandidate]) -> Option<usize> {
    let mut best: Option<usize> = None;
    let mut best_score = 0.0;

    for (idx, candidate) in candidates.iter().enumerate() {
        if candidate.quality_score > best_score {
            best_score = candidate.quality_score;
            best = Some(idx);
        }
    }

    best
}

/// Tally of recognition attempts across a whole call
#[derive(Debug, Default)]
pub(crate) struct AttemptLedger {
    attempts: usize,
    failures: usize,
    last_error: Option<EngineError>,
}

impl AttemptLedger {
    pub(crate) fn record_scan(&mut self, scan: &mut RowScan) {
        self.attempts += scan.attempts;
        self.failures += scan.failures;
        if let Some(e) = scan.last_error.take() {
            self.last_error = Some(e);
        }
    }

    pub(crate) fn record<T>(&mut self, result: Result<T, EngineError>) -> Option<T> {
        self.attempts += 1;
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.failures += 1;
                self.last_error = Some(e);
                None
            }
        }
    }

    /// Fail when every attempt failed
    pub(crate) fn check(self) -> Result<(), AssemblyError> {
        if self.attempts > 0 && self.failures == self.attempts {
            let error = self
                .last_error
                .unwrap_or_else(|| EngineError::Parse("no recognition attempt succeeded".to_string()));
            return Err(AssemblyError::Engine(error));
        }
        Ok(())
    }
}

/// Run the whole-page pass
pub fn global_pass<R: BoxRecognizer + ?Sized>(
    page: &PageImage,
    recognizer: &R,
    options: &AssemblyOptions,
) -> Result<String, EngineError> {
    let config = RecognitionConfig::new(options.global_mode);
    recognizer.recognize_full_text(page.pixels(), &config)
}

/// Scan at one height and merge the rows into candidate text
pub fn scan_and_merge<R: BoxRecognizer + ?Sized>(
    page: &PageImage,
    recognizer: &R,
    window_height: u32,
    overlap: u32,
    options: &AssemblyOptions,
    sink: Option<&dyn VisualizationSink>,
) -> Result<(String, RowScan), InputError> {
    let params = ScanParams {
        window_height,
        overlap,
        min_confidence: options.min_confidence,
        blank_threshold: options.blank_threshold,
        modes: options.row_modes.clone(),
    };
    let scan = scan_rows(page, recognizer, &params, sink)?;
    let lines = merge_rows(&scan.rows, window_height, options.similarity_threshold as f64);
    Ok((lines.join("\n"), scan))
}

/// Replace row text with the global text when it is less than half as long
pub fn sparse_fallback(row_text: String, global_text: Option<&str>) -> (String, bool) {
    match global_text {
        Some(global) if (text_len(&row_text) as f64) < text_len(global) as f64 * 0.5 => {
            (global.to_string(), true)
        }
        _ => (row_text, false),
    }
}

/// Pick the best candidate across all window heights and the global pass
pub fn select_multi_scale<R: BoxRecognizer + ?Sized>(
    page: &PageImage,
    recognizer: &R,
    options: &AssemblyOptions,
    sink: Option<&dyn VisualizationSink>,
) -> Result<Selection, AssemblyError> {
    let mut ledger = AttemptLedger::default();

    let global_text = ledger.record(global_pass(page, recognizer, options).map_err(|e| {
        warn!("Global pass failed: {}", e);
        e
    }));

    let mut candidates = Vec::with_capacity(options.window_heights.len() + 1);
    let mut composites: Vec<(u32, String)> = Vec::new();

    for &height in &options.window_heights {
        let overlap = options.overlap_for(height);
        let (text, mut scan) = scan_and_merge(page, recognizer, height, overlap, options, sink)?;

        if let Some(composite) = scan.composite.take() {
            composites.push((height, composite));
        }

        let failed = scan.all_failed();
        ledger.record_scan(&mut scan);
        if failed {
            warn!("Every recognition attempt failed at window height {}", height);
            continue;
        }

        let text = if options.sparse_row_fallback {
            let (text, replaced) = sparse_fallback(text, global_text.as_deref());
            if replaced {
                debug!("Window height {} output is sparse, using global text", height);
            }
            text
        } else {
            text
        };

        candidates.push(ScoredCandidate::new(CandidateSource::Window { height }, text));
    }

    if let Some(global) = &global_text {
        candidates.push(ScoredCandidate::new(CandidateSource::Global, global.clone()));
    }

    ledger.check()?;

    for candidate in &candidates {
        debug!("Candidate {}: score {:.1}", candidate.source, candidate.quality_score);
    }

    let best = select_best(&candidates);
    match best.and_then(|i| candidates.get(i)) {
        Some(winner) => info!("Selected {} (score {:.1})", winner.source, winner.quality_score),
        None => info!("No candidate contained any words"),
    }

    let visualization = (options.visualize && sink.is_some()).then(|| {
        let best_height = match best.and_then(|i| candidates.get(i)).map(|c| c.source) {
            Some(CandidateSource::Window { height }) => Some(height),
            _ => None,
        };
        VisualizationReport {
            best: composites
                .iter()
                .find(|(h, _)| Some(*h) == best_height)
                .map(|(_, path)| path.clone()),
            all: composites.into_iter().map(|(_, path)| path).collect(),
        }
    });

    Ok(Selection {
        candidates,
        best,
        global_text,
        visualization,
    })
}
