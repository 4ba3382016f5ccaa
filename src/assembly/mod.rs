//! Text assembly pipeline
//!
//! Turns one page image into text: a whole-page pass plus row scans at
//! several window heights, the best candidate chosen by quality score and
//! fused line by line with the whole-page reading.

pub mod fusion;
pub mod lines;
pub mod merge;
pub mod scanner;
pub mod selector;
pub mod text;

pub use fusion::{fuse, FusionResult};
pub use lines::{assemble_lines, extract_region_text, group_lines, TextLine};
pub use merge::merge_rows;
pub use scanner::{scan_rows, suggest_window_height, window_starts, RowResult, RowScan, ScanParams};
pub use selector::{select_best, select_multi_scale, CandidateSource, ScoredCandidate, Selection, VisualizationReport};

use serde::Serialize;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::AssemblyOptions;
use crate::error::{AssemblyError, InputError};
use crate::source::{ImageSource, PageImage};
use crate::vision::preprocess::prepare_page;
use crate::vision::{confident_boxes, BoxRecognizer, RecognitionConfig, SegmentationMode, WordBox};
use crate::visualize::{HighlightRegion, PrefixedSink, VisualizationSink};
use selector::{global_pass, scan_and_merge, sparse_fallback, AttemptLedger};

/// Assemble the text of one page
///
/// The sink is only used when `options.visualize` is set.
pub fn assemble_text<R: BoxRecognizer + ?Sized>(
    page: &PageImage,
    recognizer: &R,
    options: &AssemblyOptions,
    sink: Option<&dyn VisualizationSink>,
) -> Result<FusionResult, AssemblyError> {
    options.validate()?;
    let prepared = prepare_page(page, options.binarize_threshold);
    let sink = sink.filter(|_| options.visualize);
    let options = page_options(&prepared, recognizer, options);

    let selection = select_multi_scale(&prepared, recognizer, &options, sink)?;
    let global_text = selection.global_text.as_deref().unwrap_or_default();

    let mut result = fuse(
        selection.best_text(),
        global_text,
        options.similarity_threshold as f64,
        options.fallback_ratio as f64,
    );
    result.strategy = selection.best_candidate().map(|c| c.source);
    result.visualization = selection.visualization;

    info!(
        "Assembled {} lines{}",
        result.text.lines().count(),
        if result.used_fallback { " (global fallback)" } else { "" }
    );
    Ok(result)
}

/// Load `path` through `source` and assemble its text
pub fn assemble_file<S, R>(
    path: &Path,
    source: &S,
    recognizer: &R,
    options: &AssemblyOptions,
    sink: Option<&dyn VisualizationSink>,
) -> Result<FusionResult, AssemblyError>
where
    S: ImageSource + ?Sized,
    R: BoxRecognizer + ?Sized,
{
    let page = source.load(path)?;
    assemble_text(&page, recognizer, options, sink)
}

/// Multi-scale selection without fusion
pub fn select_text<R: BoxRecognizer + ?Sized>(
    page: &PageImage,
    recognizer: &R,
    options: &AssemblyOptions,
    sink: Option<&dyn VisualizationSink>,
) -> Result<Selection, AssemblyError> {
    options.validate()?;
    let prepared = prepare_page(page, options.binarize_threshold);
    let sink = sink.filter(|_| options.visualize);
    let options = page_options(&prepared, recognizer, options);
    select_multi_scale(&prepared, recognizer, &options, sink)
}

/// Options for one page, with the window height derived from the page
/// when `auto_window_height` is set
fn page_options<'a, R: BoxRecognizer + ?Sized>(
    prepared: &PageImage,
    recognizer: &R,
    options: &'a AssemblyOptions,
) -> Cow<'a, AssemblyOptions> {
    if !options.auto_window_height {
        return Cow::Borrowed(options);
    }
    let height = suggest_window_height(prepared, recognizer);
    info!("Detected window height {}", height);
    Cow::Owned(AssemblyOptions {
        window_heights: vec![height],
        ..options.clone()
    })
}

/// One page of a multi-page document
#[derive(Debug, Serialize)]
pub struct PageResult {
    pub path: PathBuf,
    #[serde(flatten)]
    pub result: FusionResult,
}

/// Assemble every page in order
///
/// Visualization labels are prefixed with the page number so pages can
/// share one sink.
pub fn assemble_pages<S, R>(
    paths: &[PathBuf],
    source: &S,
    recognizer: &R,
    options: &AssemblyOptions,
    sink: Option<&dyn VisualizationSink>,
) -> Result<Vec<PageResult>, AssemblyError>
where
    S: ImageSource + ?Sized,
    R: BoxRecognizer + ?Sized,
{
    paths
        .iter()
        .enumerate()
        .map(|(idx, path)| {
            info!("Processing page {} of {}: {:?}", idx + 1, paths.len(), path);
            let page_sink = sink.map(|s| PrefixedSink::new(s, format!("page_{:03}", idx + 1)));
            let result = assemble_file(
                path,
                source,
                recognizer,
                options,
                page_sink.as_ref().map(|s| s as &dyn VisualizationSink),
            )?;
            Ok(PageResult {
                path: path.clone(),
                result,
            })
        })
        .collect()
}

/// Join page texts, each preceded by its separator line
///
/// `{n}` in `separator` is replaced by the 1-based page number.
pub fn join_pages<'a>(texts: impl IntoIterator<Item = &'a str>, separator: &str) -> String {
    texts
        .into_iter()
        .enumerate()
        .map(|(idx, text)| format!("{}\n{}", separator.replace("{n}", &(idx + 1).to_string()), text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Rows read at a single window height
#[derive(Debug, Serialize)]
pub struct RowExtraction {
    pub text: String,
    /// The global text replaced the row text
    pub used_fallback: bool,
    pub rows: Vec<RowResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite: Option<String>,
}

/// Scan and merge at one window height
///
/// With `options.sparse_row_fallback`, the whole page is also read and
/// replaces the row text when the row text is less than half as long.
pub fn extract_rows<R: BoxRecognizer + ?Sized>(
    page: &PageImage,
    recognizer: &R,
    options: &AssemblyOptions,
    window_height: u32,
    overlap: u32,
    sink: Option<&dyn VisualizationSink>,
) -> Result<RowExtraction, AssemblyError> {
    options.validate()?;
    let prepared = prepare_page(page, options.binarize_threshold);
    let sink = sink.filter(|_| options.visualize);
    let mut ledger = AttemptLedger::default();

    let global_text = if options.sparse_row_fallback {
        ledger.record(global_pass(&prepared, recognizer, options).map_err(|e| {
            warn!("Global pass failed: {}", e);
            e
        }))
    } else {
        None
    };

    let (text, mut scan) = scan_and_merge(&prepared, recognizer, window_height, overlap, options, sink)?;
    ledger.record_scan(&mut scan);
    ledger.check()?;

    let (text, used_fallback) = match global_text {
        Some(global) => sparse_fallback(text, Some(&global)),
        None => (text, false),
    };

    info!(
        "Window height {}: {} rows, {} lines",
        window_height,
        scan.rows.len(),
        text.lines().count()
    );

    Ok(RowExtraction {
        text,
        used_fallback,
        rows: scan.rows,
        composite: scan.composite,
    })
}

/// Block-mode box pass over the whole page, assembled into lines
pub fn extract_region<R: BoxRecognizer + ?Sized>(
    page: &PageImage,
    recognizer: &R,
    options: &AssemblyOptions,
) -> Result<String, AssemblyError> {
    options.validate()?;
    let prepared = prepare_page(page, options.binarize_threshold);
    Ok(extract_region_text(&prepared, recognizer, options.min_confidence)?)
}

/// Suggest a window height for `page` from its word heights
pub fn suggest_row_height<R: BoxRecognizer + ?Sized>(
    page: &PageImage,
    recognizer: &R,
    options: &AssemblyOptions,
) -> u32 {
    let prepared = prepare_page(page, options.binarize_threshold);
    suggest_window_height(&prepared, recognizer)
}

/// Recognized words together with the highlighted page reference
#[derive(Debug, Serialize)]
pub struct HighlightResult {
    pub boxes: Vec<WordBox>,
    pub visualization: String,
}

/// Draw every confident word box onto the page through `sink`
pub fn highlight_boxes<R: BoxRecognizer + ?Sized>(
    page: &PageImage,
    recognizer: &R,
    options: &AssemblyOptions,
    sink: &dyn VisualizationSink,
    label: &str,
) -> Result<HighlightResult, AssemblyError> {
    if !(0.0..=100.0).contains(&options.min_confidence) {
        return Err(InputError::InvalidOptions(format!(
            "min_confidence {} outside 0..=100",
            options.min_confidence
        ))
        .into());
    }

    let prepared = prepare_page(page, options.binarize_threshold);
    let config = RecognitionConfig::new(SegmentationMode::Block);
    let boxes = confident_boxes(
        recognizer.recognize_boxes(prepared.pixels(), &config)?,
        options.min_confidence,
    );

    let regions: Vec<HighlightRegion> = boxes.iter().map(HighlightRegion::from_word).collect();
    let visualization = sink.persist(page, &regions, label)?;
    info!("Highlighted {} words", boxes.len());

    Ok(HighlightResult {
        boxes,
        visualization,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FileImageSource;
    use crate::testing::{banded_page, word, Band, BandRecognizer, RecordingSink, ScriptedRecognizer};

    fn band_options(heights: Vec<u32>) -> AssemblyOptions {
        AssemblyOptions {
            window_heights: heights,
            binarize_threshold: None,
            ..Default::default()
        }
    }

    fn three_bands() -> Vec<Band> {
        vec![
            Band::new(0, 40, 10, &["Invoice", "4711"]),
            Band::new(120, 40, 20, &["Total", "due"]),
            Band::new(260, 40, 30, &["Thank", "you"]),
        ]
    }

    #[test]
    fn test_three_bands_end_to_end() {
        let bands = three_bands();
        let page = banded_page(400, 300, &bands);
        let recognizer = BandRecognizer::new(&bands);
        let mut options = band_options(vec![150]);
        options.overlap_fraction = 1.0 / 3.0;

        let extraction = extract_rows(&page, &recognizer, &options, 150, 50, None).unwrap();
        assert_eq!(extraction.text, "Invoice 4711\nTotal due\nThank you");
        assert_eq!(extraction.rows.len(), 3);

        let result = assemble_text(&page, &recognizer, &options, None).unwrap();
        assert!(!result.used_fallback);
        assert_eq!(result.text, "Invoice 4711\nTotal due\nThank you");
        // Row scan and global pass read the same; the earlier candidate wins
        assert_eq!(result.strategy, Some(CandidateSource::Window { height: 150 }));
    }

    #[test]
    fn test_all_engine_failures_surface() {
        let page = banded_page(300, 200, &[Band::new(20, 30, 0, &["x"])]);
        let recognizer = ScriptedRecognizer::failing().failing_full_text();

        let result = assemble_text(&page, &recognizer, &AssemblyOptions::default(), None);
        assert!(matches!(result, Err(AssemblyError::Engine(_))));
    }

    #[test]
    fn test_blank_page_is_empty_not_error() {
        let page = crate::testing::white_page(300, 200);
        let recognizer = ScriptedRecognizer::boxes(vec![]).with_full_text("");

        let result = assemble_text(&page, &recognizer, &AssemblyOptions::default(), None).unwrap();
        assert_eq!(result.text, "");
        assert!(!result.used_fallback);
        assert_eq!(result.strategy, None);
        assert_eq!(recognizer.box_calls(), 0);
        assert_eq!(recognizer.text_calls(), 1);
    }

    #[test]
    fn test_sparse_rows_fall_back_to_global() {
        let page = banded_page(300, 200, &[Band::new(20, 30, 0, &["x"])]);
        // Rows win selection (13 vs 23 * 1/4) but cover one of four global lines
        let global = "total\ntotal\ntotal\ntotal";
        let recognizer = ScriptedRecognizer::boxes(vec![word(0, 20, 30, "Invoice"), word(80, 20, 30, "total")])
            .with_full_text(global);

        let result = assemble_text(&page, &recognizer, &band_options(vec![100]), None).unwrap();
        assert!(result.used_fallback);
        assert_eq!(result.text, global);
    }

    #[test]
    fn test_invalid_options_rejected_before_recognition() {
        let page = crate::testing::white_page(100, 100);
        let recognizer = ScriptedRecognizer::boxes(vec![]);
        let options = band_options(vec![]);

        let result = assemble_text(&page, &recognizer, &options, None);
        assert!(matches!(result, Err(AssemblyError::Input(InputError::InvalidOptions(_)))));
        assert_eq!(recognizer.text_calls(), 0);

        let result = extract_rows(&page, &recognizer, &band_options(vec![100]), 100, 100, None);
        assert!(matches!(result, Err(AssemblyError::Input(InputError::InvalidOptions(_)))));
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let recognizer = ScriptedRecognizer::boxes(vec![]);
        let result = assemble_file(
            Path::new("/nonexistent/page.png"),
            &FileImageSource,
            &recognizer,
            &AssemblyOptions::default(),
            None,
        );
        assert!(matches!(result, Err(AssemblyError::Input(InputError::NotFound(_)))));
    }

    #[test]
    fn test_assemble_pages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let bands = three_bands();
        let first = dir.path().join("first.png");
        let second = dir.path().join("second.png");
        banded_page(400, 300, &bands[..1]).pixels().save(&first).unwrap();
        banded_page(400, 300, &bands[2..]).pixels().save(&second).unwrap();

        let recognizer = BandRecognizer::new(&bands);
        let pages = assemble_pages(
            &[first.clone(), second],
            &FileImageSource,
            &recognizer,
            &band_options(vec![150]),
            None,
        )
        .unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].path, first);
        let document = join_pages(pages.iter().map(|p| p.result.text.as_str()), "--- Page {n} ---");
        assert_eq!(
            document,
            "--- Page 1 ---\nInvoice 4711\n\n--- Page 2 ---\nThank you"
        );
    }

    #[test]
    fn test_visualization_only_when_requested() {
        let bands = vec![Band::new(20, 30, 10, &["Invoice"])];
        let page = banded_page(300, 200, &bands);
        let recognizer = BandRecognizer::new(&bands);
        let sink = RecordingSink::default();

        let result = assemble_text(&page, &recognizer, &band_options(vec![100]), Some(&sink)).unwrap();
        assert!(result.visualization.is_none());
        assert!(sink.labels().is_empty());

        let mut options = band_options(vec![100]);
        options.visualize = true;
        let result = assemble_text(&page, &recognizer, &options, Some(&sink)).unwrap();
        let report = result.visualization.unwrap();
        assert_eq!(report.best.as_deref(), Some("h100-all_selected_rows"));
        assert_eq!(sink.labels(), vec!["h100-row_000", "h100-all_selected_rows"]);
    }

    #[test]
    fn test_extract_rows_sparse_fallback() {
        let page = banded_page(300, 200, &[Band::new(20, 30, 0, &["x"])]);
        let recognizer = ScriptedRecognizer::boxes(vec![word(0, 20, 30, "ab")])
            .with_full_text("a much longer whole page reading");
        let mut options = band_options(vec![100]);

        let extraction = extract_rows(&page, &recognizer, &options, 100, 33, None).unwrap();
        assert_eq!(extraction.text, "ab");
        assert!(!extraction.used_fallback);
        assert_eq!(recognizer.text_calls(), 0);

        options.sparse_row_fallback = true;
        let extraction = extract_rows(&page, &recognizer, &options, 100, 33, None).unwrap();
        assert_eq!(extraction.text, "a much longer whole page reading");
        assert!(extraction.used_fallback);
    }

    #[test]
    fn test_highlight_boxes_reads_in_block_mode() {
        let page = crate::testing::white_page(200, 100);
        let mut faint = word(0, 60, 20, "faint");
        faint.confidence = 10.0;
        let recognizer = ScriptedRecognizer::boxes(vec![word(100, 40, 20, "other")])
            .with_mode(SegmentationMode::Block, vec![word(5, 10, 20, "Invoice"), faint]);
        let sink = RecordingSink::default();

        let result = highlight_boxes(&page, &recognizer, &AssemblyOptions::default(), &sink, "boxes").unwrap();

        assert_eq!(result.visualization, "boxes");
        assert_eq!(result.boxes.len(), 1);
        assert_eq!(
            sink.regions(),
            vec![vec![HighlightRegion { x: 5, y: 10, width: 70, height: 20 }]]
        );
    }

    #[test]
    fn test_auto_window_height_is_derived_per_page() {
        let page = banded_page(300, 200, &[Band::new(20, 30, 0, &["Invoice"])]);
        let recognizer = ScriptedRecognizer::boxes(vec![word(0, 20, 60, "Invoice")]);
        let mut options = band_options(vec![50]);
        options.auto_window_height = true;

        let result = assemble_text(&page, &recognizer, &options, None).unwrap();
        assert_eq!(result.text, "Invoice");
        // Median word height 60 gives 150 instead of the configured 50
        assert_eq!(result.strategy, Some(CandidateSource::Window { height: 150 }));

        let selection = select_text(&page, &recognizer, &options, None).unwrap();
        assert_eq!(
            selection.best_candidate().map(|c| c.source),
            Some(CandidateSource::Window { height: 150 })
        );
    }

    #[test]
    fn test_suggest_row_height_uses_median() {
        let page = crate::testing::white_page(100, 100);
        let recognizer = ScriptedRecognizer::boxes(vec![word(0, 0, 20, "a"), word(0, 40, 20, "b")]);
        assert_eq!(suggest_row_height(&page, &recognizer, &AssemblyOptions::default()), 50);
    }

    #[test]
    fn test_join_pages_single() {
        assert_eq!(join_pages(["only"], "== {n} =="), "== 1 ==\nonly");
        assert_eq!(join_pages(Vec::<&str>::new(), "== {n} =="), "");
    }
}
