//! Fusion of the row-based reading with the global pass

use serde::Serialize;
use tracing::{debug, warn};

use super::selector::{CandidateSource, VisualizationReport};
use super::text::{longer, non_empty_lines, similarity};

/// Final text of one page
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FusionResult {
    pub text: String,
    /// The global text replaced the fused text
    pub used_fallback: bool,
    /// Strategy whose candidate won selection
    pub strategy: Option<CandidateSource>,
    /// Visualization references, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<VisualizationReport>,
}

/// Fuse `row_text` with `global_text` line by line
///
/// Each row line is paired with its most similar global line. Above
/// `threshold` the longer of the pair is kept (the global line on equal
/// length), otherwise the row line stays. When fewer than
/// `fallback_ratio x global lines` remain, the global text is returned as is.
pub fn fuse(row_text: &str, global_text: &str, threshold: f64, fallback_ratio: f64) -> FusionResult {
    let row_lines = non_empty_lines(row_text);
    let global_lines = non_empty_lines(global_text);

    let fused: Vec<&str> = row_lines
        .iter()
        .map(|&row_line| match best_match(row_line, &global_lines) {
            Some((global_line, score)) if score > threshold => longer(global_line, row_line),
            _ => row_line,
        })
        .collect();

    if (fused.len() as f64) < fallback_ratio * global_lines.len() as f64 {
        warn!(
            "Row output has {} lines against {} global lines, using global text",
            fused.len(),
            global_lines.len()
        );
        return FusionResult {
            text: global_text.to_string(),
            used_fallback: true,
            ..Default::default()
        };
    }

    debug!("Fused {} row lines with {} global lines", fused.len(), global_lines.len());
    FusionResult {
        text: fused.join("\n"),
        ..Default::default()
    }
}

/// Most similar candidate line; the first one wins ties
fn best_match<'a>(line: &str, candidates: &[&'a str]) -> Option<(&'a str, f64)> {
    candidates.iter().fold(None, |best, &candidate| {
        let score = similarity(line, candidate);
        match best {
            Some((_, best_score)) if score <= best_score => best,
            _ => Some((candidate, score)),
        }
    })
}
