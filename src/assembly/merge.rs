//! Row merging
//!
//! Collapses windows that overlap vertically and read the same text into
//! one logical row.

use super::scanner::RowResult;
use super::text::{similarity, text_len};

/// A collapsed group: the retained text and the window it came from
struct MergedRow<'a> {
    anchor_y: u32,
    text: &'a str,
}

impl MergedRow<'_> {
    /// True while `y` starts inside this group's anchor window
    fn overlaps(&self, y: u32, window_height: u32) -> bool {
        y < self.anchor_y.saturating_add(window_height)
    }
}

/// Merge overlapping rows into line strings, top to bottom
///
/// A row joins the earliest group whose anchor window it starts in
/// (`y < anchor_y + window_height`) and whose retained text is similar
/// above `threshold`. The longer text is retained, and its window becomes
/// the anchor. A row matching no open group opens a new one, so rows that
/// overlap but read differently are kept as separate lines. Groups are
/// emitted in the order they were opened.
pub fn merge_rows(rows: &[RowResult], window_height: u32, threshold: f64) -> Vec<String> {
    let merged = rows
        .iter()
        .filter(|row| !row.text.is_empty())
        .fold(Vec::<MergedRow>::new(), |mut merged, row| {
            let group = merged.iter_mut().find(|group| {
                group.overlaps(row.y_offset, window_height)
                    && similarity(group.text, &row.text) > threshold
            });

            match group {
                Some(group) => {
                    if text_len(&row.text) > text_len(group.text) {
                        *group = MergedRow {
                            anchor_y: row.y_offset,
                            text: &row.text,
                        };
                    }
                }
                None => merged.push(MergedRow {
                    anchor_y: row.y_offset,
                    text: &row.text,
                }),
            }
            merged
        });

    merged.into_iter().map(|m| m.text.to_string()).collect()
}
