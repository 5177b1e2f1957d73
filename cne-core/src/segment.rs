//! Buckets layout entries by the first matching keyword, then hands back a
//! single stream reconstructed in original OCR order so downstream stages
//! see the document the way it was scanned regardless of bucketing.

use std::collections::HashMap;

use crate::models::LayoutEntry;

const SEGMENT_KEYS: [&str; 3] = ["orgao", "lista", "tipo"];

pub fn segment(layout: Vec<LayoutEntry>) -> HashMap<&'static str, Vec<LayoutEntry>> {
    let mut buckets: HashMap<&'static str, Vec<LayoutEntry>> = HashMap::new();
    for entry in layout {
        let lowered = entry.content.to_lowercase();
        let key = SEGMENT_KEYS
            .iter()
            .find(|k| lowered.contains(*k))
            .copied()
            .unwrap_or("body");
        buckets.entry(key).or_default().push(entry);
    }
    buckets
}

/// Flattens segmented buckets back into original OCR order, as the
/// extractor expects a single ordered stream of lines.
pub fn reorder(buckets: HashMap<&'static str, Vec<LayoutEntry>>) -> Vec<LayoutEntry> {
    let mut entries: Vec<LayoutEntry> = buckets.into_values().flatten().collect();
    entries.sort_by_key(|e| e.index);
    entries
}
