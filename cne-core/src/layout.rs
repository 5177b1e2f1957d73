//! Tags each OCR line with its section: the first line is the document
//! header, everything else is body.

use crate::models::{LayoutEntry, OcrLine, Section};

pub fn detect_layout(lines: &[OcrLine]) -> Vec<LayoutEntry> {
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| LayoutEntry {
            index,
            content: line.text.clone(),
            section: if index == 0 { Section::Header } else { Section::Body },
        })
        .collect()
}
