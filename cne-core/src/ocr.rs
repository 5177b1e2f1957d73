//! Deterministic OCR stub: decodes the uploaded file (or, for a ZIP archive,
//! each of its members in name order) as UTF-8 text and scores each
//! non-blank line with a heuristic confidence. Grounded in
//! `original_source/worker/src/ocr.py`'s zipfile handling, with a per-line
//! confidence score layered on top of that stub.

use std::io::Read;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::OcrLine;

const LOW_CONFIDENCE_TOKENS: [&str; 3] = ["incerta", "aguardando", "§"];

fn score_line(line: &str) -> f64 {
    let lowered = line.to_lowercase();
    let mut confidence = 0.98_f64;
    if LOW_CONFIDENCE_TOKENS.iter().any(|t| lowered.contains(t)) {
        confidence -= 0.20;
    }
    if line.chars().any(|c| c.is_ascii_digit()) {
        confidence -= 0.02;
    }
    confidence.clamp(0.0, 1.0)
}

fn lines_from_text(text: &str) -> Vec<OcrLine> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| OcrLine {
            text: line.to_string(),
            confidence: score_line(line),
        })
        .collect()
}

/// Peeks the local-file-header magic bytes (`PK\x03\x04`) rather than
/// trusting the filename, matching `zipfile.is_zipfile`'s content-based test.
fn is_zip_file(path: &Path) -> Result<bool> {
    let mut file = std::fs::File::open(path)?;
    let mut signature = [0u8; 4];
    match file.read_exact(&mut signature) {
        Ok(()) => Ok(signature == *b"PK\x03\x04"),
        Err(_) => Ok(false),
    }
}

/// Runs OCR over a single uploaded file, returning ordered lines with a
/// confidence score each.
pub fn run_ocr(path: &Path) -> Result<Vec<OcrLine>> {
    if is_zip_file(path)? {
        return run_ocr_zip(path);
    }
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(lines_from_text(&text))
}

fn run_ocr_zip(path: &Path) -> Result<Vec<OcrLine>> {
    let file = std::fs::File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| AppError::Parse(format!("invalid zip archive: {e}")))?;

    let mut names: Vec<String> = (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
        .filter(|name| !name.ends_with('/'))
        .collect();
    names.sort();

    let mut lines = Vec::new();
    for name in names {
        let mut entry = archive
            .by_name(&name)
            .map_err(|e| AppError::Parse(format!("zip member {name}: {e}")))?;
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        let text = String::from_utf8_lossy(&bytes);
        lines.extend(lines_from_text(&text));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn scores_plain_line_high() {
        let lines = lines_from_text("Orgao: Assembleia da Republica\n\nLista: Lista Unica");
        assert_eq!(lines.len(), 2);
        assert!((lines[0].confidence - 0.98).abs() < 1e-9);
    }

    #[test]
    fn low_confidence_tokens_and_digits_lower_score() {
        let lines = lines_from_text("dados incerta pagina 12");
        assert_eq!(lines.len(), 1);
        assert!((lines[0].confidence - 0.76).abs() < 1e-9);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let lines = lines_from_text("a\n\n   \nb");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn run_ocr_reads_plain_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "Orgao: Camara\nLista: Lista Unica\n").unwrap();
        let lines = run_ocr(&path).unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn run_ocr_flattens_zip_members_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.zip");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file("b.txt", options).unwrap();
        zip.write_all(b"second").unwrap();
        zip.start_file("a.txt", options).unwrap();
        zip.write_all(b"first").unwrap();
        zip.finish().unwrap();

        let lines = run_ocr(&path).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "first");
        assert_eq!(lines[1].text, "second");
    }

    #[test]
    fn run_ocr_detects_zip_by_content_when_extension_is_wrong() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file("a.txt", options).unwrap();
        zip.write_all(b"from archive").unwrap();
        zip.finish().unwrap();

        let lines = run_ocr(&path).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "from archive");
    }

    #[test]
    fn run_ocr_treats_non_zip_file_named_zip_as_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.zip");
        std::fs::write(&path, "Orgao: Camara\n").unwrap();
        let lines = run_ocr(&path).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Orgao: Camara");
    }
}
