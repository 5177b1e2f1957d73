//! Line-stream to raw-record extraction using the `label: value` grammar and
//! its record-terminator heuristics. Grounded line-by-line in
//! `original_source/worker/src/extract.py`.

use std::collections::HashMap;

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::models::{LayoutEntry, RawRecord};

const TERMINAL_COLUMNS: [&str; 4] = ["ORGAO", "NOME_LISTA", "TIPO", "NOME_CANDIDATO"];

fn field_mapping(key: &str) -> Option<&'static str> {
    match key {
        "dtmnfr" | "competencia" => Some("DTMNFR"),
        "orgao" => Some("ORGAO"),
        "lista" => Some("NOME_LISTA"),
        "tipo" => Some("TIPO"),
        "sigla" => Some("SIGLA"),
        "descricao" => Some("NOME_CANDIDATO"),
        "partido_proponente" => Some("PARTIDO_PROPONENTE"),
        _ => None,
    }
}

const METADATA_MAPPING: [(&str, &str); 1] = [("dtmnfr", "DTMNFR")];

/// Normalizes a label via Unicode decomposition (stripping combining marks),
/// lowercasing, and folding `-`/space into `_`.
fn normalize_key(label: &str) -> String {
    let stripped: String = label.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    stripped.to_lowercase().replace('-', "_").replace(' ', "_")
}

fn extract_metadata(entries: &[LayoutEntry]) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    for entry in entries {
        let text = entry.content.trim();
        if text.is_empty() {
            continue;
        }
        if text.to_lowercase().starts_with("orgao") {
            break;
        }
        let Some((prefix, value)) = text.split_once(':') else {
            continue;
        };
        let key = normalize_key(prefix.trim());
        metadata.insert(key, value.trim().to_string());
    }
    metadata
}

/// Extracts raw records from an ordered, already-segmented line stream.
pub fn extract_records(entries: Vec<LayoutEntry>) -> Vec<RawRecord> {
    let metadata = extract_metadata(&entries);
    let mut records = Vec::new();
    let mut current = RawRecord::default();

    let finalize = |current: &mut RawRecord, records: &mut Vec<RawRecord>| {
        if current.any_of(&TERMINAL_COLUMNS) {
            let mut record = std::mem::take(current);
            for (meta_key, column) in METADATA_MAPPING {
                if record.get(column).is_empty() {
                    if let Some(value) = metadata.get(meta_key) {
                        record.set(column, value.clone());
                    }
                }
            }
            records.push(record);
        } else {
            *current = RawRecord::default();
        }
    };

    for entry in &entries {
        let text = entry.content.trim();
        if text.is_empty() {
            if current.any_of(&TERMINAL_COLUMNS) {
                finalize(&mut current, &mut records);
            }
            continue;
        }

        if let Some((prefix, value)) = text.split_once(':') {
            let key = normalize_key(prefix.trim());
            let value = value.trim();
            let Some(column) = field_mapping(&key) else {
                continue;
            };

            if column == "ORGAO" && !current.get("ORGAO").is_empty() {
                finalize(&mut current, &mut records);
            }
            if column == "NOME_LISTA" {
                current.raw_lista = value.to_string();
            }
            if column == "SIGLA" {
                current.raw_sigla = value.to_string();
            }
            if column == "NOME_CANDIDATO" {
                let existing = current.get(column);
                let joined: String = [existing, value]
                    .into_iter()
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                current.set(column, joined);
            } else {
                current.set(column, value);
            }
        } else if current.any_of(&TERMINAL_COLUMNS) {
            let existing = current.get("NOME_CANDIDATO");
            let joined: String = [existing, text]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            current.set("NOME_CANDIDATO", joined);
        }
    }

    finalize(&mut current, &mut records);
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::detect_layout;
    use crate::models::OcrLine;
    use crate::segment::{reorder, segment};

    fn entries_from(text: &str) -> Vec<LayoutEntry> {
        let lines: Vec<OcrLine> = text
            .lines()
            .map(|l| OcrLine { text: l.trim().to_string(), confidence: 1.0 })
            .collect();
        reorder(segment(detect_layout(&lines)))
    }

    #[test]
    fn normalize_key_strips_accents_and_folds_separators() {
        assert_eq!(normalize_key("Competência"), "competencia");
        assert_eq!(normalize_key("Partido-Proponente"), "partido_proponente");
        assert_eq!(normalize_key("Número Ordem"), "numero_ordem");
    }

    #[test]
    fn basic_stanza_yields_one_record() {
        let entries = entries_from(
            "DTMNFR: 2024-01-15\nOrgao: Assembleia\nLista: Coligacao Educacao & Cidadania\nTipo: Titular\nSigla: ABC\nDescricao: Maria Silva\nPartido_Proponente: X",
        );
        let records = extract_records(entries);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.get("ORGAO"), "Assembleia");
        assert_eq!(record.raw_lista, "Coligacao Educacao & Cidadania");
        assert_eq!(record.get("NOME_CANDIDATO"), "Maria Silva");
        assert_eq!(record.get("DTMNFR"), "2024-01-15");
    }

    #[test]
    fn second_orgao_finalizes_previous_record() {
        let entries = entries_from(
            "Orgao: A\nLista: Lista Unica\nTipo: Titular\nDescricao: Alice\nOrgao: B\nLista: Lista Unica\nTipo: Titular\nDescricao: Bob",
        );
        let records = extract_records(entries);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("ORGAO"), "A");
        assert_eq!(records[1].get("ORGAO"), "B");
    }

    #[test]
    fn blank_line_finalizes_record_with_terminal_field() {
        let entries = entries_from("Orgao: A\nLista: Lista Unica\nTipo: Titular\n\nDescricao: trailing orphan");
        let records = extract_records(entries);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("NOME_CANDIDATO"), "");
    }

    #[test]
    fn plain_text_lines_append_to_candidate_name() {
        let entries = entries_from("Orgao: A\nLista: Lista Unica\nTipo: Titular\nDescricao: Maria\ncontinued surname");
        let records = extract_records(entries);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("NOME_CANDIDATO"), "Maria continued surname");
    }

    #[test]
    fn metadata_default_fills_missing_dtmnfr() {
        let entries = entries_from("DTMNFR: 2024-03-01\nOrgao: A\nLista: Lista Unica\nTipo: Titular\nDescricao: Maria");
        let records = extract_records(entries);
        assert_eq!(records[0].get("DTMNFR"), "2024-03-01");
    }
}
