//! Per-row and cross-row validation over normalized records, using raw,
//! pre-normalization text where the rules call for it. The badge merge
//! algebra and field set go well past
//! `original_source/worker/src/validate.py`'s single required-column sweep.

use std::collections::HashMap;

use regex::Regex;

use crate::fuzzy::{match_sigla, ratio, FUZZY_CUTOFF, FUZZY_WARNING_THRESHOLD};
use crate::models::{BadgeStatus, CanonicalRecord, MasterRecord, RawRecord, ValidationBadge};

pub const FIELD_ORDER: [&str; 6] = ["orgao", "lista", "tipo", "sigla", "dtmnfr", "num_ordem"];

const RAW_TIPO_VOCAB: [&str; 3] = ["TITULAR", "SUPLENTE", "GCE"];

/// Context threaded through from the pipeline orchestrator: pre-normalization
/// records (for rules that need raw text) and the document's mean OCR
/// confidence.
pub struct ValidationContext<'a> {
    pub raw_records: &'a [RawRecord],
    pub ocr_conf_mean: f64,
}

fn orgao_pattern() -> Regex {
    Regex::new(r"^[\p{L}\p{N}ºª .,'/&()\-]+$").expect("static validator regex")
}

fn badge(status: BadgeStatus, message: impl Into<String>) -> ValidationBadge {
    ValidationBadge { field: String::new(), status, message: Some(message.into()) }
}

fn badge_ok() -> ValidationBadge {
    ValidationBadge { field: String::new(), status: BadgeStatus::Ok, message: None }
}

/// Applies the merge algebra: higher severity always wins; equal severity
/// appends the new message unless it already appears in the existing one;
/// lower severity updates are dropped.
fn merge(row: &mut HashMap<&'static str, ValidationBadge>, field: &'static str, incoming: ValidationBadge) {
    match row.get_mut(field) {
        None => {
            row.insert(field, incoming);
        }
        Some(existing) => {
            if incoming.status > existing.status {
                *existing = incoming;
            } else if incoming.status == existing.status {
                match (&existing.message, &incoming.message) {
                    (Some(existing_msg), Some(new_msg)) => {
                        if !existing_msg.contains(new_msg.as_str()) {
                            existing.message = Some(format!("{existing_msg}; {new_msg}"));
                        }
                    }
                    (None, Some(new_msg)) => existing.message = Some(new_msg.clone()),
                    _ => {}
                }
            }
        }
    }
}

fn is_valid_date(value: &str) -> bool {
    let iso = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    let br = Regex::new(r"^\d{2}/\d{2}/\d{4}$").unwrap();
    iso.is_match(value) || br.is_match(value)
}

fn validate_row(
    canonical: &CanonicalRecord,
    raw: &RawRecord,
    master: &HashMap<String, MasterRecord>,
) -> HashMap<&'static str, ValidationBadge> {
    let mut row: HashMap<&'static str, ValidationBadge> = HashMap::new();

    if canonical.orgao.is_empty() {
        merge(&mut row, "orgao", badge(BadgeStatus::Erro, "Valor obrigatório ausente"));
    } else if !orgao_pattern().is_match(&canonical.orgao) {
        merge(&mut row, "orgao", badge(BadgeStatus::Aviso, "Formato de órgão inesperado"));
    } else {
        merge(&mut row, "orgao", badge_ok());
    }

    if canonical.nome_lista.is_empty() {
        merge(&mut row, "lista", badge(BadgeStatus::Erro, "Valor obrigatório ausente"));
    } else {
        merge(&mut row, "lista", badge_ok());
    }

    if canonical.tipo.is_empty() {
        merge(&mut row, "tipo", badge(BadgeStatus::Erro, "Valor obrigatório ausente"));
    } else {
        merge(&mut row, "tipo", badge_ok());
    }
    let raw_tipo = raw.get("TIPO").trim().to_uppercase();
    if !raw_tipo.is_empty() && !RAW_TIPO_VOCAB.contains(&raw_tipo.as_str()) {
        merge(&mut row, "tipo", badge(BadgeStatus::Erro, "Tipo inválido"));
    }

    if canonical.sigla.is_empty() {
        merge(&mut row, "sigla", badge(BadgeStatus::Aviso, "Sigla ausente"));
    } else {
        merge(&mut row, "sigla", badge_ok());
    }
    let sigla_source = if !raw.raw_sigla.trim().is_empty() { raw.raw_sigla.trim() } else { canonical.sigla.as_str() };
    let (_, metadata) = match_sigla(sigla_source, master);
    match metadata {
        None => merge(&mut row, "sigla", badge(BadgeStatus::Erro, "Sigla não encontrada no cadastro mestre")),
        Some(record) => {
            let quality = ratio(&sigla_source.to_uppercase(), &record.sigla.to_uppercase());
            if quality < FUZZY_CUTOFF {
                merge(&mut row, "sigla", badge(BadgeStatus::Erro, "Diferença grande em relação ao cadastro mestre"));
            } else if quality < FUZZY_WARNING_THRESHOLD {
                merge(&mut row, "sigla", badge(BadgeStatus::Aviso, "Sigla ajustada para cadastro mestre"));
            } else {
                merge(&mut row, "sigla", badge_ok());
            }
        }
    }

    if canonical.dtmnfr.is_empty() {
        merge(&mut row, "dtmnfr", badge(BadgeStatus::Aviso, "Data de nomeação ausente"));
    } else if !is_valid_date(&canonical.dtmnfr) {
        merge(&mut row, "dtmnfr", badge(BadgeStatus::Erro, "Formato de data inválido"));
    } else {
        merge(&mut row, "dtmnfr", badge_ok());
    }

    if canonical.num_ordem.is_empty() {
        merge(&mut row, "num_ordem", badge(BadgeStatus::Erro, "Número de ordem ausente"));
    } else if canonical.num_ordem.parse::<i64>().is_err() {
        merge(&mut row, "num_ordem", badge(BadgeStatus::Erro, "Número de ordem inválido"));
    } else {
        merge(&mut row, "num_ordem", badge_ok());
    }

    row
}

fn apply_num_ordem_sequence(records: &[CanonicalRecord], rows: &mut [HashMap<&'static str, ValidationBadge>]) {
    let mut by_lista: HashMap<String, Vec<(i64, usize)>> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        if let Ok(number) = record.num_ordem.parse::<i64>() {
            by_lista.entry(record.nome_lista.to_lowercase()).or_default().push((number, index));
        }
    }

    for (lista, mut entries) in by_lista {
        entries.sort_by_key(|(number, index)| (*number, *index));
        for (position, (actual, index)) in entries.iter().enumerate() {
            let expected = position as i64 + 1;
            if *actual != expected {
                merge(
                    &mut rows[*index],
                    "num_ordem",
                    badge(
                        BadgeStatus::Aviso,
                        format!("Número de ordem esperado {expected} para a lista '{lista}'"),
                    ),
                );
            }
        }
    }
}

fn apply_missing_alternates(records: &[CanonicalRecord], rows: &mut [HashMap<&'static str, ValidationBadge>]) {
    let mut first_row_for_lista: HashMap<String, usize> = HashMap::new();
    let mut has_titular: HashMap<String, bool> = HashMap::new();
    let mut has_suplente: HashMap<String, bool> = HashMap::new();

    for (index, record) in records.iter().enumerate() {
        if record.nome_lista.is_empty() {
            continue;
        }
        let key = record.nome_lista.to_lowercase();
        first_row_for_lista.entry(key.clone()).or_insert(index);
        if record.tipo == "2" {
            has_titular.insert(key.clone(), true);
        }
        if record.tipo == "3" {
            has_suplente.insert(key.clone(), true);
        }
    }

    for (lista, first_index) in first_row_for_lista {
        if *has_titular.get(&lista).unwrap_or(&false) && !*has_suplente.get(&lista).unwrap_or(&false) {
            merge(&mut rows[first_index], "lista", badge(BadgeStatus::Aviso, "Lista sem suplentes cadastrados"));
        }
    }
}

/// Validates a normalized batch against its pre-normalization context,
/// returning one ordered badge list per row.
pub fn validate(
    records: &[CanonicalRecord],
    master: &HashMap<String, MasterRecord>,
    context: &ValidationContext,
) -> Vec<Vec<ValidationBadge>> {
    let mut rows: Vec<HashMap<&'static str, ValidationBadge>> = records
        .iter()
        .zip(context.raw_records.iter())
        .map(|(canonical, raw)| validate_row(canonical, raw, master))
        .collect();

    apply_num_ordem_sequence(records, &mut rows);
    apply_missing_alternates(records, &mut rows);

    rows.into_iter()
        .map(|row| {
            FIELD_ORDER
                .iter()
                .filter_map(|field| row.get(field).map(|badge| ValidationBadge { field: field.to_string(), ..badge.clone() }))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_with_tipo(tipo: &str) -> RawRecord {
        let mut record = RawRecord::default();
        record.set("TIPO", tipo);
        record
    }

    fn canonical(orgao: &str, lista: &str, tipo: &str, sigla: &str, dtmnfr: &str, num_ordem: &str) -> CanonicalRecord {
        CanonicalRecord {
            dtmnfr: dtmnfr.to_string(),
            orgao: orgao.to_string(),
            tipo: tipo.to_string(),
            sigla: sigla.to_string(),
            simbolo: String::new(),
            nome_lista: lista.to_string(),
            num_ordem: num_ordem.to_string(),
            nome_candidato: "Alice".to_string(),
            partido_proponente: String::new(),
            independente: String::new(),
        }
    }

    fn master_with(sigla: &str, descricao: &str) -> HashMap<String, MasterRecord> {
        let mut map = HashMap::new();
        map.insert(
            sigla.to_string(),
            MasterRecord { sigla: sigla.to_string(), descricao: descricao.to_string(), codigo: "1".into(), metadata: HashMap::new() },
        );
        map
    }

    #[test]
    fn missing_required_fields_yield_erro() {
        let records = vec![canonical("", "", "", "", "", "")];
        let raw = vec![raw_with_tipo("")];
        let master = HashMap::new();
        let context = ValidationContext { raw_records: &raw, ocr_conf_mean: 0.9 };
        let rows = validate(&records, &master, &context);
        let badges = &rows[0];
        let orgao = badges.iter().find(|b| b.field == "orgao").unwrap();
        assert_eq!(orgao.status, BadgeStatus::Erro);
        let sigla = badges.iter().find(|b| b.field == "sigla").unwrap();
        assert_eq!(sigla.status, BadgeStatus::Erro);
    }

    #[test]
    fn invalid_raw_tipo_text_is_erro() {
        let records = vec![canonical("Camara", "Lista Unica", "2", "ABC", "2024-01-15", "1")];
        let raw = vec![raw_with_tipo("DESCONHECIDO")];
        let master = master_with("ABC", "Aliança");
        let context = ValidationContext { raw_records: &raw, ocr_conf_mean: 0.9 };
        let rows = validate(&records, &master, &context);
        let tipo = rows[0].iter().find(|b| b.field == "tipo").unwrap();
        assert_eq!(tipo.status, BadgeStatus::Erro);
        assert_eq!(tipo.message.as_deref(), Some("Tipo inválido"));
    }

    #[test]
    fn date_format_validation_accepts_iso_and_br() {
        let records = vec![
            canonical("Camara", "Lista Unica", "2", "ABC", "2024-01-15", "1"),
            canonical("Camara", "Lista Unica", "2", "ABC", "15/01/2024", "2"),
            canonical("Camara", "Lista Unica", "2", "ABC", "15-01-2024", "3"),
        ];
        let raw = vec![raw_with_tipo("TITULAR"), raw_with_tipo("TITULAR"), raw_with_tipo("TITULAR")];
        let master = master_with("ABC", "Aliança");
        let context = ValidationContext { raw_records: &raw, ocr_conf_mean: 0.9 };
        let rows = validate(&records, &master, &context);
        assert_eq!(rows[0].iter().find(|b| b.field == "dtmnfr").unwrap().status, BadgeStatus::Ok);
        assert_eq!(rows[1].iter().find(|b| b.field == "dtmnfr").unwrap().status, BadgeStatus::Ok);
        assert_eq!(rows[2].iter().find(|b| b.field == "dtmnfr").unwrap().status, BadgeStatus::Erro);
    }

    #[test]
    fn num_ordem_sequence_gap_emits_aviso() {
        let records = vec![
            canonical("Camara", "Lista Unica", "2", "ABC", "2024-01-15", "1"),
            canonical("Camara", "Lista Unica", "2", "ABC", "2024-01-15", "3"),
        ];
        let raw = vec![raw_with_tipo("TITULAR"), raw_with_tipo("TITULAR")];
        let master = master_with("ABC", "Aliança");
        let context = ValidationContext { raw_records: &raw, ocr_conf_mean: 0.9 };
        let rows = validate(&records, &master, &context);
        assert_eq!(rows[0].iter().find(|b| b.field == "num_ordem").unwrap().status, BadgeStatus::Ok);
        assert_eq!(rows[1].iter().find(|b| b.field == "num_ordem").unwrap().status, BadgeStatus::Aviso);
    }

    #[test]
    fn lista_with_titular_but_no_suplente_is_flagged_on_first_row() {
        let records = vec![
            canonical("Camara", "Lista Unica", "2", "ABC", "2024-01-15", "1"),
            canonical("Camara", "Lista Unica", "2", "ABC", "2024-01-15", "2"),
        ];
        let raw = vec![raw_with_tipo("TITULAR"), raw_with_tipo("TITULAR")];
        let master = master_with("ABC", "Aliança");
        let context = ValidationContext { raw_records: &raw, ocr_conf_mean: 0.9 };
        let rows = validate(&records, &master, &context);
        let lista = rows[0].iter().find(|b| b.field == "lista").unwrap();
        assert_eq!(lista.status, BadgeStatus::Aviso);
        assert_eq!(lista.message.as_deref(), Some("Lista sem suplentes cadastrados"));
    }

    #[test]
    fn sigla_quality_ok_when_ratio_above_warning_threshold() {
        let records = vec![canonical("Camara", "Lista Unica", "2", "ABC", "2024-01-15", "1")];
        let raw = vec![raw_with_tipo("TITULAR")];
        let master = master_with("ABC", "Aliança");
        let context = ValidationContext { raw_records: &raw, ocr_conf_mean: 0.9 };
        let rows = validate(&records, &master, &context);
        assert_eq!(rows[0].iter().find(|b| b.field == "sigla").unwrap().status, BadgeStatus::Ok);
    }

    #[test]
    fn field_order_is_stable_across_rows() {
        let records = vec![canonical("Camara", "Lista Unica", "2", "ABC", "2024-01-15", "1")];
        let raw = vec![raw_with_tipo("TITULAR")];
        let master = master_with("ABC", "Aliança");
        let context = ValidationContext { raw_records: &raw, ocr_conf_mean: 0.9 };
        let rows = validate(&records, &master, &context);
        let fields: Vec<&str> = rows[0].iter().map(|b| b.field.as_str()).collect();
        assert_eq!(fields, vec!["orgao", "lista", "tipo", "sigla", "dtmnfr", "num_ordem"]);
    }
}
