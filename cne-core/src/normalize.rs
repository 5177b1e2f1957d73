//! Turns raw extracted records into canonical rows: TIPO coding, list/symbol
//! splitting, sigla resolution against the master cache, and the
//! context-scoped NUM_ORDEM counter. Grounded in
//! `original_source/worker/src/normalize.py`.

use std::collections::HashMap;

use crate::fuzzy::match_sigla;
use crate::models::{CanonicalRecord, MasterRecord, RawRecord};

fn normalize_tipo(value: &str) -> String {
    let upper = value.trim().to_uppercase();
    if upper.is_empty() {
        return String::new();
    }
    if upper.starts_with("TITULAR") {
        return "2".to_string();
    }
    if upper.starts_with("SUPLENTE") {
        return "3".to_string();
    }
    if upper == "2" || upper == "3" {
        return upper;
    }
    "3".to_string()
}

fn split_lista(raw_value: &str) -> (String, String) {
    let value = raw_value.trim();
    if value.is_empty() {
        return (String::new(), String::new());
    }

    let lower = value.to_lowercase();
    let mut working = value.to_string();
    let mut removed_prefix = false;
    if lower.starts_with("coligacao ") {
        working = value["Coligacao ".len().min(value.len())..].trim().to_string();
        removed_prefix = true;
    }

    if let Some(pos) = working.rfind(" - ") {
        let name = working[..pos].trim().to_string();
        let symbol = working[pos + 3..].trim().to_string();
        return (name, symbol);
    }

    if let (Some(open), Some(close_rel)) = (working.find('('), working.find(')')) {
        if close_rel > open {
            let name = working[..open].trim().to_string();
            let symbol = working[open + 1..close_rel].trim().to_string();
            return (name, symbol);
        }
    }

    if let Some(pos) = value.find('§') {
        let left = value[..pos].trim();
        let right = value[pos + '§'.len_utf8()..].trim();
        let symbol = left.split_whitespace().last().unwrap_or("").to_string();
        let name = if right.is_empty() { working.clone() } else { right.to_string() };
        return (name, symbol);
    }

    if removed_prefix {
        let acronym: String = working
            .split(|c: char| !c.is_alphabetic())
            .filter(|tok| !tok.is_empty())
            .filter_map(|tok| tok.chars().next())
            .collect::<String>()
            .to_uppercase();
        return (working, acronym);
    }

    (value.to_string(), String::new())
}

fn is_independent(raw_lista: &str) -> String {
    let lowered = raw_lista.to_lowercase();
    if lowered.is_empty() {
        return String::new();
    }
    if lowered.contains("coligacao") {
        return "N".to_string();
    }
    if lowered.contains("lista unica") {
        return "S".to_string();
    }
    "N".to_string()
}

/// Normalizes a stream of raw records against the master acronym catalogue,
/// producing canonical rows in input order.
pub fn normalize(records: &[RawRecord], master: &HashMap<String, MasterRecord>) -> Vec<CanonicalRecord> {
    let mut counters: HashMap<(String, String, String, String, String), u64> = HashMap::new();
    let mut normalized = Vec::with_capacity(records.len());

    for record in records {
        let dtmnfr = record.get("DTMNFR").trim().to_string();
        let orgao = record.get("ORGAO").trim().to_string();
        let tipo = normalize_tipo(record.get("TIPO"));

        let raw_lista = record.raw_lista.trim().to_string();
        let (nome_lista, simbolo) = split_lista(&raw_lista);
        let independente = is_independent(&raw_lista);

        let sigla_value = record.get("SIGLA").trim().to_string();
        let sigla_raw = if !record.raw_sigla.trim().is_empty() {
            record.raw_sigla.trim().to_string()
        } else {
            sigla_value.clone()
        };
        let mut partido = record.get("PARTIDO_PROPONENTE").trim().to_string();

        let candidate = if !sigla_raw.is_empty() {
            Some(sigla_raw.clone())
        } else if !sigla_value.is_empty() {
            Some(sigla_value.clone())
        } else {
            None
        };

        let mut sigla = String::new();
        if let Some(candidate) = candidate {
            let (resolved, metadata) = match_sigla(&candidate, master);
            if let Some(metadata) = metadata {
                partido = metadata.descricao.clone();
                sigla = resolved;
            } else {
                if partido.is_empty() && !sigla_raw.is_empty() {
                    partido = sigla_raw.to_uppercase();
                }
                sigla = resolved;
            }
        }
        if sigla.is_empty() {
            sigla = if !sigla_raw.is_empty() {
                sigla_raw.to_uppercase()
            } else {
                sigla_value.to_uppercase()
            };
        }

        let nome_candidato = record
            .get("NOME_CANDIDATO")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let counter_key = (
            dtmnfr.clone(),
            orgao.to_uppercase(),
            sigla.to_uppercase(),
            nome_lista.to_uppercase(),
            tipo.clone(),
        );
        let num_ordem = if tipo.is_empty() {
            String::new()
        } else {
            let counter = counters.entry(counter_key).or_insert(0);
            *counter += 1;
            counter.to_string()
        };

        normalized.push(CanonicalRecord {
            dtmnfr,
            orgao,
            tipo,
            sigla,
            simbolo,
            nome_lista,
            num_ordem,
            nome_candidato,
            partido_proponente: partido,
            independente,
        });
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(dtmnfr: &str, orgao: &str, tipo: &str, raw_lista: &str, raw_sigla: &str, candidato: &str) -> RawRecord {
        let mut record = RawRecord::default();
        record.set("DTMNFR", dtmnfr);
        record.set("ORGAO", orgao);
        record.set("TIPO", tipo);
        record.set("NOME_CANDIDATO", candidato);
        record.raw_lista = raw_lista.to_string();
        record.raw_sigla = raw_sigla.to_string();
        record
    }

    #[test]
    fn tipo_titular_and_suplente_map_to_codes() {
        assert_eq!(normalize_tipo("Titular"), "2");
        assert_eq!(normalize_tipo("suplente"), "3");
        assert_eq!(normalize_tipo(""), "");
        assert_eq!(normalize_tipo("GCE"), "3");
    }

    #[test]
    fn split_lista_handles_dash_parenthesis_and_coligacao() {
        assert_eq!(split_lista("Partido Azul - PAZ"), ("Partido Azul".into(), "PAZ".into()));
        assert_eq!(split_lista("Partido Verde (PVE)"), ("Partido Verde".into(), "PVE".into()));
        let (name, symbol) = split_lista("Coligacao Frente Democratica");
        assert_eq!(name, "Frente Democratica");
        assert_eq!(symbol, "FD");
    }

    #[test]
    fn is_independent_flags_coligacao_and_lista_unica() {
        assert_eq!(is_independent("Coligacao Azul"), "N");
        assert_eq!(is_independent("Lista Unica"), "S");
        assert_eq!(is_independent(""), "");
        assert_eq!(is_independent("Partido Verde"), "N");
    }

    #[test]
    fn num_ordem_increments_within_context_and_resets_across_contexts() {
        let records = vec![
            raw("2024-01-15", "Camara", "Titular", "Lista Unica", "ABC", "Alice"),
            raw("2024-01-15", "Camara", "Titular", "Lista Unica", "ABC", "Bruno"),
            raw("2024-01-15", "Senado", "Titular", "Lista Unica", "ABC", "Carla"),
        ];
        let master = HashMap::new();
        let normalized = normalize(&records, &master);
        assert_eq!(normalized[0].num_ordem, "1");
        assert_eq!(normalized[1].num_ordem, "2");
        assert_eq!(normalized[2].num_ordem, "1");
    }

    #[test]
    fn empty_tipo_yields_empty_num_ordem() {
        let records = vec![raw("2024-01-15", "Camara", "", "Lista Unica", "ABC", "Alice")];
        let master = HashMap::new();
        let normalized = normalize(&records, &master);
        assert_eq!(normalized[0].num_ordem, "");
    }

    #[test]
    fn sigla_falls_back_to_uppercased_raw_when_no_master_match() {
        let records = vec![raw("2024-01-15", "Camara", "Titular", "Lista Unica", "xyz", "Alice")];
        let master = HashMap::new();
        let normalized = normalize(&records, &master);
        assert_eq!(normalized[0].sigla, "XYZ");
        assert_eq!(normalized[0].partido_proponente, "XYZ");
    }

    #[test]
    fn sigla_resolves_against_master_and_adopts_descricao() {
        let mut master = HashMap::new();
        master.insert(
            "ABC".to_string(),
            MasterRecord {
                sigla: "ABC".to_string(),
                descricao: "Aliança do Bem Comum".to_string(),
                codigo: "001".to_string(),
                metadata: HashMap::new(),
            },
        );
        let records = vec![raw("2024-01-15", "Camara", "Titular", "Lista Unica", "abc", "Alice")];
        let normalized = normalize(&records, &master);
        assert_eq!(normalized[0].sigla, "ABC");
        assert_eq!(normalized[0].partido_proponente, "Aliança do Bem Comum");
    }

    #[test]
    fn candidate_name_whitespace_is_collapsed() {
        let records = vec![raw("2024-01-15", "Camara", "Titular", "Lista Unica", "ABC", "Maria   da   Silva")];
        let master = HashMap::new();
        let normalized = normalize(&records, &master);
        assert_eq!(normalized[0].nome_candidato, "Maria da Silva");
    }
}
