//! Drug information sheets: one JSON record per drug, split into one text
//! chunk per section so section-aware ranking can target them.

use serde::Deserialize;

use crate::error::Result;
use crate::types::{Chunk, SECTION_KEY};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DrugInfo {
    pub drug_name: String,
    #[serde(default)]
    pub drug_class: String,
    #[serde(default)]
    pub uses: String,
    #[serde(default)]
    pub dosage_info: String,
    #[serde(default)]
    pub common_side_effects: String,
    #[serde(default)]
    pub serious_side_effects: String,
    #[serde(default)]
    pub contraindications: String,
    #[serde(default)]
    pub warnings: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DrugFile {
    Many(Vec<DrugInfo>),
    One(DrugInfo),
}

impl DrugInfo {
    pub fn sections(&self) -> [(&'static str, &str); 7] {
        [
            ("drug_class", self.drug_class.as_str()),
            ("uses", self.uses.as_str()),
            ("dosage_info", self.dosage_info.as_str()),
            ("common_side_effects", self.common_side_effects.as_str()),
            ("serious_side_effects", self.serious_side_effects.as_str()),
            ("contraindications", self.contraindications.as_str()),
            ("warnings", self.warnings.as_str()),
        ]
    }

    /// One chunk per non-empty section. The drug name is repeated in every
    /// chunk body so each one embeds on its own. Ids are
    /// `<doc_id>:<record>:<drug>:<section>`, where `record` is the position of
    /// this entry in its sheet, so repeated drugs never share an id.
    pub fn to_chunks(&self, doc_id: &str, record: usize, source_file: &str) -> Vec<Chunk> {
        let key = self.drug_name.trim().to_lowercase().replace(char::is_whitespace, "_");
        self.sections()
            .into_iter()
            .filter(|(_, body)| !body.trim().is_empty())
            .map(|(section, body)| {
                let title = section.replace('_', " ");
                Chunk::text(format!("{doc_id}:{record}:{key}:{section}"), source_file, format!("{} - {}: {}", self.drug_name.trim(), title, body.trim()))
                    .with_meta(SECTION_KEY, section)
                    .with_meta("drug_name", self.drug_name.trim())
                    .with_meta("drug_class", self.drug_class.trim())
                    .with_meta("source", self.source.trim())
                    .with_meta("file_type", "json")
            })
            .collect()
    }
}

/// Parse a sheet holding either one record or an array of records.
pub fn parse_drug_sheet(content: &str) -> Result<Vec<DrugInfo>> {
    Ok(match serde_json::from_str::<DrugFile>(content)? {
        DrugFile::Many(v) => v,
        DrugFile::One(d) => vec![d],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"{
        "drug_name": "Ibuprofen",
        "drug_class": "NSAID",
        "uses": "Pain and fever relief",
        "dosage_info": "200-400 mg every 4-6 hours",
        "common_side_effects": "Upset stomach",
        "serious_side_effects": "",
        "contraindications": "Active GI bleeding",
        "warnings": "Take with food",
        "source": "label"
    }"#;

    #[test]
    fn one_chunk_per_non_empty_section() {
        let drugs = parse_drug_sheet(SHEET).expect("parse");
        let chunks = drugs[0].to_chunks("ibuprofen.json", 0, "data/ibuprofen.json");
        assert_eq!(chunks.len(), 6, "empty serious_side_effects is skipped");
        let dosage = chunks.iter().find(|c| c.section() == Some("dosage_info")).expect("dosage chunk");
        assert_eq!(dosage.id, "ibuprofen.json:0:ibuprofen:dosage_info");
        assert!(dosage.text_content().unwrap().starts_with("Ibuprofen - dosage info:"));
        assert_eq!(dosage.metadata.get("drug_class").map(String::as_str), Some("NSAID"));
    }

    #[test]
    fn arrays_of_records_are_accepted() {
        let sheet = format!("[{SHEET}, {{\"drug_name\": \"Aspirin\", \"uses\": \"Pain\"}}]");
        let drugs = parse_drug_sheet(&sheet).expect("parse");
        assert_eq!(drugs.len(), 2);
        assert_eq!(drugs[1].to_chunks("x.json", 1, "x.json").len(), 1);
    }

    #[test]
    fn malformed_sheet_is_an_error() {
        assert!(parse_drug_sheet("{\"name\": 1}").is_err());
    }
}
