use std::fs;
use tempfile::TempDir;

use ragdb_cli::{build_retriever, ingest};
use ragdb_core::config::{BoostRule, Settings};
use ragdb_core::Modality;

fn settings_in(dir: &std::path::Path) -> Settings {
    let mut s = Settings::default();
    s.store.base_path = dir.join("index/rag").to_string_lossy().to_string();
    s.embedding.use_fake = true;
    s
}

fn write_corpus(dir: &std::path::Path) {
    fs::write(
        dir.join("ibuprofen.json"),
        r#"{"drug_name": "Ibuprofen", "uses": "Relief of pain and fever", "dosage_info": "200 to 400 mg every 4 to 6 hours", "warnings": "Take with food"}"#,
    )
    .unwrap();
    fs::write(dir.join("notes.md"), "Boil water for one minute before drinking.").unwrap();
    fs::write(dir.join("wound_dressing.png"), [0x89u8, b'P', b'N', b'G', 0, 1, 2, 3]).unwrap();
}

#[test]
fn ingest_then_query_over_both_modalities() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    fs::create_dir_all(&data).unwrap();
    write_corpus(&data);
    let settings = settings_in(tmp.path());

    let report = ingest(&settings, &data, None, false).expect("ingest");
    assert_eq!(report.added.get(&Modality::Text), Some(&4));
    assert_eq!(report.added.get(&Modality::Image), Some(&1));

    let mut retriever = build_retriever(&settings).expect("retriever");
    let results = retriever.retrieve("ibuprofen dosage mg", 2, &[Modality::Text, Modality::Image]);
    assert_eq!(results[0].chunk.section(), Some("dosage_info"));
    assert_eq!(results.last().unwrap().chunk.modality(), Modality::Image);
}

#[test]
fn configured_boost_reaches_the_retriever() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    fs::create_dir_all(&data).unwrap();
    write_corpus(&data);
    let mut settings = settings_in(tmp.path());
    settings.retrieval.use_reranker = false;
    settings.boost.enabled = true;
    settings.boost.rules = vec![BoostRule { keywords: vec!["warning".into()], sections: vec!["warnings".into()] }];
    ingest(&settings, &data, None, false).expect("ingest");

    let mut retriever = build_retriever(&settings).expect("retriever");
    let results = retriever.retrieve("ibuprofen warnings", 1, &[Modality::Text]);
    assert_eq!(results[0].chunk.section(), Some("warnings"));
}
