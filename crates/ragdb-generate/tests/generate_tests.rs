use ragdb_core::config::GenerationSettings;
use ragdb_core::traits::GenerationClient;
use ragdb_core::{Chunk, QueryResult, ScoreOrder};
use ragdb_generate::OllamaClient;

#[test]
fn unreachable_server_yields_an_error_fragment() {
    let settings = GenerationSettings { ollama_url: "http://127.0.0.1:9".into(), ..GenerationSettings::default() };
    let client = OllamaClient::from_settings(&settings).expect("client");
    let results = vec![QueryResult { chunk: Chunk::text("a", "a.txt", "context"), score: 1.0, order: ScoreOrder::HigherIsBetter }];

    let fragments: Vec<String> = client.generate_stream("question", &results).collect();
    assert_eq!(fragments.len(), 1);
    assert!(fragments[0].starts_with("\n[Error connecting to Ollama:"));
    assert!(client.generate("question", &results).contains("Error connecting to Ollama"));
}
