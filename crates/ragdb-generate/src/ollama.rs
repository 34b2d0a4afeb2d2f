//! Streaming client for a local Ollama server (`POST /api/generate`).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::{BufRead, BufReader};
use std::time::Duration;
use tracing::{error, info};

use ragdb_core::config::GenerationSettings;
use ragdb_core::traits::GenerationClient;
use ragdb_core::QueryResult;

use crate::prompt::build_prompt;

/// One NDJSON line of a streamed generation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamLine {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

pub fn error_fragment(e: &anyhow::Error) -> String { format!("\n[Error connecting to Ollama: {e:#}]") }

/// Pull-driven iterator over the fragments of an NDJSON body. Stops after the
/// `done` line, at end of input, or after yielding one error fragment.
pub struct FragmentStream<R> {
    reader: Option<R>,
}

impl<R: BufRead> FragmentStream<R> {
    pub fn new(reader: R) -> Self { Self { reader: Some(reader) } }

    fn next_line(reader: &mut R) -> Result<Option<StreamLine>> {
        let mut buf = String::new();
        loop {
            buf.clear();
            if reader.read_line(&mut buf).context("reading response stream")? == 0 { return Ok(None); }
            let line = buf.trim();
            if line.is_empty() { continue; }
            return Ok(Some(serde_json::from_str(line).with_context(|| format!("malformed stream line: {line}"))?));
        }
    }
}

impl<R: BufRead> Iterator for FragmentStream<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let reader = self.reader.as_mut()?;
        match Self::next_line(reader) {
            Ok(Some(line)) => {
                if line.done { self.reader = None; }
                Some(line.response)
            }
            Ok(None) => {
                self.reader = None;
                None
            }
            Err(e) => {
                error!("Ollama streaming failed: {:#}", e);
                self.reader = None;
                Some(error_fragment(&e))
            }
        }
    }
}

pub struct OllamaClient {
    base_url: String,
    model: String,
    temperature: f32,
    client: reqwest::blocking::Client,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, temperature: f32) -> Result<Self> {
        // the blocking client otherwise times out after 30s, well within a long generation
        let client = reqwest::blocking::Client::builder().timeout(None::<Duration>).build()?;
        Ok(Self { base_url: base_url.into().trim_end_matches('/').to_string(), model: model.into(), temperature, client })
    }

    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        Self::new(&settings.ollama_url, &settings.model, settings.temperature)
    }

    pub fn request_body(&self, prompt: &str, stream: bool) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": stream,
            "options": { "temperature": self.temperature },
        })
    }

    fn open_stream(&self, prompt: &str) -> Result<BufReader<reqwest::blocking::Response>> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self.client.post(&url).json(&self.request_body(prompt, true)).send().with_context(|| format!("POST {url}"))?;
        let response = response.error_for_status()?;
        Ok(BufReader::new(response))
    }
}

impl GenerationClient for OllamaClient {
    fn generate_stream<'a>(&'a self, query: &str, results: &[QueryResult]) -> Box<dyn Iterator<Item = String> + 'a> {
        let prompt = build_prompt(query, results);
        info!("Streaming from Ollama ({})...", self.model);
        match self.open_stream(&prompt) {
            Ok(reader) => Box::new(FragmentStream::new(reader)),
            Err(e) => {
                error!("Ollama streaming failed: {:#}", e);
                Box::new(std::iter::once(error_fragment(&e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn fragments_stop_at_done() {
        let body = "{\"response\":\"Take \",\"done\":false}\n\n{\"response\":\"with food.\",\"done\":false}\n{\"response\":\"\",\"done\":true}\n{\"response\":\"ignored\"}\n";
        let out: Vec<String> = FragmentStream::new(Cursor::new(body)).collect();
        assert_eq!(out, vec!["Take ", "with food.", ""]);
    }

    #[test]
    fn malformed_line_yields_one_error_fragment() {
        let body = "{\"response\":\"ok\"}\nnot json\n{\"response\":\"never\"}\n";
        let out: Vec<String> = FragmentStream::new(Cursor::new(body)).collect();
        assert_eq!(out.len(), 2);
        assert!(out[1].starts_with("\n[Error connecting to Ollama:"));
    }

    #[test]
    fn consumer_may_stop_early() {
        let body = "{\"response\":\"a\"}\n{\"response\":\"b\"}\n";
        let mut s = FragmentStream::new(Cursor::new(body));
        assert_eq!(s.next().as_deref(), Some("a"));
    }

    #[test]
    fn request_body_carries_options() {
        let c = OllamaClient::new("http://localhost:11434/", "mistral", 0.7).unwrap();
        let body = c.request_body("p", true);
        assert_eq!(body["model"], "mistral");
        assert_eq!(body["stream"], true);
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert_eq!(c.base_url, "http://localhost:11434");
    }
}
