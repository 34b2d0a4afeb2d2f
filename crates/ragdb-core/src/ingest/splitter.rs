use std::collections::VecDeque;

use crate::error::{Error, Result};

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Recursive character splitter: tries paragraph, line, then word boundaries,
/// and packs pieces into windows of at most `chunk_size` characters that
/// overlap by up to `chunk_overlap` characters.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self { Self { chunk_size: 1000, chunk_overlap: 200 } }
}

fn char_len(s: &str) -> usize { s.chars().count() }

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 { return Err(Error::InvalidConfig("chunk_size must be > 0".into())); }
        if chunk_overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!("chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})")));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }


    pub fn split(&self, text: &str) -> Vec<String> { self.split_with(text, &SEPARATORS) }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = "";
        let mut rest: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() || text.contains(sep) {
                separator = sep;
                rest = &separators[i + 1..];
                break;
            }
        }

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).map(str::to_string).collect()
        };

        let mut out = Vec::new();
        let mut good: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() { out.extend(self.merge(&good, separator)); good.clear(); }
            if rest.is_empty() { out.push(piece); } else { out.extend(self.split_with(&piece, rest)); }
        }
        if !good.is_empty() { out.extend(self.merge(&good, separator)); }
        out
    }

    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;
        let joiner = |current: &VecDeque<&str>| if current.is_empty() { 0 } else { sep_len };
        for piece in pieces {
            let len = char_len(piece);
            if !current.is_empty() && total + len + joiner(&current) > self.chunk_size {
                push_joined(&mut docs, &current, separator);
                // drop from the front until only the overlap tail remains
                while total > self.chunk_overlap || (total > 0 && total + len + joiner(&current) > self.chunk_size) {
                    let Some(front) = current.pop_front() else { break };
                    total -= char_len(front) + joiner(&current);
                }
            }
            total += len + joiner(&current);
            current.push_back(piece);
        }
        push_joined(&mut docs, &current, separator);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, current: &VecDeque<&str>, separator: &str) {
    let joined = current.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() { docs.push(trimmed.to_string()); }
}
