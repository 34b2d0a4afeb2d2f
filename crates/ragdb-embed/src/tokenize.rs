use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Pad id of XLM-RoBERTa vocabularies.
const PAD_ID: u32 = 1;

/// Encode `text`, truncate or pad to `max_len`, and return `(input_ids, attention_mask)` as [1, max_len].
pub fn tokenize_on_device(tokenizer: &Tokenizer, text: &str, max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let enc = tokenizer.encode(text, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let (ids, mask) = pad_to(enc.get_ids().to_vec(), enc.get_attention_mask().to_vec(), max_len);
    let input_ids = Tensor::from_iter(ids, device)?.reshape((1, max_len))?;
    let attention_mask = Tensor::from_iter(mask, device)?.reshape((1, max_len))?;
    Ok((input_ids, attention_mask))
}

fn pad_to(mut ids: Vec<u32>, mut mask: Vec<u32>, max_len: usize) -> (Vec<u32>, Vec<u32>) {
    ids.truncate(max_len);
    mask.truncate(max_len);
    let pad = max_len - ids.len();
    ids.extend(std::iter::repeat(PAD_ID).take(pad));
    mask.extend(std::iter::repeat(0).take(pad));
    (ids, mask)
}
