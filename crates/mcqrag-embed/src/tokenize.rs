use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// XLM-RoBERTa `<pad>` id, used when the tokenizer does not declare one.
const DEFAULT_PAD_ID: u32 = 1;

pub fn pad_id(tokenizer: &Tokenizer) -> u32 {
    tokenizer.token_to_id("<pad>").unwrap_or(DEFAULT_PAD_ID)
}

/// Tokenize `texts` into `[B, T]` id and mask tensors.
///
/// Each sequence is truncated to `max_len`; `T` is the longest sequence in the
/// batch so short batches do not pay for full-length padding.
pub fn tokenize_batch_on_device(
    tokenizer: &Tokenizer,
    texts: &[String],
    max_len: usize,
    device: &Device,
) -> Result<(Tensor, Tensor)> {
    let pad = pad_id(tokenizer);
    let mut rows: Vec<(Vec<u32>, Vec<u32>)> = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer
            .encode(text.as_str(), true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        ids.truncate(max_len);
        mask.truncate(max_len);
        rows.push((ids, mask));
    }
    let width = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);

    let mut flat_ids = Vec::with_capacity(rows.len() * width);
    let mut flat_mask = Vec::with_capacity(rows.len() * width);
    for (mut ids, mut mask) in rows {
        ids.resize(width, pad);
        mask.resize(width, 0);
        flat_ids.extend(ids.into_iter().map(i64::from));
        flat_mask.extend(mask.into_iter().map(i64::from));
    }
    let input_ids = Tensor::from_vec(flat_ids, (texts.len(), width), device)?;
    let attention_mask = Tensor::from_vec(flat_mask, (texts.len(), width), device)?;
    Ok((input_ids, attention_mask))
}
