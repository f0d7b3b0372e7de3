//! HuggingFace Hub download and BERT checkpoint loading shared by the
//! embedder and the cross-encoder.

use anyhow::{Context, Result};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::{Tokenizer, TruncationParams};

/// A BERT checkpoint ready for inference
pub struct LoadedBert {
    pub model: BertModel,
    pub tokenizer: Tokenizer,
    pub config: Config,
    /// Kept so callers can load extra heads from the same weights
    pub vars: VarBuilder<'static>,
}

/// Download (or reuse the cache of) `model_id` and load it on `device`
pub fn load_bert(model_id: &str, max_length: usize, device: &Device) -> Result<LoadedBert> {
    let api = Api::new().context("Failed to create HuggingFace API client")?;
    let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

    let config_path = repo
        .get("config.json")
        .with_context(|| format!("Failed to download config for {}", model_id))?;
    let tokenizer_path = repo
        .get("tokenizer.json")
        .with_context(|| format!("Failed to download tokenizer for {}", model_id))?;
    let weights_path = repo
        .get("model.safetensors")
        .with_context(|| format!("Failed to download weights for {}", model_id))?;

    let config_contents =
        std::fs::read_to_string(config_path).context("Failed to read model config")?;
    let config: Config =
        serde_json::from_str(&config_contents).context("Failed to parse model config")?;

    let mut tokenizer = Tokenizer::from_file(tokenizer_path)
        .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;

    // SAFETY: the safetensors file is owned by the hub cache and not
    // modified while mapped.
    let vars = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
            .context("Failed to load model weights")?
    };

    let model = BertModel::load(vars.clone(), &config).context("Failed to create BERT model")?;

    Ok(LoadedBert {
        model,
        tokenizer,
        config,
        vars,
    })
}

/// Pad token id lists to a rectangular batch, returning ids and mask
pub fn pad_batch(
    token_ids: &[Vec<u32>],
    type_ids: &[Vec<u32>],
) -> (Vec<u32>, Vec<u32>, Vec<u32>, usize) {
    let max_len = token_ids.iter().map(|ids| ids.len()).max().unwrap_or(0);
    let batch_size = token_ids.len();

    let mut flat_ids = vec![0u32; batch_size * max_len];
    let mut flat_types = vec![0u32; batch_size * max_len];
    let mut flat_mask = vec![0u32; batch_size * max_len];

    for (row, ids) in token_ids.iter().enumerate() {
        let offset = row * max_len;
        flat_ids[offset..offset + ids.len()].copy_from_slice(ids);
        for slot in &mut flat_mask[offset..offset + ids.len()] {
            *slot = 1;
        }
        if let Some(types) = type_ids.get(row) {
            flat_types[offset..offset + types.len()].copy_from_slice(types);
        }
    }

    (flat_ids, flat_types, flat_mask, max_len)
}
