//! Talks to an OpenAI-compatible embeddings API.
//! Entirely optional — without MNEMO_EMBED_URL the engine runs keyword-only.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::MnemoError;

fn embed_err(msg: impl Into<String>) -> MnemoError {
    MnemoError::EmbedBackend(msg.into())
}

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct EmbedConfig {
    pub url: String,
    pub key: String,
    pub model: String,
    pub client: reqwest::Client,
}

impl EmbedConfig {
    /// Returns `None` if `MNEMO_EMBED_URL` is not set.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("MNEMO_EMBED_URL").ok()?;
        let key = std::env::var("MNEMO_EMBED_KEY").unwrap_or_default();
        let model = std::env::var("MNEMO_EMBED_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".into());

        let client = reqwest::Client::builder()
            .timeout(EMBED_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Some(Self { url, key, model, client })
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Deserialize)]
struct EmbedDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Fetch embeddings for a batch of texts. Order matches the input slice.
pub async fn get_embeddings(
    cfg: &EmbedConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, MnemoError> {
    if texts.is_empty() {
        return Ok(vec![]);
    }

    let req = EmbedRequest { model: &cfg.model, input: texts };
    let mut builder = cfg.client.post(&cfg.url).json(&req);
    if !cfg.key.is_empty() {
        builder = builder.header("Authorization", format!("Bearer {}", cfg.key));
    }

    let resp = builder
        .send()
        .await
        .map_err(|e| embed_err(format!("embed request failed: {e}")))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(embed_err(format!("embed backend returned {status}: {body}")));
    }

    let parsed: EmbedResponse = resp
        .json()
        .await
        .map_err(|e| embed_err(format!("embed response parse failed: {e}")))?;

    let mut data = parsed.data;
    data.sort_by_key(|d| d.index);
    if data.len() != texts.len() {
        return Err(embed_err(format!(
            "embed backend returned {} vectors for {} inputs",
            data.len(),
            texts.len()
        )));
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for i in 0..a.len() {
        let (ai, bi) = (a[i] as f64, b[i] as f64);
        dot += ai * bi;
        na += ai * ai;
        nb += bi * bi;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Serialize an f32 vector to bytes (little-endian) for SQLite BLOB storage.
pub fn embedding_to_bytes(v: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(v.len() * 4);
    for &f in v {
        buf.extend_from_slice(&f.to_le_bytes());
    }
    buf
}

/// Deserialize bytes back to an f32 vector.
pub fn bytes_to_embedding(b: &[u8]) -> Vec<f32> {
    b.chunks_exact(4)
        .map(|chunk| {
            let arr: [u8; 4] = chunk.try_into().expect("4 bytes");
            f32::from_le_bytes(arr)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_same_vec() {
        let v: Vec<f32> = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-10);
    }

    #[test]
    fn cosine_perpendicular() {
        let a: Vec<f32> = vec![1.0, 0.0];
        let b: Vec<f32> = vec![0.0, 1.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-10);
    }

    #[test]
    fn cosine_empty() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn embedding_roundtrip() {
        let original: Vec<f32> = vec![1.0, -2.5, 3.125, 0.0, f32::MAX];
        let bytes = embedding_to_bytes(&original);
        let decoded = bytes_to_embedding(&bytes);
        assert_eq!(original, decoded);
    }
}
