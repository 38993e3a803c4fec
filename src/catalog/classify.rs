//! Filename heuristics for model artifacts
//!
//! Pure keyword matching over lowercased names and paths. Each classifier
//! checks its keyword groups in a fixed priority order; the first match wins.

use super::{ModelType, ModelVariant};
use regex::Regex;
use std::sync::LazyLock;

/// File extensions that always denote model weights
pub const MODEL_EXTENSIONS: &[&str] = &["bin", "gguf", "ggml", "safetensors", "pt", "pth"];

/// Name fragments that mark a file as a model artifact
pub const MODEL_KEYWORDS: &[&str] = &[
    "model",
    "weights",
    "checkpoint",
    "ckpt",
    "bigdaddyg",
    "twinsie",
    "stealth",
    "cheetah",
    "mini",
];

/// Content-addressed blob marker used by Ollama's model store
pub const BLOB_MARKER: &str = "sha256-";

/// Prefix of names synthesized for content-addressed blobs
pub const BLOB_NAME_PREFIX: &str = "ollama-blob-";

const BLOB_NAME_HASH_CHARS: usize = 16;

const CUSTOM_KEYWORDS: &[&str] = &["bigdaddyg", "custom", "finetune", "fine-tune", "trained"];

static QUANT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[-_.](i?q\d+(_[a-z0-9]+)*|f16|fp16|f32|fp32|bf16|int4|int8)$")
        .expect("quantization suffix pattern is valid")
});

/// Whether `filename` looks like a model artifact
pub fn is_model_file(filename: &str) -> bool {
    if has_model_extension(filename) {
        return true;
    }

    let lower = filename.to_lowercase();
    MODEL_KEYWORDS.iter().any(|kw| lower.contains(kw)) || filename.contains(BLOB_MARKER)
}

fn has_model_extension(filename: &str) -> bool {
    model_extension(filename).is_some()
}

/// The model extension of `filename` (without the dot), if it has one
fn model_extension(filename: &str) -> Option<&str> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    MODEL_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
        .then_some(ext)
}

/// Derive a human-readable catalog name from a filename
///
/// Blob files get a deterministic synthetic name; everything else loses its
/// model extension and any trailing quantization/precision tags.
pub fn extract_model_name(filename: &str) -> String {
    if let Some(idx) = filename.find(BLOB_MARKER) {
        let hash: String = filename[idx + BLOB_MARKER.len()..]
            .chars()
            .take(BLOB_NAME_HASH_CHARS)
            .collect();
        return format!("{}{}", BLOB_NAME_PREFIX, hash);
    }

    let mut name = match model_extension(filename) {
        Some(ext) => &filename[..filename.len() - ext.len() - 1],
        None => filename,
    };

    while let Some(m) = QUANT_SUFFIX.find(name) {
        if m.start() == 0 {
            break;
        }
        name = &name[..m.start()];
    }

    name.to_string()
}

/// Classify a model by keywords in its path
pub fn detect_model_type(path: &str) -> ModelType {
    let lower = path.to_lowercase();
    let has = |keywords: &[&str]| keywords.iter().any(|kw| lower.contains(kw));

    if is_custom_model(&lower) {
        ModelType::CustomTrained
    } else if has(&["embed"]) {
        ModelType::Embedding
    } else if has(&["vision", "llava", "clip", "multimodal"]) {
        ModelType::Multimodal
    } else if has(&["code", "coder", "starcoder", "codellama", "deepseek"]) {
        ModelType::Code
    } else if has(&["instruct"]) {
        ModelType::Instruction
    } else if has(&["chat"]) {
        ModelType::Chat
    } else {
        ModelType::General
    }
}

/// Whether a model name marks a custom-trained model
pub fn is_custom_model(name: &str) -> bool {
    let lower = name.to_lowercase();
    CUSTOM_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Product variant encoded in a model name
pub fn detect_variant(name: &str) -> ModelVariant {
    let lower = name.to_lowercase();
    [
        ("twinsie", ModelVariant::Twinsie),
        ("cheetah", ModelVariant::Cheetah),
        ("stealth", ModelVariant::Stealth),
        ("mini", ModelVariant::Mini),
        ("custom", ModelVariant::Custom),
    ]
    .into_iter()
    .find(|(kw, _)| lower.contains(kw))
    .map(|(_, variant)| variant)
    .unwrap_or_default()
}
