//! Model resolution: turn a hub identifier or URL into a `ModelDescription`.
//!
//! `HubResolver` asks the model hub's REST API. `NameResolver` works offline
//! from the identifier alone (e.g. "llama-2-13b-gptq"). `FallbackResolver`
//! chains the two so a flaky network still yields an estimate.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::format::format_parameters;
use crate::models::{ModelDescription, Quantization};

pub const DEFAULT_HUB_URL: &str = "https://huggingface.co";
pub const HUB_URL_ENV: &str = "VRAMFIT_HUB_URL";
pub const HUB_TOKEN_ENV: &str = "HUGGING_FACE_TOKEN";

const HUB_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Resolver trait
// ---------------------------------------------------------------------------

/// Something that can describe a model from a user-supplied identifier.
pub trait ModelResolver {
    /// Human-readable name shown in logs and reports.
    fn name(&self) -> &str;

    fn resolve(&self, query: &str) -> Result<ResolvedModel>;
}

/// Where the description came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Hub,
    Heuristic,
}

/// A model description plus the metadata shown next to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedModel {
    pub id: String,
    pub name: String,
    pub hub_url: String,
    pub architecture: String,
    pub license: String,
    pub parameters_formatted: String,
    pub source: Source,
    pub description: ModelDescription,
}

/// Accepts `org/name`, `https://huggingface.co/org/name[/tree/main]`, or any
/// other URL whose last two path segments are `org/name`.
pub fn normalize_model_id(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let without_query = trimmed.split(['?', '#']).next().unwrap_or(trimmed);

    let id = if let Some(pos) = without_query.find("huggingface.co/") {
        let rest = &without_query[pos + "huggingface.co/".len()..];
        ["/tree/", "/blob/", "/resolve/"]
            .iter()
            .filter_map(|marker| rest.find(marker))
            .min()
            .map_or(rest, |end| &rest[..end])
            .trim_matches('/')
            .to_string()
    } else if let Some(rest) = without_query
        .strip_prefix("https://")
        .or_else(|| without_query.strip_prefix("http://"))
    {
        // Skip the host; the last two non-empty path segments are org/name.
        let segments: Vec<&str> = rest.split('/').skip(1).filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [.., org, name] => format!("{org}/{name}"),
            _ => return Err(Error::InvalidModelId(input.to_string())),
        }
    } else {
        without_query.trim_matches('/').to_string()
    };

    if id.is_empty() || id.contains(char::is_whitespace) {
        return Err(Error::InvalidModelId(input.to_string()));
    }
    Ok(id)
}

/// The part after the organisation, e.g. `Llama-2-7b-hf`.
fn short_name(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

// ---------------------------------------------------------------------------
// Name heuristics
// ---------------------------------------------------------------------------

/// `7b`, `13-b`, `1.5B`, `350m`, `70billion`; not part of a longer token.
static PARAM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9.])(\d+(?:\.\d+)?)[-_]?([bm])(?:illion)?(?:[^a-z]|$)")
        .expect("parameter pattern is valid")
});

/// Mixture-of-experts sizes such as `8x7B`.
static MOE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9.])(\d+)x(\d+(?:\.\d+)?)([bm])(?:[^a-z]|$)")
        .expect("MoE pattern is valid")
});

/// Parameter count implied by a model name, if any.
pub fn parameters_from_name(name: &str) -> Option<u64> {
    let scale = |unit: &str| {
        if unit.eq_ignore_ascii_case("m") {
            1e6
        } else {
            1e9
        }
    };

    if let Some(caps) = MOE_PATTERN.captures(name) {
        let experts: f64 = caps[1].parse().ok()?;
        let each: f64 = caps[2].parse().ok()?;
        return Some((experts * each * scale(&caps[3])).round() as u64);
    }
    if let Some(caps) = PARAM_PATTERN.captures(name) {
        let value: f64 = caps[1].parse().ok()?;
        return Some((value * scale(&caps[2])).round() as u64);
    }
    if name.to_lowercase().contains("llama-2") {
        return Some(7_000_000_000);
    }
    None
}

/// Quantization implied by keywords in an identifier or URL.
pub fn quantization_from_name(name: &str) -> Option<Quantization> {
    let lower = name.to_lowercase();
    [
        ("int8", Quantization::Int8),
        ("int4", Quantization::Int4),
        ("gptq", Quantization::Gptq),
        ("awq", Quantization::Awq),
        ("gguf", Quantization::Gguf),
    ]
    .into_iter()
    .find(|(keyword, _)| lower.contains(keyword))
    .map(|(_, quant)| quant)
}

/// Map a hub dtype tag (safetensors key or `torch_dtype`) onto a scheme.
pub fn quantization_from_dtype(dtype: &str) -> Quantization {
    let lower = dtype.trim().to_lowercase();
    let lower = lower.strip_prefix("torch.").unwrap_or(&lower);
    match lower {
        "f32" | "fp32" | "float32" => Quantization::Fp32,
        "f16" | "fp16" | "float16" | "bf16" | "bfloat16" => Quantization::Fp16,
        "i8" | "int8" | "u8" | "uint8" | "fp8" | "float8" => Quantization::Int8,
        "i4" | "int4" | "u4" => Quantization::Int4,
        // Safetensors spells 8-bit floats F8_E4M3 / F8_E5M2.
        other if other.starts_with("f8") || other.starts_with("float8") => Quantization::Int8,
        _ => Quantization::Unrecognized(dtype.trim().to_string()),
    }
}

pub fn architecture_from_name(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    [
        ("llama", "Llama"),
        ("mistral", "Mistral"),
        ("mixtral", "Mixtral"),
        ("gemma", "Gemma"),
        ("qwen", "Qwen"),
        ("falcon", "Falcon"),
        ("zephyr", "Zephyr"),
        ("t5", "T5"),
        ("phi", "Phi"),
    ]
    .into_iter()
    .find(|(keyword, _)| lower.contains(keyword))
    .map_or("Unknown", |(_, label)| label)
}

/// Typical context window for an architecture when nothing better is known.
pub fn default_context_for(architecture: &str) -> u32 {
    match architecture {
        "Llama" | "Mistral" => 4096,
        "Gemma" => 8192,
        "Qwen" => 32_768,
        _ => crate::models::DEFAULT_CONTEXT_LENGTH,
    }
}

fn license_from_id(id: &str) -> &'static str {
    if id.starts_with("meta-llama/") {
        "Meta Llama License"
    } else if id.starts_with("mistralai/") {
        "Apache 2.0"
    } else if id.starts_with("google/") {
        "Gemma Terms of Use"
    } else {
        "Unknown"
    }
}

/// Offline resolver: everything is inferred from the identifier text.
#[derive(Debug, Clone)]
pub struct NameResolver {
    base_url: String,
}

impl Default for NameResolver {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_HUB_URL.to_string(),
        }
    }
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub base used only to build `hub_url` links.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Resolve an already-normalised identifier.
    fn describe(&self, id: &str) -> Result<ResolvedModel> {
        let name = short_name(id);
        let parameter_count = parameters_from_name(name).ok_or_else(|| {
            Error::invalid(
                "parameter_count",
                format!("could not infer a parameter count from '{name}'"),
            )
        })?;
        let architecture = architecture_from_name(name);
        let quantization = quantization_from_name(id).unwrap_or_default();
        let description = ModelDescription::new(parameter_count, quantization)
            .with_context_length(default_context_for(architecture));

        Ok(ResolvedModel {
            id: id.to_string(),
            name: name.to_string(),
            hub_url: format!("{}/{}", self.base_url.trim_end_matches('/'), id),
            architecture: architecture.to_string(),
            license: license_from_id(id).to_string(),
            parameters_formatted: format_parameters(parameter_count),
            source: Source::Heuristic,
            description,
        })
    }
}

impl ModelResolver for NameResolver {
    fn name(&self) -> &str {
        "name heuristics"
    }

    fn resolve(&self, query: &str) -> Result<ResolvedModel> {
        let id = normalize_model_id(query)?;
        self.describe(&id)
    }
}

// ---------------------------------------------------------------------------
// Hub resolver
// ---------------------------------------------------------------------------

// -- JSON response types for the hub API --

#[derive(Debug, Default, Deserialize)]
pub struct HubModelInfo {
    #[serde(default)]
    safetensors: Option<SafetensorsInfo>,
    #[serde(default)]
    config: Option<HubConfigSummary>,
    #[serde(default, rename = "cardData")]
    card_data: Option<CardData>,
}

#[derive(Debug, Default, Deserialize)]
struct SafetensorsInfo {
    /// dtype -> parameter count, e.g. {"BF16": 6738415616}
    #[serde(default)]
    parameters: BTreeMap<String, u64>,
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct HubConfigSummary {
    #[serde(default)]
    model_type: Option<String>,
    #[serde(default)]
    torch_dtype: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CardData {
    /// A string, or occasionally a list of strings.
    #[serde(default)]
    license: Option<serde_json::Value>,
}

/// The subset of a repository's `config.json` the estimator can use.
/// Aliases cover GPT-2 and T5 style key names.
#[derive(Debug, Default, Deserialize)]
pub struct ModelConfigFile {
    #[serde(default, alias = "n_embd", alias = "d_model")]
    hidden_size: Option<u32>,
    #[serde(default, alias = "n_layer", alias = "num_layers")]
    num_hidden_layers: Option<u32>,
    #[serde(default, alias = "n_positions", alias = "max_sequence_length")]
    max_position_embeddings: Option<u32>,
    #[serde(default)]
    torch_dtype: Option<String>,
}

/// Resolves models through the hub's `/api/models/{id}` endpoint.
#[derive(Debug, Clone)]
pub struct HubResolver {
    base_url: String,
    token: Option<String>,
}

impl Default for HubResolver {
    fn default() -> Self {
        Self {
            base_url: std::env::var(HUB_URL_ENV).unwrap_or_else(|_| DEFAULT_HUB_URL.to_string()),
            token: std::env::var(HUB_TOKEN_ENV).ok().filter(|t| !t.is_empty()),
        }
    }
}

impl HubResolver {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    fn api_url(&self, id: &str) -> String {
        format!("{}/api/models/{}", self.base_url(), id)
    }

    fn config_url(&self, id: &str) -> String {
        format!("{}/{}/resolve/main/config.json", self.base_url(), id)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, id: &str) -> Result<T> {
        let mut request = ureq::get(url);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let resp = request
            .config()
            .timeout_global(Some(HUB_TIMEOUT))
            .build()
            .call()
            .map_err(|e| hub_error(id, e))?;
        resp.into_body().read_json().map_err(|e| hub_error(id, e))
    }

    /// Fetch `config.json` for architecture details. Missing or unreadable
    /// configs are not an error; the estimator has defaults.
    fn fetch_config(&self, id: &str) -> Option<ModelConfigFile> {
        match self.get_json(&self.config_url(id), id) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::debug!(model = id, error = %e, "no usable config.json");
                None
            }
        }
    }
}

fn hub_error(id: &str, err: ureq::Error) -> Error {
    match err {
        ureq::Error::StatusCode(401 | 403) => Error::Unauthorized(id.to_string()),
        ureq::Error::StatusCode(404) => Error::ModelNotFound(id.to_string()),
        ureq::Error::Io(e) => Error::Io(e),
        ureq::Error::Json(e) => Error::Json(e),
        other => Error::Http(other.to_string()),
    }
}

impl ModelResolver for HubResolver {
    fn name(&self) -> &str {
        "model hub"
    }

    fn resolve(&self, query: &str) -> Result<ResolvedModel> {
        let id = normalize_model_id(query)?;
        tracing::info!(model = %id, url = %self.api_url(&id), "querying hub");

        let info: HubModelInfo = self.get_json(&self.api_url(&id), &id)?;
        let config = self.fetch_config(&id);
        resolve_from_hub(&id, self.base_url(), &info, config.as_ref())
    }
}

/// Build a `ResolvedModel` from hub responses. Pure; separated from the
/// HTTP calls so it can be tested on fixtures.
pub fn resolve_from_hub(
    id: &str,
    base_url: &str,
    info: &HubModelInfo,
    config: Option<&ModelConfigFile>,
) -> Result<ResolvedModel> {
    let name = short_name(id);

    // The dominant dtype is the one holding most parameters.
    let dominant = info.safetensors.as_ref().and_then(|st| {
        st.parameters
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(dtype, count)| (dtype.as_str(), *count))
    });

    let dtype = dominant
        .map(|(dtype, _)| dtype.to_string())
        .or_else(|| info.config.as_ref().and_then(|c| c.torch_dtype.clone()))
        .or_else(|| config.and_then(|c| c.torch_dtype.clone()));
    let quantization = quantization_from_name(id)
        .or_else(|| dtype.as_deref().map(quantization_from_dtype))
        .unwrap_or_default();

    let parameter_count = info
        .safetensors
        .as_ref()
        .and_then(|st| unpacked_parameter_count(st, &quantization))
        .or_else(|| info.safetensors.as_ref().and_then(|st| st.total))
        .or(dominant.map(|(_, count)| count))
        .filter(|count| *count > 0)
        .or_else(|| {
            tracing::warn!(model = id, "hub reports no parameter count, using the name");
            parameters_from_name(name)
        })
        .ok_or_else(|| {
            Error::invalid(
                "parameter_count",
                format!("hub has no parameter count for '{id}' and the name has none"),
            )
        })?;

    let architecture = info
        .config
        .as_ref()
        .and_then(|c| c.model_type.as_deref())
        .map(title_case)
        .unwrap_or_else(|| architecture_from_name(name).to_string());

    let license = info
        .card_data
        .as_ref()
        .and_then(|c| c.license.as_ref())
        .and_then(license_text)
        .unwrap_or_else(|| license_from_id(id).to_string());

    let mut description = ModelDescription::new(parameter_count, quantization);
    description.context_length = Some(
        config
            .and_then(|c| c.max_position_embeddings)
            .map(|window| {
                if window > MAX_CONFIG_CONTEXT {
                    tracing::debug!(window, cap = MAX_CONFIG_CONTEXT, "capping context window");
                }
                window.min(MAX_CONFIG_CONTEXT)
            })
            .unwrap_or_else(|| default_context_for(&architecture)),
    );
    description.hidden_size = config.and_then(|c| c.hidden_size);
    description.num_layers = config.and_then(|c| c.num_hidden_layers);

    Ok(ResolvedModel {
        id: id.to_string(),
        name: name.to_string(),
        hub_url: format!("{}/{}", base_url.trim_end_matches('/'), id),
        architecture,
        license,
        parameters_formatted: format_parameters(parameter_count),
        source: Source::Hub,
        description,
    })
}

/// Upper bound on a context window read from `config.json`. Long-context
/// models advertise 128k+ windows that are rarely run at full length; use
/// `--context` to estimate one.
pub const MAX_CONFIG_CONTEXT: u32 = 8192;

/// 4-bit weights packed into 32-bit integers.
const VALUES_PER_PACKED_ELEMENT: u64 = 8;

/// Safetensors counts tensor elements, so GPTQ/AWQ/INT4 repos report one
/// parameter per `I32`/`U32` word that actually holds eight. `None` unless the
/// scheme is packed and such a bucket exists.
fn unpacked_parameter_count(st: &SafetensorsInfo, quantization: &Quantization) -> Option<u64> {
    let packed = matches!(
        quantization,
        Quantization::Gptq | Quantization::Awq | Quantization::Int4
    );
    let is_packed_dtype = |dtype: &str| matches!(dtype.to_ascii_uppercase().as_str(), "I32" | "U32");
    if !packed || !st.parameters.keys().any(|dtype| is_packed_dtype(dtype.as_str())) {
        return None;
    }

    let count: u64 = st
        .parameters
        .iter()
        .map(|(dtype, count)| {
            if is_packed_dtype(dtype.as_str()) {
                count * VALUES_PER_PACKED_ELEMENT
            } else {
                *count
            }
        })
        .sum();
    tracing::debug!(count, "unpacked 4-bit parameter count");
    Some(count)
}

fn license_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let names: Vec<&str> = items.iter().filter_map(|v| v.as_str()).collect();
            (!names.is_empty()).then(|| names.join(", "))
        }
        _ => None,
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Fallback chain
// ---------------------------------------------------------------------------

/// Hub first; name heuristics when the hub can't be reached.
/// Authorization and not-found answers from the hub are returned as-is.
pub struct FallbackResolver {
    primary: Box<dyn ModelResolver>,
    fallback: Box<dyn ModelResolver>,
}

impl FallbackResolver {
    pub fn new(primary: Box<dyn ModelResolver>, fallback: Box<dyn ModelResolver>) -> Self {
        Self { primary, fallback }
    }

    pub fn hub_then_name(hub: HubResolver) -> Self {
        let name = NameResolver::with_base_url(hub.base_url());
        Self::new(Box::new(hub), Box::new(name))
    }
}

impl ModelResolver for FallbackResolver {
    fn name(&self) -> &str {
        self.primary.name()
    }

    fn resolve(&self, query: &str) -> Result<ResolvedModel> {
        match self.primary.resolve(query) {
            Err(e) if e.is_transport() => {
                tracing::warn!(
                    error = %e,
                    fallback = self.fallback.name(),
                    "{} unavailable, falling back",
                    self.primary.name()
                );
                self.fallback.resolve(query)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ────────────────────────────────────────────────────────────────────
    // Identifier handling
    // ────────────────────────────────────────────────────────────────────

    #[test]
    fn test_normalize_model_id() {
        let cases = [
            ("meta-llama/Llama-2-7b-hf", "meta-llama/Llama-2-7b-hf"),
            (
                "https://huggingface.co/meta-llama/Llama-2-7b-hf",
                "meta-llama/Llama-2-7b-hf",
            ),
            (
                "https://huggingface.co/TheBloke/Llama-2-13B-GPTQ/tree/main/",
                "TheBloke/Llama-2-13B-GPTQ",
            ),
            ("huggingface.co/google/gemma-7b/", "google/gemma-7b"),
            ("https://example.com/models/org/name/", "org/name"),
            ("  gpt2  ", "gpt2"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_model_id(input).unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn test_normalize_rejects_empty_and_spaces() {
        assert!(matches!(
            normalize_model_id("  "),
            Err(Error::InvalidModelId(_))
        ));
        assert!(normalize_model_id("https://huggingface.co/").is_err());
        assert!(normalize_model_id("my model").is_err());
        for url in ["https://example.com/", "https://example.com", "http://example.com/org/"] {
            assert!(
                matches!(normalize_model_id(url), Err(Error::InvalidModelId(_))),
                "{url}"
            );
        }
    }

    #[test]
    fn test_long_context_windows_are_capped() {
        let info: HubModelInfo =
            serde_json::from_str(r#"{ "safetensors": { "total": 8030261248, "parameters": {} } }"#)
                .unwrap();
        let config: ModelConfigFile = serde_json::from_str(
            r#"{ "hidden_size": 4096, "num_hidden_layers": 32, "max_position_embeddings": 131072 }"#,
        )
        .unwrap();
        let model = resolve_from_hub(
            "meta-llama/Llama-3.1-8B",
            DEFAULT_HUB_URL,
            &info,
            Some(&config),
        )
        .unwrap();
        assert_eq!(model.description.context_length, Some(MAX_CONFIG_CONTEXT));
    }

    #[test]
    fn test_hub_error_mapping() {
        assert!(matches!(
            hub_error("org/x", ureq::Error::StatusCode(404)),
            Error::ModelNotFound(_)
        ));
        assert!(matches!(
            hub_error("org/x", ureq::Error::StatusCode(403)),
            Error::Unauthorized(_)
        ));
        assert!(matches!(
            hub_error("org/x", ureq::Error::StatusCode(500)),
            Error::Http(_)
        ));

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = hub_error("org/x", ureq::Error::Io(io));
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_transport());

        let bad_json = serde_json::from_str::<HubModelInfo>("not json").unwrap_err();
        let err = hub_error("org/x", ureq::Error::Json(bad_json));
        assert!(matches!(err, Error::Json(_)));
        assert!(!err.is_transport());
    }

    // ────────────────────────────────────────────────────────────────────
    // Name heuristics
    // ────────────────────────────────────────────────────────────────────

    #[test]
    fn test_parameters_from_name() {
        let cases = [
            ("Llama-2-7b-hf", Some(7_000_000_000)),
            ("llama-2-13b-chat", Some(13_000_000_000)),
            ("falcon-40b", Some(40_000_000_000)),
            ("Llama-3.1-8B-Instruct", Some(8_000_000_000)),
            ("TinyLlama-1.1B-Chat-v1.0", Some(1_100_000_000)),
            ("Qwen2.5-0.5B", Some(500_000_000)),
            ("opt-350m", Some(350_000_000)),
            ("model-7-b", Some(7_000_000_000)),
            ("Mixtral-8x7B-v0.1", Some(56_000_000_000)),
            ("llama-2-chat", Some(7_000_000_000)),
            ("bert-base-uncased", None),
            ("gemma-2b-bf16", Some(2_000_000_000)),
        ];
        for (name, expected) in cases {
            assert_eq!(parameters_from_name(name), expected, "{name}");
        }
    }

    #[test]
    fn test_quantization_from_name() {
        assert_eq!(
            quantization_from_name("TheBloke/Llama-2-7B-GPTQ"),
            Some(Quantization::Gptq)
        );
        assert_eq!(
            quantization_from_name("TheBloke/Mistral-7B-AWQ"),
            Some(Quantization::Awq)
        );
        assert_eq!(
            quantization_from_name("org/phi-2-gguf"),
            Some(Quantization::Gguf)
        );
        assert_eq!(
            quantization_from_name("org/model-int8"),
            Some(Quantization::Int8)
        );
        assert_eq!(quantization_from_name("meta-llama/Llama-2-7b-hf"), None);
    }

    #[test]
    fn test_quantization_from_dtype() {
        assert_eq!(quantization_from_dtype("F32"), Quantization::Fp32);
        assert_eq!(quantization_from_dtype("BF16"), Quantization::Fp16);
        assert_eq!(quantization_from_dtype("torch.bfloat16"), Quantization::Fp16);
        assert_eq!(quantization_from_dtype("F8_E4M3"), Quantization::Int8);
        assert_eq!(quantization_from_dtype("I8"), Quantization::Int8);
        assert_eq!(
            quantization_from_dtype("F64"),
            Quantization::Unrecognized("F64".to_string())
        );
    }

    #[test]
    fn test_name_resolver_describes_model() {
        let model = NameResolver::new()
            .resolve("https://huggingface.co/TheBloke/Mistral-7B-Instruct-v0.2-AWQ")
            .unwrap();

        assert_eq!(model.id, "TheBloke/Mistral-7B-Instruct-v0.2-AWQ");
        assert_eq!(model.name, "Mistral-7B-Instruct-v0.2-AWQ");
        assert_eq!(model.architecture, "Mistral");
        assert_eq!(model.parameters_formatted, "7B");
        assert_eq!(model.source, Source::Heuristic);
        assert_eq!(model.description.quantization, Quantization::Awq);
        assert_eq!(model.description.context_length, Some(4096));
        assert_eq!(
            model.hub_url,
            "https://huggingface.co/TheBloke/Mistral-7B-Instruct-v0.2-AWQ"
        );
    }

    #[test]
    fn test_name_resolver_never_guesses_size() {
        let err = NameResolver::new().resolve("google/flan-t5-xl").unwrap_err();
        assert!(matches!(err, Error::InvalidModelDescription { .. }));
    }

    #[test]
    fn test_license_and_context_defaults() {
        let gemma = NameResolver::new().resolve("google/gemma-7b").unwrap();
        assert_eq!(gemma.license, "Gemma Terms of Use");
        assert_eq!(gemma.description.context_length, Some(8192));

        let other = NameResolver::new().resolve("acme/widget-3b").unwrap();
        assert_eq!(other.license, "Unknown");
        assert_eq!(other.architecture, "Unknown");
        assert_eq!(other.description.context_length, Some(2048));
    }

    // ────────────────────────────────────────────────────────────────────
    // Hub responses
    // ────────────────────────────────────────────────────────────────────

    const LLAMA_INFO: &str = r#"{
        "id": "meta-llama/Llama-2-7b-hf",
        "safetensors": { "parameters": { "F16": 6738415616 }, "total": 6738415616 },
        "config": { "architectures": ["LlamaForCausalLM"], "model_type": "llama" },
        "cardData": { "license": "llama2" },
        "tags": ["transformers", "safetensors"]
    }"#;

    const LLAMA_CONFIG: &str = r#"{
        "hidden_size": 4096,
        "num_hidden_layers": 32,
        "max_position_embeddings": 4096,
        "torch_dtype": "float16",
        "vocab_size": 32000
    }"#;

    #[test]
    fn test_resolve_from_hub_full_metadata() {
        let info: HubModelInfo = serde_json::from_str(LLAMA_INFO).unwrap();
        let config: ModelConfigFile = serde_json::from_str(LLAMA_CONFIG).unwrap();

        let model = resolve_from_hub(
            "meta-llama/Llama-2-7b-hf",
            DEFAULT_HUB_URL,
            &info,
            Some(&config),
        )
        .unwrap();

        assert_eq!(model.description.parameter_count, 6_738_415_616);
        assert_eq!(model.description.quantization, Quantization::Fp16);
        assert_eq!(model.description.hidden_size, Some(4096));
        assert_eq!(model.description.num_layers, Some(32));
        assert_eq!(model.description.context_length, Some(4096));
        assert_eq!(model.architecture, "Llama");
        assert_eq!(model.license, "llama2");
        assert_eq!(model.parameters_formatted, "6.7B");
        assert_eq!(model.source, Source::Hub);
    }

    #[test]
    fn test_resolve_from_hub_picks_dominant_dtype() {
        let info: HubModelInfo = serde_json::from_str(
            r#"{ "safetensors": { "parameters": { "BF16": 1000, "F32": 7000000000 } } }"#,
        )
        .unwrap();
        let model = resolve_from_hub("org/some-model", DEFAULT_HUB_URL, &info, None).unwrap();
        assert_eq!(model.description.parameter_count, 7_000_000_000);
        assert_eq!(model.description.quantization, Quantization::Fp32);
    }

    #[test]
    fn test_resolve_from_hub_name_keywords_override_dtype() {
        let info: HubModelInfo = serde_json::from_str(
            r#"{ "safetensors": { "parameters": { "I32": 900000000, "F16": 300000000 }, "total": 1200000000 } }"#,
        )
        .unwrap();
        let model =
            resolve_from_hub("TheBloke/Llama-2-7B-GPTQ", DEFAULT_HUB_URL, &info, None).unwrap();
        assert_eq!(model.description.quantization, Quantization::Gptq);
    }

    #[test]
    fn test_packed_int32_weights_count_eight_parameters_each() {
        let info: HubModelInfo = serde_json::from_str(
            r#"{ "safetensors": { "parameters": { "I32": 900000000, "F16": 300000000 }, "total": 1200000000 } }"#,
        )
        .unwrap();
        let hub =
            resolve_from_hub("TheBloke/Llama-2-7B-GPTQ", DEFAULT_HUB_URL, &info, None).unwrap();
        // 9e8 packed words * 8 + 3e8 half-precision tensors
        assert_eq!(hub.description.parameter_count, 7_500_000_000);
        assert_eq!(hub.parameters_formatted, "7.5B");

        // Same ballpark as the name-only estimate for the same repo.
        let by_name = NameResolver::new().resolve("TheBloke/Llama-2-7B-GPTQ").unwrap();
        let hub_req = crate::fit::estimate(&hub.description).unwrap();
        let name_req = crate::fit::estimate(&by_name.description).unwrap();
        // 13 GB vs 12 GB at the Llama default context of 4096.
        assert_eq!(name_req.vram_required_gb, 12);
        assert_eq!(hub_req.vram_required_gb, 13);
    }

    #[test]
    fn test_unpacked_repos_keep_reported_total() {
        // An fp32 repo with an I32 buffer is not packed.
        let info: HubModelInfo = serde_json::from_str(
            r#"{ "safetensors": { "parameters": { "F32": 1000000000, "I32": 1000 }, "total": 1000001000 } }"#,
        )
        .unwrap();
        let model = resolve_from_hub("org/encoder-1b", DEFAULT_HUB_URL, &info, None).unwrap();
        assert_eq!(model.description.quantization, Quantization::Fp32);
        assert_eq!(model.description.parameter_count, 1_000_001_000);
    }

    #[test]
    fn test_resolve_from_hub_without_safetensors_uses_name() {
        let info: HubModelInfo =
            serde_json::from_str(r#"{ "config": { "model_type": "falcon" } }"#).unwrap();
        let model = resolve_from_hub("tiiuae/falcon-40b", DEFAULT_HUB_URL, &info, None).unwrap();
        assert_eq!(model.description.parameter_count, 40_000_000_000);
        assert_eq!(model.description.quantization, Quantization::Fp16);
        assert_eq!(model.architecture, "Falcon");

        let err = resolve_from_hub("org/mystery", DEFAULT_HUB_URL, &HubModelInfo::default(), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidModelDescription { .. }));
    }

    #[test]
    fn test_config_aliases_and_license_lists() {
        let config: ModelConfigFile =
            serde_json::from_str(r#"{ "n_embd": 768, "n_layer": 12, "n_positions": 1024 }"#)
                .unwrap();
        assert_eq!(config.hidden_size, Some(768));
        assert_eq!(config.num_hidden_layers, Some(12));
        assert_eq!(config.max_position_embeddings, Some(1024));

        let info: HubModelInfo = serde_json::from_str(
            r#"{ "safetensors": { "total": 124000000, "parameters": {} },
                 "cardData": { "license": ["mit", "apache-2.0"] } }"#,
        )
        .unwrap();
        let model = resolve_from_hub("openai/gpt2", DEFAULT_HUB_URL, &info, Some(&config)).unwrap();
        assert_eq!(model.license, "mit, apache-2.0");
        assert_eq!(model.description.context_length, Some(1024));
    }

    // ────────────────────────────────────────────────────────────────────
    // Fallback chain
    // ────────────────────────────────────────────────────────────────────

    struct Failing(fn() -> Error);

    impl ModelResolver for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn resolve(&self, _query: &str) -> Result<ResolvedModel> {
            Err((self.0)())
        }
    }

    #[test]
    fn test_fallback_on_transport_error() {
        let chain = FallbackResolver::new(
            Box::new(Failing(|| Error::Http("connection refused".into()))),
            Box::new(NameResolver::new()),
        );
        let model = chain.resolve("meta-llama/Llama-2-13b-hf").unwrap();
        assert_eq!(model.source, Source::Heuristic);
        assert_eq!(model.description.parameter_count, 13_000_000_000);
    }

    #[test]
    fn test_fallback_keeps_auth_and_not_found_errors() {
        let chain = FallbackResolver::new(
            Box::new(Failing(|| Error::Unauthorized("meta-llama/x-7b".into()))),
            Box::new(NameResolver::new()),
        );
        assert!(matches!(
            chain.resolve("meta-llama/x-7b"),
            Err(Error::Unauthorized(_))
        ));

        let chain = FallbackResolver::new(
            Box::new(Failing(|| Error::ModelNotFound("org/nope-7b".into()))),
            Box::new(NameResolver::new()),
        );
        assert!(matches!(
            chain.resolve("org/nope-7b"),
            Err(Error::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_hub_resolver_urls() {
        let hub = HubResolver::new("https://mirror.example/", None);
        assert_eq!(
            hub.api_url("org/model"),
            "https://mirror.example/api/models/org/model"
        );
        assert_eq!(
            hub.config_url("org/model"),
            "https://mirror.example/org/model/resolve/main/config.json"
        );
        assert!(HubResolver::new(DEFAULT_HUB_URL, Some(String::new())).token.is_none());
    }
}
