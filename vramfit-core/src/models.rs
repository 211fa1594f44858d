use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

pub const DEFAULT_CONTEXT_LENGTH: u32 = 2048;
pub const DEFAULT_HIDDEN_SIZE: u32 = 4096;
pub const DEFAULT_NUM_LAYERS: u32 = 32;
pub const DEFAULT_BATCH_SIZE: u32 = 1;

/// Weight storage format. Determines bytes per parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Quantization {
    Fp32,
    #[default]
    Fp16,
    Int8,
    Int4,
    Gptq,
    Awq,
    Gguf,
    /// Anything else; estimated at FP16 width. Keeps the raw tag for display.
    Unrecognized(String),
}

impl Quantization {
    /// Every recognized scheme, widest first.
    pub fn known() -> [Quantization; 7] {
        [
            Quantization::Fp32,
            Quantization::Fp16,
            Quantization::Int8,
            Quantization::Int4,
            Quantization::Gptq,
            Quantization::Awq,
            Quantization::Gguf,
        ]
    }

    /// Case-insensitive match on the scheme tag. Never fails.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "FP32" => Quantization::Fp32,
            "FP16" => Quantization::Fp16,
            "INT8" => Quantization::Int8,
            "INT4" => Quantization::Int4,
            "GPTQ" => Quantization::Gptq,
            "AWQ" => Quantization::Awq,
            "GGUF" => Quantization::Gguf,
            _ => Quantization::Unrecognized(tag.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Quantization::Fp32 => "FP32",
            Quantization::Fp16 => "FP16",
            Quantization::Int8 => "INT8",
            Quantization::Int4 => "INT4",
            Quantization::Gptq => "GPTQ",
            Quantization::Awq => "AWQ",
            Quantization::Gguf => "GGUF",
            Quantization::Unrecognized(raw) => raw,
        }
    }

    /// Bytes per parameter for this scheme.
    pub fn bytes_per_parameter(&self) -> f64 {
        match self {
            Quantization::Fp32 => 4.0,
            Quantization::Fp16 => 2.0,
            Quantization::Int8 => 1.0,
            Quantization::Int4 | Quantization::Gptq | Quantization::Awq | Quantization::Gguf => {
                0.5
            }
            Quantization::Unrecognized(_) => 2.0,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Quantization::Unrecognized(_))
    }
}

impl fmt::Display for Quantization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Quantization {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Quantization::parse(s))
    }
}

impl From<&str> for Quantization {
    fn from(tag: &str) -> Self {
        Quantization::parse(tag)
    }
}

impl Serialize for Quantization {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Everything the estimator needs to know about a model.
/// Optional fields fall back to the `DEFAULT_*` constants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescription {
    pub parameter_count: u64,
    pub quantization: Quantization,
    pub context_length: Option<u32>,
    pub hidden_size: Option<u32>,
    pub num_layers: Option<u32>,
    pub batch_size: Option<u32>,
}

impl ModelDescription {
    pub fn new(parameter_count: u64, quantization: Quantization) -> Self {
        ModelDescription {
            parameter_count,
            quantization,
            context_length: None,
            hidden_size: None,
            num_layers: None,
            batch_size: None,
        }
    }

    pub fn with_context_length(mut self, tokens: u32) -> Self {
        self.context_length = Some(tokens);
        self
    }

    pub fn with_hidden_size(mut self, hidden_size: u32) -> Self {
        self.hidden_size = Some(hidden_size);
        self
    }

    pub fn with_num_layers(mut self, layers: u32) -> Self {
        self.num_layers = Some(layers);
        self
    }

    pub fn with_batch_size(mut self, batch: u32) -> Self {
        self.batch_size = Some(batch);
        self
    }

    pub fn context_length(&self) -> u32 {
        self.context_length.unwrap_or(DEFAULT_CONTEXT_LENGTH)
    }

    pub fn hidden_size(&self) -> u32 {
        self.hidden_size.unwrap_or(DEFAULT_HIDDEN_SIZE)
    }

    pub fn num_layers(&self) -> u32 {
        self.num_layers.unwrap_or(DEFAULT_NUM_LAYERS)
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    /// Parameter count in billions.
    pub fn params_b(&self) -> f64 {
        self.parameter_count as f64 / 1_000_000_000.0
    }

    /// Reject descriptions the estimator must not run on.
    /// A missing parameter count is never defaulted.
    pub fn validate(&self) -> Result<()> {
        if self.parameter_count == 0 {
            return Err(Error::invalid(
                "parameter_count",
                "must be greater than zero",
            ));
        }
        let optional = [
            ("context_length", self.context_length),
            ("hidden_size", self.hidden_size),
            ("num_layers", self.num_layers),
            ("batch_size", self.batch_size),
        ];
        for (field, value) in optional {
            if value == Some(0) {
                return Err(Error::invalid(field, "must be positive when given"));
            }
        }
        Ok(())
    }
}
