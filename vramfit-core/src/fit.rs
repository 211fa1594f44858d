use serde::Serialize;

use crate::error::Result;
use crate::models::ModelDescription;

/// Gradient + optimizer-state memory as a multiple of the weight footprint.
/// Applied to every estimate, inference included.
pub const OPTIMIZER_OVERHEAD_FACTOR: f64 = 2.0;

/// On-disk packaging overhead on top of the raw weights.
pub const STORAGE_OVERHEAD_FACTOR: f64 = 1.1;

/// Upper VRAM bound (inclusive, GB) -> (recommended, minimum).
/// Anything above the last bound gets `MULTI_GPU_LABELS`.
const GPU_LABELS: &[(u64, &str, &str)] = &[
    (8, "NVIDIA RTX 3070 or better", "NVIDIA RTX 3060"),
    (12, "NVIDIA RTX 3080 Ti or better", "NVIDIA RTX 3060 Ti"),
    (16, "NVIDIA RTX 4080 or better", "NVIDIA RTX 3090"),
    (24, "NVIDIA RTX 4090 or better", "NVIDIA RTX 3090 Ti"),
    (48, "NVIDIA A6000 or better", "NVIDIA A100"),
];

const MULTI_GPU_LABELS: (&str, &str) = (
    "Multiple GPUs or specialized hardware required",
    "NVIDIA A100 80GB or multiple GPUs",
);

/// Coarse model class by VRAM requirement, for grouping in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SizeCategory {
    Small,
    MidSized,
    Large,
    VeryLarge,
    Massive,
    Largest,
}

impl SizeCategory {
    pub fn from_vram_gb(vram_gb: u64) -> Self {
        match vram_gb {
            0..=12 => SizeCategory::Small,
            13..=24 => SizeCategory::MidSized,
            25..=80 => SizeCategory::Large,
            81..=200 => SizeCategory::VeryLarge,
            201..=400 => SizeCategory::Massive,
            _ => SizeCategory::Largest,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SizeCategory::Small => "Small Models",
            SizeCategory::MidSized => "Mid-Sized Models",
            SizeCategory::Large => "Large Models",
            SizeCategory::VeryLarge => "Very Large Models",
            SizeCategory::Massive => "Massive Models",
            SizeCategory::Largest => "The Largest Models",
        }
    }
}

/// Estimated hardware requirements for one model description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Requirements {
    pub vram_required_gb: u64,
    pub storage_required_gb: u64,
    pub recommended_gpu: &'static str,
    pub minimum_gpu: &'static str,
    /// Unrounded terms of the VRAM sum, kept for breakdown displays.
    pub breakdown: MemoryBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryBreakdown {
    pub bytes_per_parameter: f64,
    pub weights_gb: f64,
    pub kv_cache_gb: f64,
    pub optimizer_gb: f64,
}

impl MemoryBreakdown {
    pub fn total_gb(&self) -> f64 {
        self.weights_gb + self.kv_cache_gb + self.optimizer_gb
    }
}

impl Requirements {
    pub fn size_category(&self) -> SizeCategory {
        SizeCategory::from_vram_gb(self.vram_required_gb)
    }
}

/// Estimate VRAM and storage for a model.
///
/// VRAM = weights + KV cache + optimizer overhead, rounded up to whole GB.
/// Storage = weights * 1.1, rounded up; KV cache and optimizer state are
/// runtime-only and never hit the disk.
pub fn estimate(model: &ModelDescription) -> Result<Requirements> {
    model.validate()?;

    let breakdown = memory_breakdown(model);
    let vram_required_gb = breakdown.total_gb().ceil() as u64;
    let storage_required_gb = (breakdown.weights_gb * STORAGE_OVERHEAD_FACTOR).ceil() as u64;
    let (recommended_gpu, minimum_gpu) = gpu_labels(vram_required_gb);

    tracing::debug!(
        params = model.parameter_count,
        quant = %model.quantization,
        weights_gb = breakdown.weights_gb,
        kv_cache_gb = breakdown.kv_cache_gb,
        optimizer_gb = breakdown.optimizer_gb,
        vram_required_gb,
        storage_required_gb,
        "estimated requirements"
    );

    Ok(Requirements {
        vram_required_gb,
        storage_required_gb,
        recommended_gpu,
        minimum_gpu,
        breakdown,
    })
}

fn memory_breakdown(model: &ModelDescription) -> MemoryBreakdown {
    let bpp = model.quantization.bytes_per_parameter();
    let weights_gb = model.parameter_count as f64 * bpp / 1e9;
    // One key and one value tensor per layer.
    let kv_cache_gb = 2.0
        * model.hidden_size() as f64
        * model.num_layers() as f64
        * model.context_length() as f64
        * model.batch_size() as f64
        * bpp
        / 1e9;
    MemoryBreakdown {
        bytes_per_parameter: bpp,
        weights_gb,
        kv_cache_gb,
        optimizer_gb: weights_gb * OPTIMIZER_OVERHEAD_FACTOR,
    }
}

/// Recommended and minimum GPU labels for a VRAM requirement.
pub fn gpu_labels(vram_required_gb: u64) -> (&'static str, &'static str) {
    GPU_LABELS
        .iter()
        .find(|(max, _, _)| vram_required_gb <= *max)
        .map(|&(_, recommended, minimum)| (recommended, minimum))
        .unwrap_or(MULTI_GPU_LABELS)
}
