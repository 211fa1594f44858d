use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tensor-parallel group sizes considered for multi-GPU setups, smallest first.
/// Only these are ever tried, even when a GPU supports larger groups.
pub const GANG_SIZES: [u32; 3] = [2, 4, 8];

/// Hardware class, used for grouping and filtering only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuTier {
    Consumer,
    Professional,
    Datacenter,
}

impl GpuTier {
    pub fn label(&self) -> &'static str {
        match self {
            GpuTier::Consumer => "Consumer",
            GpuTier::Professional => "Professional",
            GpuTier::Datacenter => "Datacenter",
        }
    }
}

impl fmt::Display for GpuTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GpuTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "consumer" => Ok(GpuTier::Consumer),
            "professional" | "pro" | "workstation" => Ok(GpuTier::Professional),
            "datacenter" | "data-center" | "dc" => Ok(GpuTier::Datacenter),
            _ => Err(Error::Parse {
                what: "GPU tier",
                input: s.to_string(),
            }),
        }
    }
}

/// One GPU model in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuSpec {
    pub name: String,
    pub vram_gb: u32,
    pub tier: GpuTier,
    /// Largest tensor-parallel group this model is deployed in.
    pub max_gang_size: u32,
}

impl GpuSpec {
    /// Smallest permitted gang size whose pooled VRAM reaches the requirement.
    pub fn smallest_gang(&self, vram_required_gb: f64) -> Option<u32> {
        GANG_SIZES
            .into_iter()
            .filter(|&n| n <= self.max_gang_size)
            .find(|&n| (n as u64 * self.vram_gb as u64) as f64 >= vram_required_gb)
    }

    pub fn fits_single(&self, vram_required_gb: f64) -> bool {
        self.vram_gb as f64 >= vram_required_gb
    }
}

/// A multi-GPU tensor-parallel setup built from one GPU model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GangMatch {
    pub gpu: GpuSpec,
    pub gang_size: u32,
    pub total_vram_gb: u64,
}

impl GangMatch {
    pub fn label(&self) -> String {
        format!("{}x {} - Tensor Parallel", self.gang_size, self.gpu.name)
    }
}

/// Catalog split by whether each GPU can hold the model.
/// Every catalog entry lands in exactly one of the three lists, in catalog order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompatibilityReport {
    pub vram_required_gb: f64,
    pub single_gpu: Vec<GpuSpec>,
    pub multi_gpu: Vec<GangMatch>,
    pub incompatible: Vec<GpuSpec>,
}

impl CompatibilityReport {
    /// At least one single or multi-GPU option exists.
    pub fn is_runnable(&self) -> bool {
        !self.single_gpu.is_empty() || !self.multi_gpu.is_empty()
    }

    pub fn len(&self) -> usize {
        self.single_gpu.len() + self.multi_gpu.len() + self.incompatible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition `gpus` against a VRAM requirement.
///
/// A card that alone meets the requirement (equality included) is a single-GPU
/// match. Otherwise the smallest gang from `GANG_SIZES`, capped at the card's
/// `max_gang_size`, is reported. Cards with no viable gang are incompatible.
pub fn match_gpus(vram_required_gb: f64, gpus: &[GpuSpec]) -> CompatibilityReport {
    let mut report = CompatibilityReport {
        vram_required_gb,
        single_gpu: Vec::new(),
        multi_gpu: Vec::new(),
        incompatible: Vec::new(),
    };

    for gpu in gpus {
        if gpu.fits_single(vram_required_gb) {
            report.single_gpu.push(gpu.clone());
        } else if let Some(gang_size) = gpu.smallest_gang(vram_required_gb) {
            report.multi_gpu.push(GangMatch {
                gpu: gpu.clone(),
                gang_size,
                total_vram_gb: gang_size as u64 * gpu.vram_gb as u64,
            });
        } else {
            report.incompatible.push(gpu.clone());
        }
    }

    tracing::debug!(
        vram_required_gb,
        single = report.single_gpu.len(),
        multi = report.multi_gpu.len(),
        incompatible = report.incompatible.len(),
        "matched GPU catalog"
    );
    report
}

const GPU_CATALOG_JSON: &str = include_str!("../data/gpus.json");

/// The compiled-in GPU catalog, sorted by VRAM descending.
pub struct GpuCatalog {
    gpus: Vec<GpuSpec>,
}

impl GpuCatalog {
    /// Parse and sort the embedded catalog once per process.
    pub fn builtin() -> &'static GpuCatalog {
        static CATALOG: OnceLock<GpuCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| {
            GpuCatalog::from_json(GPU_CATALOG_JSON).expect("Failed to parse embedded gpus.json")
        })
    }

    /// Parse a catalog from a JSON array of GPU entries.
    pub fn from_json(json: &str) -> Result<Self> {
        let gpus: Vec<GpuSpec> = serde_json::from_str(json)?;
        Ok(GpuCatalog::new(gpus))
    }

    /// Build a catalog from arbitrary entries. Ties keep their input order.
    pub fn new(mut gpus: Vec<GpuSpec>) -> Self {
        gpus.sort_by(|a, b| b.vram_gb.cmp(&a.vram_gb));
        GpuCatalog { gpus }
    }

    pub fn gpus(&self) -> &[GpuSpec] {
        &self.gpus
    }

    pub fn by_tier(&self, tier: GpuTier) -> Vec<GpuSpec> {
        self.gpus.iter().filter(|g| g.tier == tier).cloned().collect()
    }

    pub fn find(&self, name: &str) -> Option<&GpuSpec> {
        self.gpus
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Match the whole catalog, or only one tier of it.
    pub fn compatibility(
        &self,
        vram_required_gb: f64,
        tier: Option<GpuTier>,
    ) -> CompatibilityReport {
        match tier {
            Some(tier) => match_gpus(vram_required_gb, &self.by_tier(tier)),
            None => match_gpus(vram_required_gb, &self.gpus),
        }
    }
}

/// Parse a human-readable memory size string into gigabytes.
/// Accepts formats: "48", "48G", "48gb", "49152M", "1.5T", etc.
/// Returns `None` if the input is malformed.
pub fn parse_memory_size(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let num_end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (num_str, suffix) = s.split_at(num_end);
    let value: f64 = num_str.parse().ok()?;

    match suffix.trim().to_lowercase().as_str() {
        "g" | "gb" | "gib" | "" => Some(value),
        "m" | "mb" | "mib" => Some(value / 1024.0),
        "t" | "tb" | "tib" => Some(value * 1024.0),
        _ => None,
    }
}
