pub mod error;
pub mod fit;
pub mod format;
pub mod hardware;
pub mod models;
pub mod providers;

pub use error::{Error, Result};
pub use fit::{MemoryBreakdown, Requirements, SizeCategory, estimate};
pub use hardware::{CompatibilityReport, GangMatch, GpuCatalog, GpuSpec, GpuTier, match_gpus};
pub use models::{ModelDescription, Quantization};
pub use providers::{FallbackResolver, HubResolver, ModelResolver, NameResolver, ResolvedModel};
