mod display;
mod logging;

use clap::{Args, Parser, Subcommand};
use colored::*;
use vramfit_core::fit::estimate;
use vramfit_core::format::parse_parameter_count;
use vramfit_core::hardware::{GpuCatalog, GpuTier, parse_memory_size};
use vramfit_core::models::{ModelDescription, Quantization};
use vramfit_core::providers::{
    DEFAULT_HUB_URL, FallbackResolver, HUB_TOKEN_ENV, HUB_URL_ENV, HubResolver, ModelResolver,
    NameResolver, ResolvedModel,
};

#[derive(Parser)]
#[command(name = "vramfit")]
#[command(about = "Estimate the VRAM and storage an LLM needs, and which GPUs can run it", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output results as JSON (for tool integration)
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging on stderr (VRAMFIT_LOG / RUST_LOG take precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Model settings shared by `estimate` and `resolve`.
#[derive(Args, Debug, Default)]
struct ModelArgs {
    /// Quantization scheme: FP32, FP16, INT8, INT4, GPTQ, AWQ, GGUF.
    /// Other tags are accepted and estimated at FP16 width.
    #[arg(short, long, value_name = "SCHEME")]
    quant: Option<Quantization>,

    /// Context length in tokens [default: 2048, or the model's own]
    #[arg(long, value_name = "TOKENS", value_parser = clap::value_parser!(u32).range(1..))]
    context: Option<u32>,

    /// Hidden dimension [default: 4096]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    hidden_size: Option<u32>,

    /// Transformer layer count [default: 32]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    layers: Option<u32>,

    /// Concurrent sequences [default: 1]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    batch: Option<u32>,

    /// Only match GPUs of this tier: consumer, professional, datacenter
    #[arg(long)]
    tier: Option<GpuTier>,
}

impl ModelArgs {
    /// Layer explicit flags over a base description.
    fn apply(&self, mut model: ModelDescription) -> ModelDescription {
        if let Some(quant) = &self.quant {
            model.quantization = quant.clone();
        }
        model.context_length = self.context.or(model.context_length);
        model.hidden_size = self.hidden_size.or(model.hidden_size);
        model.num_layers = self.layers.or(model.num_layers);
        model.batch_size = self.batch.or(model.batch_size);
        model
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate requirements from a parameter count
    Estimate {
        /// Parameter count, e.g. 7B, 1.5B, 350M, 7000000000
        #[arg(short, long, value_name = "COUNT", value_parser = parse_parameter_count)]
        params: u64,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Look up a model on the hub (or infer from its name) and estimate it
    Resolve {
        /// Model id or URL, e.g. meta-llama/Llama-2-7b-hf
        model_id: String,

        /// Skip the hub and infer everything from the name
        #[arg(long)]
        offline: bool,

        /// Access token for gated or private models
        #[arg(long, env = HUB_TOKEN_ENV, hide_env_values = true)]
        token: Option<String>,

        /// Hub base URL
        #[arg(long, env = HUB_URL_ENV, default_value = DEFAULT_HUB_URL)]
        hub_url: String,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// List the GPU catalog
    Gpus {
        /// Only show this tier: consumer, professional, datacenter
        #[arg(long)]
        tier: Option<GpuTier>,
    },

    /// Match the catalog against a VRAM requirement
    Match {
        /// Required VRAM, e.g. 48, 48G, 49152M, 1T
        #[arg(value_name = "SIZE", value_parser = parse_vram)]
        vram: f64,

        /// Only match GPUs of this tier
        #[arg(long)]
        tier: Option<GpuTier>,
    },
}

fn parse_vram(s: &str) -> Result<f64, String> {
    match parse_memory_size(s) {
        Some(gb) if gb.is_finite() && gb >= 0.0 => Ok(gb),
        _ => Err(format!(
            "could not parse '{s}'. Expected format: 48, 48G, 49152M, 1T"
        )),
    }
}

/// Estimate, match and print one model.
fn report(
    resolved: Option<&ResolvedModel>,
    model: &ModelDescription,
    tier: Option<GpuTier>,
    json: bool,
) -> vramfit_core::Result<()> {
    let req = estimate(model)?;
    let compat = GpuCatalog::builtin().compatibility(req.vram_required_gb as f64, tier);

    if json {
        display::display_json_estimate(resolved, model, &req, &compat);
    } else {
        if let Some(resolved) = resolved {
            display::display_model_info(resolved);
        }
        display::display_requirements(model, &req);
        display::display_compatibility(&compat);
    }
    Ok(())
}

fn run(cli: Cli) -> vramfit_core::Result<()> {
    match cli.command {
        Commands::Estimate { params, model } => {
            let description = model.apply(ModelDescription::new(params, Quantization::default()));
            report(None, &description, model.tier, cli.json)
        }

        Commands::Resolve {
            model_id,
            offline,
            token,
            hub_url,
            model,
        } => {
            let resolver: Box<dyn ModelResolver> = if offline {
                Box::new(NameResolver::with_base_url(hub_url))
            } else {
                Box::new(FallbackResolver::hub_then_name(HubResolver::new(
                    hub_url, token,
                )))
            };
            tracing::debug!(resolver = resolver.name(), model = %model_id, "resolving");

            let resolved = resolver.resolve(&model_id)?;
            let description = model.apply(resolved.description.clone());
            report(Some(&resolved), &description, model.tier, cli.json)
        }

        Commands::Gpus { tier } => {
            let catalog = GpuCatalog::builtin();
            let gpus = match tier {
                Some(tier) => catalog.by_tier(tier),
                None => catalog.gpus().to_vec(),
            };
            if cli.json {
                display::display_json_catalog(&gpus);
            } else {
                display::display_catalog(&gpus);
            }
            Ok(())
        }

        Commands::Match { vram, tier } => {
            let compat = GpuCatalog::builtin().compatibility(vram, tier);
            if cli.json {
                display::display_json_report(&compat);
            } else {
                display::display_compatibility(&compat);
            }
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
