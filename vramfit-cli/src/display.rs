use colored::*;
use tabled::{Table, Tabled, settings::Style};
use vramfit_core::fit::Requirements;
use vramfit_core::format::{format_number, format_size};
use vramfit_core::hardware::{CompatibilityReport, GpuSpec};
use vramfit_core::models::ModelDescription;
use vramfit_core::providers::{MAX_CONFIG_CONTEXT, ResolvedModel, Source};

#[derive(Tabled)]
struct GpuRow {
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "GPU")]
    name: String,
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "VRAM")]
    vram: String,
    #[tabled(rename = "Setup")]
    setup: String,
}

#[derive(Tabled)]
struct CatalogRow {
    #[tabled(rename = "GPU")]
    name: String,
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "VRAM")]
    vram: String,
    #[tabled(rename = "Max Gang")]
    max_gang: String,
}

pub fn display_catalog(gpus: &[GpuSpec]) {
    if gpus.is_empty() {
        println!("\n{}", "No GPUs in this tier.".yellow());
        return;
    }

    println!("\n{}", "=== GPU Catalog ===".bold().cyan());
    println!("Total GPUs: {}\n", gpus.len());

    let rows: Vec<CatalogRow> = gpus
        .iter()
        .map(|g| CatalogRow {
            name: g.name.clone(),
            tier: g.tier.label().to_string(),
            vram: format!("{} GB", g.vram_gb),
            max_gang: format!("{}x", g.max_gang_size),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn display_model_info(model: &ResolvedModel) {
    println!("\n{}", format!("=== {} ===", model.name).bold().cyan());
    println!();
    println!("{}: {}", "Model".bold(), model.id);
    println!("{}: {}", "Architecture".bold(), model.architecture);
    println!("{}: {}", "Parameters".bold(), model.parameters_formatted);
    println!("{}: {}", "License".bold(), model.license);
    println!("{}: {}", "Hub".bold(), model.hub_url);
    if model.source == Source::Heuristic {
        println!(
            "{}",
            "  (details inferred from the model name; hub metadata unavailable)".dimmed()
        );
    }
    if model.source == Source::Hub && model.description.context_length == Some(MAX_CONFIG_CONTEXT)
    {
        println!(
            "{}",
            format!(
                "  (context window limited to {MAX_CONFIG_CONTEXT} tokens; pass --context for longer)"
            )
            .dimmed()
        );
    }
}

pub fn display_requirements(model: &ModelDescription, req: &Requirements) {
    println!();
    println!("{}", "Model Settings:".bold().underline());
    println!(
        "  Parameters: {} ({:.2}B)",
        format_number(model.parameter_count),
        model.params_b()
    );
    if model.quantization.is_recognized() {
        println!("  Quantization: {}", model.quantization);
    } else {
        println!(
            "  Quantization: {} {}",
            model.quantization,
            "(unrecognized, estimated as FP16)".yellow()
        );
    }
    println!("  Context Length: {} tokens", format_number(model.context_length() as u64));
    println!(
        "  Hidden Size: {}  Layers: {}  Batch: {}",
        model.hidden_size(),
        model.num_layers(),
        model.batch_size()
    );
    println!();

    println!("{}", "Resource Requirements:".bold().underline());
    println!(
        "  VRAM Required: {}",
        format_size(req.vram_required_gb as f64).bold()
    );
    println!("  Storage Required: {}", format_size(req.storage_required_gb as f64));
    println!("  Size Class: {}", req.size_category().label());
    println!("  Recommended GPU: {}", req.recommended_gpu.green());
    println!("  Minimum GPU: {}", req.minimum_gpu);
    println!();

    let b = &req.breakdown;
    println!("{}", "VRAM Breakdown:".bold().underline());
    println!("  Weights: {} ({} bytes/param)", format_size(b.weights_gb), b.bytes_per_parameter);
    println!("  KV Cache: {}", format_size(b.kv_cache_gb));
    println!("  Optimizer/Gradients: {}", format_size(b.optimizer_gb));
    println!("  Total (unrounded): {}", format_size(b.total_gb()));
}

pub fn display_compatibility(report: &CompatibilityReport) {
    if report.is_empty() {
        println!("\n{}", "No GPUs to compare against.".yellow());
        return;
    }

    println!("\n{}", "=== GPU Compatibility ===".bold().cyan());
    println!(
        "Requirement: {} | {} single, {} multi-GPU, {} incompatible\n",
        format_size(report.vram_required_gb),
        report.single_gpu.len(),
        report.multi_gpu.len(),
        report.incompatible.len()
    );

    let single = report.single_gpu.iter().map(|g| GpuRow {
        status: "✅ Single GPU".to_string(),
        name: g.name.clone(),
        tier: g.tier.label().to_string(),
        vram: format!("{} GB", g.vram_gb),
        setup: "1x".to_string(),
    });
    let multi = report.multi_gpu.iter().map(|m| GpuRow {
        status: "🟡 Multi-GPU".to_string(),
        name: m.gpu.name.clone(),
        tier: m.gpu.tier.label().to_string(),
        vram: format!("{} GB", m.gpu.vram_gb),
        setup: format!("{}x ({} GB total)", m.gang_size, m.total_vram_gb),
    });
    let incompatible = report.incompatible.iter().map(|g| GpuRow {
        status: "🔴 Incompatible".to_string(),
        name: g.name.clone(),
        tier: g.tier.label().to_string(),
        vram: format!("{} GB", g.vram_gb),
        setup: "-".to_string(),
    });

    let rows: Vec<GpuRow> = single.chain(multi).chain(incompatible).collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);

    if !report.is_runnable() {
        println!(
            "\n{}",
            "No catalog GPU can hold this model, even with tensor parallelism.".red()
        );
    }
}

// ────────────────────────────────────────────────────────────────────
// JSON output for scripts
// ────────────────────────────────────────────────────────────────────

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).expect("JSON serialization failed")
    );
}

pub fn display_json_catalog(gpus: &[GpuSpec]) {
    let gpus: Vec<serde_json::Value> = gpus.iter().map(gpu_json).collect();
    print_json(&serde_json::json!({ "gpus": gpus }));
}

pub fn display_json_report(report: &CompatibilityReport) {
    print_json(&serde_json::json!({ "compatibility": report_json(report) }));
}

/// Requirements plus compatibility; `resolved` adds the model metadata block.
pub fn display_json_estimate(
    resolved: Option<&ResolvedModel>,
    model: &ModelDescription,
    req: &Requirements,
    report: &CompatibilityReport,
) {
    let mut output = serde_json::json!({
        "input": {
            "parameter_count": model.parameter_count,
            "params_b": round2(model.params_b()),
            "quantization": model.quantization.label(),
            "quantization_recognized": model.quantization.is_recognized(),
            "context_length": model.context_length(),
            "hidden_size": model.hidden_size(),
            "num_layers": model.num_layers(),
            "batch_size": model.batch_size(),
        },
        "requirements": {
            "vram_required_gb": req.vram_required_gb,
            "storage_required_gb": req.storage_required_gb,
            "recommended_gpu": req.recommended_gpu,
            "minimum_gpu": req.minimum_gpu,
            "size_category": req.size_category().label(),
            "breakdown": {
                "bytes_per_parameter": req.breakdown.bytes_per_parameter,
                "weights_gb": round2(req.breakdown.weights_gb),
                "kv_cache_gb": round2(req.breakdown.kv_cache_gb),
                "optimizer_gb": round2(req.breakdown.optimizer_gb),
                "total_gb": round2(req.breakdown.total_gb()),
            },
        },
        "compatibility": report_json(report),
    });

    if let Some(resolved) = resolved {
        output["model"] = serde_json::json!({
            "id": resolved.id,
            "name": resolved.name,
            "hub_url": resolved.hub_url,
            "architecture": resolved.architecture,
            "license": resolved.license,
            "parameters": resolved.parameters_formatted,
            "source": resolved.source,
        });
    }
    print_json(&output);
}

fn gpu_json(g: &GpuSpec) -> serde_json::Value {
    serde_json::json!({
        "name": g.name,
        "vram_gb": g.vram_gb,
        "tier": g.tier,
        "max_gang_size": g.max_gang_size,
    })
}

fn report_json(report: &CompatibilityReport) -> serde_json::Value {
    let multi: Vec<serde_json::Value> = report
        .multi_gpu
        .iter()
        .map(|m| {
            serde_json::json!({
                "gpu": gpu_json(&m.gpu),
                "gang_size": m.gang_size,
                "total_vram_gb": m.total_vram_gb,
                "label": m.label(),
            })
        })
        .collect();

    serde_json::json!({
        "vram_required_gb": round1(report.vram_required_gb),
        "runnable": report.is_runnable(),
        "single_gpu": report.single_gpu.iter().map(gpu_json).collect::<Vec<_>>(),
        "multi_gpu": multi,
        "incompatible": report.incompatible.iter().map(gpu_json).collect::<Vec<_>>(),
    })
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
