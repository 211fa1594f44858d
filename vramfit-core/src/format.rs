//! Display helpers for sizes and parameter counts.

use crate::error::{Error, Result};

/// Human-readable size: whole megabytes below 1 GB, one decimal in GB above.
pub fn format_size(size_gb: f64) -> String {
    if size_gb < 1.0 {
        format!("{} MB", (size_gb * 1024.0).round() as i64)
    } else {
        format!("{:.1} GB", size_gb)
    }
}

/// Integer with thousands separators, e.g. `7,000,000,000`.
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

const PARAM_UNITS: &[(f64, char)] = &[(1e12, 'T'), (1e9, 'B'), (1e6, 'M'), (1e3, 'K')];

/// Compact parameter count: `7B`, `1.5B`, `350M`.
pub fn format_parameters(count: u64) -> String {
    let value = count as f64;
    let Some(mut idx) = PARAM_UNITS.iter().position(|&(scale, _)| value >= scale) else {
        return count.to_string();
    };
    // 999.96M rounds to 1000.0M; carry into the next unit instead.
    if idx > 0 && (value / PARAM_UNITS[idx].0 * 10.0).round() >= 10_000.0 {
        idx -= 1;
    }

    let (scale, suffix) = PARAM_UNITS[idx];
    let scaled = format!("{:.1}", value / scale);
    let scaled = scaled.strip_suffix(".0").unwrap_or(&scaled);
    format!("{scaled}{suffix}")
}

/// Parse `7B`, `1.5b`, `350M`, `1.2T`, `7000000000` or `7_000_000_000`.
pub fn parse_parameter_count(s: &str) -> Result<u64> {
    let err = || Error::Parse {
        what: "parameter count",
        input: s.to_string(),
    };
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| *c != '_' && *c != ',')
        .collect();
    if cleaned.is_empty() {
        return Err(err());
    }

    let (num_str, multiplier) = match cleaned.chars().last().map(|c| c.to_ascii_uppercase()) {
        Some('T') => (&cleaned[..cleaned.len() - 1], 1e12),
        Some('B') => (&cleaned[..cleaned.len() - 1], 1e9),
        Some('M') => (&cleaned[..cleaned.len() - 1], 1e6),
        Some('K') => (&cleaned[..cleaned.len() - 1], 1e3),
        _ => (cleaned.as_str(), 1.0),
    };

    if multiplier == 1.0 {
        return num_str.parse::<u64>().map_err(|_| err());
    }
    let value: f64 = num_str.trim().parse().map_err(|_| err())?;
    if !value.is_finite() || value < 0.0 {
        return Err(err());
    }
    Ok((value * multiplier).round() as u64)
}
