//! Terminal output utilities.
//!
//! Provides formatting helpers for terminal output.

use crate::models::CidrDescriptor;
use crate::processing::{EnumerationMode, ValidationReport};
use colored::Colorize;

/// Format a value as a quoted, right-aligned field.
///
/// # Arguments
/// * `value` - The value to format
/// * `width` - The minimum width of the field
///
/// # Returns
/// A quoted, right-aligned string
pub fn format_field<T: ToString>(value: T, width: usize) -> String {
    let value_str = value.to_string();
    let quoted = format!("\"{value_str}\"");
    let quoted_len = quoted.len();

    if quoted_len >= width {
        quoted
    } else {
        format!("{quoted:>width$}")
    }
}

/// Format an address count, marking the saturated IPv6 /0 total.
pub fn format_count(count: u128, saturated: bool) -> String {
    if saturated {
        "2^128".to_string()
    } else {
        count.to_string()
    }
}

/// Render a validation report, one line per error or warning.
pub fn format_validation(input: &str, report: &ValidationReport) -> String {
    let mut lines = Vec::new();
    if report.valid {
        lines.push(format!("{} {input}", "VALID".on_green()));
    } else {
        lines.push(format!("{} {input}", "INVALID".on_red()));
    }
    for error in &report.errors {
        lines.push(format!("  {} {error}", "error:".red()));
    }
    for warning in &report.warnings {
        lines.push(format!("  {} {warning}", "warning:".yellow()));
    }
    lines.join("\n")
}

/// Render the descriptor of a range.
pub fn format_descriptor(d: &CidrDescriptor) -> String {
    let none = || "-".to_string();
    [
        format!("  family:     {}", d.family),
        format!("  network:    {}", d.network_address.to_string().on_blue()),
        format!("  prefix:     /{}", d.prefix_len),
        format!("  last:       {}", d.last_address),
        format!(
            "  broadcast:  {}",
            d.broadcast_address.map(|a| a.to_string()).unwrap_or_else(none)
        ),
        format!(
            "  gateway:    {}",
            d.gateway_address.map(|a| a.to_string()).unwrap_or_else(none)
        ),
        format!("  total:      {}", format_count(d.total_addresses, d.is_total_saturated())),
        format!("  usable:     {}", format_count(d.usable_addresses, false)),
    ]
    .join("\n")
}

/// Render the scale decision for a range.
pub fn format_enumeration_mode(mode: &EnumerationMode) -> String {
    match mode {
        EnumerationMode::Full => format!("  generate:   {}", "all addresses".green()),
        EnumerationMode::SpecialOnly {
            total_addresses,
            threshold,
        } => format!(
            "  generate:   {} ({total_addresses} > threshold {threshold})",
            "special addresses only".yellow()
        ),
    }
}
