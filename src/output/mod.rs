//! Output formatting for ranges and address records.
//!
//! This module handles formatting engine results for operators:
//! - [`csv`] - CSV output of drafts and address records
//! - [`terminal`] - Terminal output with colors

mod csv;
mod terminal;

pub use csv::{address_records_csv, drafts_csv};
pub use terminal::{
    format_count, format_descriptor, format_enumeration_mode, format_field, format_validation,
};
