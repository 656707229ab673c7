//! CSV output formatting for address records.

use super::terminal::format_field;
use crate::models::{AddressDraft, IpAddressRecord};

const DRAFT_HEADER: &str = r#""cnt","address","role","status","name""#;
const RECORD_HEADER: &str =
    r#""id","subnet_id","address","role","status","name","equipment_id","note","updated_at""#;

/// Render enumerated drafts as CSV, one row per address.
pub fn drafts_csv(drafts: &[AddressDraft]) -> String {
    let mut out = String::from(DRAFT_HEADER);
    out.push('\n');
    for (i, d) in drafts.iter().enumerate() {
        out.push_str(&format!(
            "{cnt},{address},{role},{status},{name}\n",
            cnt = format_field(i + 1, 6),
            address = format_field(d.address, 18),
            role = format_field(d.role, 11),
            status = format_field(d.status, 11),
            name = escape_csv_field(d.name.as_deref().unwrap_or("")),
        ));
    }
    out
}

/// Render persisted address records as CSV.
pub fn address_records_csv(records: &[IpAddressRecord]) -> String {
    let mut out = String::from(RECORD_HEADER);
    out.push('\n');
    for r in records {
        out.push_str(&format!(
            "{id},{subnet_id},{address},{role},{status},{name},{equipment},{note},{updated_at}\n",
            id = format_field(r.id, 6),
            subnet_id = format_field(r.subnet_id, 6),
            address = format_field(r.address, 18),
            role = format_field(r.role, 11),
            status = format_field(r.status, 11),
            name = escape_csv_field(r.name.as_deref().unwrap_or("")),
            equipment = escape_csv_field(r.equipment_id.as_deref().unwrap_or("")),
            note = escape_csv_field(r.note.as_deref().unwrap_or("")),
            updated_at = format_field(r.updated_at.to_rfc3339(), 0),
        ));
    }
    out
}

/// Quote a free-text field, doubling embedded quotes.
fn escape_csv_field(input: &str) -> String {
    format!("\"{}\"", input.replace('"', "\"\""))
}
