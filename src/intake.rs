// 📥 Intake Adapters - Files in, records out
//
// CSV vendor rows and matters, JSON invoices and roster, JSON writers for
// stage outputs. Shape problems are fatal for the batch (BatchError);
// content problems are left to the stages.

use crate::assign::Matter;
use crate::error::BatchError;
use crate::invoice::Invoice;
use crate::roster::{Lawyer, Roster};
use crate::vendor::{RawVendorRow, REQUIRED_FIELDS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

// ============================================================================
// VENDOR ROWS (CSV)
// ============================================================================

/// Parse vendor rows from CSV. Headers are matched case-insensitively.
///
/// Fatal when the header carries none of the required columns, or when a row
/// has no text in any column.
pub fn read_vendor_rows<R: Read>(reader: R, source_name: &str) -> Result<Vec<RawVendorRow>, BatchError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase().replace(' ', "_"))
        .collect();

    if !headers.iter().any(|h| REQUIRED_FIELDS.contains(&h.as_str())) {
        return Err(BatchError::malformed(
            source_name,
            "header has no recognizable vendor columns",
        ));
    }

    let mut rows = Vec::new();
    for (index, record) in rdr.records().enumerate() {
        let record = record?;
        // Header is line 1
        let mut row = RawVendorRow::new(index + 2);
        for (column, value) in headers.iter().zip(record.iter()) {
            row.set(column, value);
        }

        if row.is_blank() {
            return Err(BatchError::malformed(
                source_name,
                format!("line {} has no decipherable fields", row.line),
            ));
        }
        rows.push(row);
    }

    debug!(source = source_name, rows = rows.len(), "vendor rows read");
    Ok(rows)
}

pub fn load_vendor_rows(path: &Path) -> Result<Vec<RawVendorRow>> {
    let file = File::open(path).with_context(|| format!("Failed to open vendor CSV: {:?}", path))?;
    let rows = read_vendor_rows(file, &source_name(path))
        .with_context(|| format!("Failed to read vendor rows from {:?}", path))?;
    Ok(rows)
}

/// Vendor rows posted as JSON objects (column → value).
///
/// Numbers and booleans are taken as their text so the validator judges
/// them; `null` counts as an empty cell. Same blank-row rule as the CSV path.
pub fn vendor_rows_from_json(
    objects: &[serde_json::Map<String, serde_json::Value>],
    source_name: &str,
) -> Result<Vec<RawVendorRow>, BatchError> {
    let mut rows = Vec::with_capacity(objects.len());

    for (index, object) in objects.iter().enumerate() {
        let mut row = RawVendorRow::new(index + 1);
        for (column, value) in object {
            let text = match value {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            row.set(&column.trim().to_lowercase().replace(' ', "_"), &text);
        }

        if row.is_blank() {
            return Err(BatchError::malformed(
                source_name,
                format!("row {} has no decipherable fields", row.line),
            ));
        }
        rows.push(row);
    }

    Ok(rows)
}

// ============================================================================
// INVOICES (JSON)
// ============================================================================

/// Accepts a bare array or an inbox document `{ "invoices": [...] }`
#[derive(Deserialize)]
#[serde(untagged)]
enum InvoiceDocument {
    List(Vec<Invoice>),
    Inbox { invoices: Vec<Invoice> },
}

pub fn parse_invoices(json: &str) -> Result<Vec<Invoice>, BatchError> {
    let document: InvoiceDocument = serde_json::from_str(json)?;
    Ok(match document {
        InvoiceDocument::List(invoices) => invoices,
        InvoiceDocument::Inbox { invoices } => invoices,
    })
}

pub fn load_invoices(path: &Path) -> Result<Vec<Invoice>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read invoices: {:?}", path))?;
    let invoices = parse_invoices(&content)
        .with_context(|| format!("Failed to parse invoices JSON: {:?}", path))?;
    debug!(invoices = invoices.len(), "invoices loaded");
    Ok(invoices)
}

// ============================================================================
// ROSTER (JSON)
// ============================================================================

/// Accepts `{ "lawyers": [...] }` or a bare array
#[derive(Deserialize)]
#[serde(untagged)]
enum RosterDocument {
    Wrapped { lawyers: Vec<Lawyer> },
    List(Vec<Lawyer>),
}

pub fn parse_roster(json: &str) -> Result<Roster, BatchError> {
    let document: RosterDocument = serde_json::from_str(json)?;
    let lawyers = match document {
        RosterDocument::Wrapped { lawyers } => lawyers,
        RosterDocument::List(lawyers) => lawyers,
    };
    Roster::new(lawyers)
}

pub fn load_roster(path: &Path) -> Result<Roster> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read roster: {:?}", path))?;
    let roster =
        parse_roster(&content).with_context(|| format!("Invalid roster: {:?}", path))?;
    debug!(lawyers = roster.len(), "roster loaded");
    Ok(roster)
}

// ============================================================================
// MATTERS (CSV)
// ============================================================================

pub fn read_matters<R: Read>(reader: R, source_name: &str) -> Result<Vec<Matter>, BatchError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut matters = Vec::new();
    for (index, result) in rdr.deserialize::<Matter>().enumerate() {
        let matter = result?;
        if matter.matter_id.is_empty() && matter.case_type.is_empty() {
            return Err(BatchError::malformed(
                source_name,
                format!("line {} has no matter id or case type", index + 2),
            ));
        }
        matters.push(matter);
    }

    debug!(source = source_name, matters = matters.len(), "matters read");
    Ok(matters)
}

pub fn load_matters(path: &Path) -> Result<Vec<Matter>> {
    let file = File::open(path).with_context(|| format!("Failed to open matters CSV: {:?}", path))?;
    let matters = read_matters(file, &source_name(path))
        .with_context(|| format!("Failed to read matters from {:?}", path))?;
    Ok(matters)
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Pretty-printed JSON, parent directories created as needed
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
    }

    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Failed to write JSON to {:?}", path))?;
    writer.flush()?;

    debug!(path = %path.display(), "output written");
    Ok(())
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAW_FIRMS: &str = "\
firm_name,partner_rate,associate_rate,status,contact_name,contact_email
Baker & Sterling LLP,650,425,active,Jane Baker,jane@bakersterling.com
Fitzgerald & Moore, $700 ,450,Inactive,Tom Moore,tom@fm.com
Hale LLP,,300,active,,
";

    #[test]
    fn test_read_vendor_rows() {
        let rows = read_vendor_rows(LAW_FIRMS.as_bytes(), "law_firms.csv").unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].get("partner_rate"), Some("$700"));
        assert_eq!(rows[2].get("partner_rate"), None);
        assert_eq!(rows[2].get("contact_email"), None);
    }

    #[test]
    fn test_unrecognized_header_is_fatal() {
        let csv = "name,price\nWidget,3\n";
        let err = read_vendor_rows(csv.as_bytes(), "junk.csv").unwrap_err();
        assert!(matches!(err, BatchError::Malformed { .. }));
    }

    #[test]
    fn test_blank_row_is_fatal() {
        let csv = "firm_name,partner_rate,associate_rate,status\nA,1,1,active\n , , , \n";
        let err = read_vendor_rows(csv.as_bytes(), "law_firms.csv").unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_header_case_and_spaces_normalized() {
        let csv = "Firm Name,Partner Rate,Associate Rate,Status\nA,600,300,active\n";
        let rows = read_vendor_rows(csv.as_bytes(), "law_firms.csv").unwrap();
        assert_eq!(rows[0].get("firm_name"), Some("A"));
        assert_eq!(rows[0].get("associate_rate"), Some("300"));
    }

    #[test]
    fn test_vendor_rows_from_json_accepts_numbers() {
        let objects: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(
            r#"[
                {"Firm Name": "Baker & Sterling LLP", "partner_rate": 650, "associate_rate": 425.5, "status": "active"},
                {"firm_name": "Hale LLP", "partner_rate": -5, "associate_rate": null, "status": "active"}
            ]"#,
        )
        .unwrap();

        let rows = vendor_rows_from_json(&objects, "request").unwrap();
        assert_eq!(rows[0].get("firm_name"), Some("Baker & Sterling LLP"));
        assert_eq!(rows[0].get("partner_rate"), Some("650"));
        assert_eq!(rows[1].get("associate_rate"), None);

        let outcome = crate::vendor::VendorValidator::new().onboard(&rows);
        let baker = outcome.database.get("Baker & Sterling LLP").unwrap();
        assert_eq!(baker.partner_rate, 650.0);
        assert_eq!(baker.associate_rate, 425.5);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].code(), "missing_field");

        let blank: Vec<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_str(r#"[{"firm_name": null}]"#).unwrap();
        assert!(vendor_rows_from_json(&blank, "request").is_err());
    }

    #[test]
    fn test_parse_invoices_both_shapes() {
        let bare = r#"[{"invoice_id":"INV-1","firm_name":"A","total_amount":0}]"#;
        let inbox = r#"{"invoices":[{"invoice_id":"INV-1","vendor":"A","total_amount":0,"line_items":[]}]}"#;

        assert_eq!(parse_invoices(bare).unwrap().len(), 1);
        assert_eq!(parse_invoices(inbox).unwrap()[0].firm_name, "A");
        assert!(parse_invoices("{\"nothing\": 1}").is_err());
    }

    #[test]
    fn test_parse_roster_validates() {
        let ok = r#"{"lawyers":[{"name":"Robert Chen","practice_areas":["regulatory"],"max_caseload":5}]}"#;
        assert_eq!(parse_roster(ok).unwrap().len(), 1);

        let dup = r#"[{"name":"A","practice_areas":["x"],"max_caseload":1},{"name":"A","practice_areas":["y"],"max_caseload":1}]"#;
        assert!(parse_roster(dup).is_err());
    }

    #[test]
    fn test_read_matters() {
        let csv = "\
matter_id,matter_name,case_type,priority,client,outside_counsel
MAT-001,Acme v. Globex,litigation,high,Acme Corp,Baker & Sterling LLP
MAT-002,Widget patent,patent_infringement,,,
";
        let matters = read_matters(csv.as_bytes(), "matters.csv").unwrap();

        assert_eq!(matters.len(), 2);
        assert_eq!(matters[0].priority.as_deref(), Some("high"));
        assert_eq!(matters[1].priority, None);
        assert_eq!(matters[1].case_type, "patent_infringement");
    }
}
