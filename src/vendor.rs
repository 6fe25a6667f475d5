// 🏛️ Vendor Validator - Onboarding law firms against billing guidelines
//
// Checks run in a fixed order per row: required fields, rates, status.
// A failing row is reported and skipped; it never aborts the batch.
// Accepted records are keyed by firm name (last write wins).

use crate::error::IntakeError;
use crate::invoice::Role;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Columns every vendor row must carry, in check order
pub const REQUIRED_FIELDS: [&str; 4] = ["firm_name", "partner_rate", "associate_rate", "status"];

/// Columns the validator interprets; everything else is opaque contact data
const CONTRACT_FIELDS: [&str; 6] = [
    "firm_name",
    "partner_rate",
    "associate_rate",
    "paralegal_rate",
    "status",
    "payment_terms",
];

const PAYMENT_TERMS: [&str; 3] = ["net_30", "net_45", "net_60"];

/// First vendor id handed out (VND-1001)
pub const FIRST_VENDOR_ID: usize = 1001;

pub fn format_vendor_id(number: usize) -> String {
    format!("VND-{}", number)
}

/// Numeric part of a `VND-nnnn` id
pub fn vendor_id_number(vendor_id: &str) -> Option<usize> {
    vendor_id.strip_prefix("VND-")?.parse().ok()
}

// ============================================================================
// RAW ROW
// ============================================================================

/// One source row before validation: column name → raw text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVendorRow {
    /// Line in the source file (1-based, header is line 1)
    pub line: usize,
    pub fields: BTreeMap<String, String>,
}

impl RawVendorRow {
    pub fn new(line: usize) -> Self {
        RawVendorRow {
            line,
            fields: BTreeMap::new(),
        }
    }

    /// Builder pattern: add a column
    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &str, value: &str) {
        self.fields
            .insert(column.trim().to_lowercase(), value.to_string());
    }

    /// Trimmed value, `None` when absent or blank
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// True when no column carries any text
    pub fn is_blank(&self) -> bool {
        self.fields.values().all(|v| v.trim().is_empty())
    }
}

// ============================================================================
// VENDOR RECORD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorStatus {
    Active,
    Inactive,
}

impl VendorStatus {
    /// Recognizes `active` / `inactive`, case-insensitive, surrounding whitespace ignored
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "active" => Some(VendorStatus::Active),
            "inactive" => Some(VendorStatus::Inactive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VendorStatus::Active => "active",
            VendorStatus::Inactive => "inactive",
        }
    }
}

/// An admitted law firm with its contracted rates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorRecord {
    /// Assigned on admission (VND-1001, VND-1002, ...)
    #[serde(default)]
    pub vendor_id: String,

    pub firm_name: String,

    /// Contracted partner rate per hour
    pub partner_rate: f64,

    /// Contracted associate rate per hour
    pub associate_rate: f64,

    /// Contracted paralegal rate, when the contract has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paralegal_rate: Option<f64>,

    pub status: VendorStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_terms: Option<String>,

    /// Contact columns carried verbatim
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contact: BTreeMap<String, String>,
}

impl VendorRecord {
    pub fn is_active(&self) -> bool {
        self.status == VendorStatus::Active
    }

    /// Contracted rate for a billing role; `None` means the role is not rate-checked
    pub fn contracted_rate(&self, role: &Role) -> Option<f64> {
        match role {
            Role::Partner => Some(self.partner_rate),
            Role::Associate => Some(self.associate_rate),
            Role::Paralegal => self.paralegal_rate,
            Role::Other(_) => None,
        }
    }
}

// ============================================================================
// VENDOR DATABASE
// ============================================================================

/// Accepted vendors keyed by firm name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorDatabase {
    vendors: BTreeMap<String, VendorRecord>,
}

impl VendorDatabase {
    pub fn new() -> Self {
        VendorDatabase::default()
    }

    /// Build from accepted records in source order.
    ///
    /// A repeated firm name replaces the earlier record but keeps the vendor id
    /// of its first appearance, so identical input always yields identical ids.
    pub fn from_accepted<I>(records: I) -> Self
    where
        I: IntoIterator<Item = VendorRecord>,
    {
        let mut first_seen: Vec<String> = Vec::new();
        let mut vendors: BTreeMap<String, VendorRecord> = BTreeMap::new();

        for record in records {
            if !vendors.contains_key(&record.firm_name) {
                first_seen.push(record.firm_name.clone());
            } else {
                debug!(firm = %record.firm_name, "duplicate firm name, last occurrence wins");
            }
            vendors.insert(record.firm_name.clone(), record);
        }

        for (index, firm_name) in first_seen.iter().enumerate() {
            if let Some(record) = vendors.get_mut(firm_name) {
                record.vendor_id = format_vendor_id(FIRST_VENDOR_ID + index);
            }
        }

        VendorDatabase { vendors }
    }

    /// Rebuild from persisted records, keeping their vendor ids
    pub fn restore<I>(records: I) -> Self
    where
        I: IntoIterator<Item = VendorRecord>,
    {
        let vendors = records
            .into_iter()
            .map(|r| (r.firm_name.clone(), r))
            .collect();
        VendorDatabase { vendors }
    }

    /// Exact firm name first, then case-insensitive match on trimmed names
    pub fn lookup(&self, firm_name: &str) -> Option<&VendorRecord> {
        if let Some(record) = self.vendors.get(firm_name) {
            return Some(record);
        }

        let wanted = firm_name.trim().to_lowercase();
        self.vendors
            .values()
            .find(|r| r.firm_name.trim().to_lowercase() == wanted)
    }

    pub fn get(&self, firm_name: &str) -> Option<&VendorRecord> {
        self.vendors.get(firm_name)
    }

    pub fn records(&self) -> impl Iterator<Item = &VendorRecord> {
        self.vendors.values()
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }

    /// SHA-256 over the canonical JSON form (identical data ⇒ identical digest)
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_string(&self.vendors).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// ONBOARDING OUTCOME
// ============================================================================

/// Non-blocking observation about an accepted vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorWarning {
    pub line: usize,
    pub firm_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingOutcome {
    pub processed: usize,
    pub database: VendorDatabase,
    pub rejected: Vec<IntakeError>,
    pub warnings: Vec<VendorWarning>,
}

impl OnboardingOutcome {
    pub fn summary(&self) -> String {
        format!(
            "Vendors processed: {}, onboarded: {}, rejected: {}, warnings: {}",
            self.processed,
            self.database.len(),
            self.rejected.len(),
            self.warnings.len()
        )
    }
}

// ============================================================================
// VENDOR VALIDATOR
// ============================================================================

pub struct VendorValidator {
    /// Partner rates above this produce a warning
    pub partner_rate_cap: f64,

    /// Partner rates below this produce a warning
    pub partner_rate_floor: f64,

    /// Associate rates above this produce a warning
    pub associate_rate_cap: f64,
}

impl VendorValidator {
    pub fn new() -> Self {
        VendorValidator {
            partner_rate_cap: 800.0,
            partner_rate_floor: 200.0,
            associate_rate_cap: 500.0,
        }
    }

    /// Validate every row independently, in input order
    pub fn validate(&self, rows: &[RawVendorRow]) -> Vec<Result<VendorRecord, IntakeError>> {
        rows.iter().map(|row| self.validate_row(row)).collect()
    }

    /// Validate a single row: required fields, then rates, then status
    pub fn validate_row(&self, row: &RawVendorRow) -> Result<VendorRecord, IntakeError> {
        // (a) required fields present
        for field in REQUIRED_FIELDS {
            if row.get(field).is_none() {
                return Err(IntakeError::MissingField {
                    line: row.line,
                    field: field.to_string(),
                });
            }
        }

        let firm_name = row.get("firm_name").unwrap_or_default().to_string();

        // (b) rates are positive numbers
        let partner_rate = parse_rate(row, "partner_rate", &firm_name)?;
        let associate_rate = parse_rate(row, "associate_rate", &firm_name)?;
        let paralegal_rate = match row.get("paralegal_rate") {
            Some(_) => Some(parse_rate(row, "paralegal_rate", &firm_name)?),
            None => None,
        };

        // (c) status is recognized
        let raw_status = row.get("status").unwrap_or_default();
        let status = VendorStatus::parse(raw_status).ok_or_else(|| IntakeError::InvalidStatus {
            line: row.line,
            firm: firm_name.clone(),
            value: raw_status.to_string(),
        })?;

        let contact = row
            .fields
            .iter()
            .filter(|(column, _)| !CONTRACT_FIELDS.contains(&column.as_str()))
            .map(|(column, value)| (column.clone(), value.trim().to_string()))
            .collect();

        Ok(VendorRecord {
            vendor_id: String::new(),
            firm_name,
            partner_rate,
            associate_rate,
            paralegal_rate,
            status,
            payment_terms: row.get("payment_terms").map(|t| t.to_string()),
            contact,
        })
    }

    /// Advisory checks on an accepted record
    pub fn warnings_for(&self, line: usize, record: &VendorRecord) -> Vec<VendorWarning> {
        let mut warnings = Vec::new();
        let mut push = |message: String| {
            warnings.push(VendorWarning {
                line,
                firm_name: record.firm_name.clone(),
                message,
            })
        };

        if record.partner_rate > self.partner_rate_cap {
            push(format!(
                "Partner rate ${:.2}/hr exceeds preferred cap of ${:.2}/hr",
                record.partner_rate, self.partner_rate_cap
            ));
        }
        if record.partner_rate < self.partner_rate_floor {
            push(format!(
                "Partner rate ${:.2}/hr is below ${:.2}/hr - please verify",
                record.partner_rate, self.partner_rate_floor
            ));
        }
        if record.associate_rate > self.associate_rate_cap {
            push(format!(
                "Associate rate ${:.2}/hr exceeds preferred cap of ${:.2}/hr",
                record.associate_rate, self.associate_rate_cap
            ));
        }
        if let Some(terms) = &record.payment_terms {
            if !PAYMENT_TERMS.contains(&terms.to_lowercase().as_str()) {
                push(format!(
                    "Payment terms '{}' not one of {}",
                    terms,
                    PAYMENT_TERMS.join(", ")
                ));
            }
        }

        warnings
    }

    /// Validate a batch and build the vendor database from the accepted rows
    pub fn onboard(&self, rows: &[RawVendorRow]) -> OnboardingOutcome {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        let mut warnings = Vec::new();

        for (row, result) in rows.iter().zip(self.validate(rows)) {
            match result {
                Ok(record) => {
                    debug!(line = row.line, firm = %record.firm_name, status = record.status.as_str(), "vendor accepted");
                    warnings.extend(self.warnings_for(row.line, &record));
                    accepted.push(record);
                }
                Err(err) => {
                    warn!(line = row.line, code = err.code(), "vendor rejected: {}", err);
                    rejected.push(err);
                }
            }
        }

        let database = VendorDatabase::from_accepted(accepted);
        info!(
            processed = rows.len(),
            onboarded = database.len(),
            rejected = rejected.len(),
            "vendor onboarding complete"
        );

        OnboardingOutcome {
            processed: rows.len(),
            database,
            rejected,
            warnings,
        }
    }
}

impl Default for VendorValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_rate(row: &RawVendorRow, field: &str, firm_name: &str) -> Result<f64, IntakeError> {
    let raw = row.get(field).unwrap_or_default();
    let cleaned = raw.trim_start_matches('$').replace(',', "");

    match cleaned.trim().parse::<f64>() {
        Ok(rate) if rate.is_finite() && rate > 0.0 => Ok(rate),
        _ => Err(IntakeError::InvalidRate {
            line: row.line,
            firm: firm_name.to_string(),
            field: field.to_string(),
            value: raw.to_string(),
        }),
    }
}

// ============================================================================
// TESTS
// ============================================================================
