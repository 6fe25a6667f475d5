// ⚙️ Engine Configuration - Rules as data
// Thresholds and routing loaded from JSON; every field has a default.

use crate::assign::MatterAssigner;
use crate::audit::InvoiceAuditor;
use crate::roster::CaseTypeMap;
use crate::vendor::VendorValidator;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Advisory: partner rate above this is warned about at onboarding
    pub partner_rate_cap: f64,

    /// Advisory: partner rate below this is warned about at onboarding
    pub partner_rate_floor: f64,

    /// Advisory: associate rate above this is warned about at onboarding
    pub associate_rate_cap: f64,

    /// Advisory: partner line items above this many hours
    pub high_partner_hours: f64,

    /// Advisory: any line item above this many hours
    pub excessive_hours: f64,

    /// Case type → practice areas
    pub case_types: CaseTypeMap,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            partner_rate_cap: 800.0,
            partner_rate_floor: 200.0,
            associate_rate_cap: 500.0,
            high_partner_hours: 10.0,
            excessive_hours: 20.0,
            case_types: CaseTypeMap::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: EngineConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        Ok(config)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn vendor_validator(&self) -> VendorValidator {
        VendorValidator {
            partner_rate_cap: self.partner_rate_cap,
            partner_rate_floor: self.partner_rate_floor,
            associate_rate_cap: self.associate_rate_cap,
        }
    }

    pub fn invoice_auditor(&self) -> InvoiceAuditor {
        InvoiceAuditor::with_hour_thresholds(self.high_partner_hours, self.excessive_hours)
    }

    pub fn matter_assigner(&self) -> MatterAssigner {
        MatterAssigner::with_case_types(self.case_types.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.excessive_hours, 20.0);
        assert_eq!(config.partner_rate_cap, 800.0);
        assert!(config.case_types.is_known("regulatory"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{
            "excessive_hours": 16,
            "case_types": { "tax": ["tax", "regulatory"] }
        }"#;

        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.excessive_hours, 16.0);
        assert_eq!(config.partner_rate_cap, 800.0);
        assert_eq!(
            config.case_types.resolve("tax"),
            vec!["tax".to_string(), "regulatory".to_string()]
        );
        // A custom map replaces the default routes
        assert!(!config.case_types.is_known("litigation"));
    }

    #[test]
    fn test_total_mismatch_not_configurable() {
        use crate::audit::Decision;
        use crate::invoice::{Invoice, LineItem, Role};
        use crate::vendor::RawVendorRow;

        // Stale files may still carry a tolerance key; it has no effect
        let config: EngineConfig = serde_json::from_str(r#"{ "amount_tolerance": 1.0 }"#).unwrap();

        let rows = vec![RawVendorRow::new(2)
            .with("firm_name", "Hale LLP")
            .with("partner_rate", "600")
            .with("associate_rate", "300")
            .with("status", "active")];
        let vendors = config.vendor_validator().onboard(&rows).database;

        let invoice = Invoice::new("INV-1", "Hale LLP", 600.99)
            .with_line(LineItem::new(Role::Partner, 600.0, 1.0));
        let decision = config.invoice_auditor().audit_invoice(&invoice, &vendors);

        assert_eq!(decision.decision, Decision::Flagged);
        assert!(decision.has_amount_mismatch());
    }

    #[test]
    fn test_from_file_missing() {
        let result = EngineConfig::from_file("/nonexistent/ebilling.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_none_is_default() {
        let config = EngineConfig::load(None).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
