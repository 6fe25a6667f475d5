// ⚖️ Invoice Auditor - Billed rates vs contracted rates
//
// Precedence per invoice:
//   unknown vendor → Rejected
//   inactive vendor → Rejected (rates not examined)
//   rate overcharges + total integrity → Flagged if any finding, else Approved
//
// Under-billing is never a finding.

use crate::invoice::{Invoice, Role};
use crate::money;
use crate::vendor::{VendorDatabase, VendorRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// DECISION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approved,
    Flagged,
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "APPROVED",
            Decision::Flagged => "FLAGGED",
            Decision::Rejected => "REJECTED",
        }
    }

    /// What AP should do with the payment
    pub fn action(&self) -> PaymentAction {
        match self {
            Decision::Approved => PaymentAction::ReleasePayment,
            Decision::Flagged => PaymentAction::HoldPayment,
            Decision::Rejected => PaymentAction::DoNotPay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentAction {
    ReleasePayment,
    HoldPayment,
    DoNotPay,
}

/// Terminal vendor-level outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    UnknownVendor,
    InactiveVendor,
}

impl Rejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::UnknownVendor => "unknown vendor",
            Rejection::InactiveVendor => "vendor inactive",
        }
    }
}

// ============================================================================
// FINDINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Billed rate strictly above the contracted rate
    RateDiscrepancy,
    /// Declared total differs from Σ rate × hours
    AmountMismatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,

    /// Line role (rate discrepancies only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timekeeper: Option<String>,

    /// Billed rate, or declared total for an amount mismatch
    pub billed: f64,

    /// Contracted rate, or recomputed total for an amount mismatch
    pub contracted: f64,

    /// billed − contracted
    pub delta: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,

    /// delta × hours for rate discrepancies, 0 otherwise
    pub overcharge: f64,
}

impl Finding {
    fn rate(role: &Role, timekeeper: Option<&String>, billed: f64, contracted: f64, hours: f64) -> Self {
        let delta = money::round_cents(billed - contracted);
        Finding {
            kind: FindingKind::RateDiscrepancy,
            role: Some(role.clone()),
            timekeeper: timekeeper.cloned(),
            billed,
            contracted,
            delta,
            hours: Some(hours),
            overcharge: money::round_cents(delta * hours),
        }
    }

    fn amount(declared: f64, computed: f64) -> Self {
        Finding {
            kind: FindingKind::AmountMismatch,
            role: None,
            timekeeper: None,
            billed: declared,
            contracted: computed,
            delta: money::round_cents(declared - computed),
            hours: None,
            overcharge: 0.0,
        }
    }

    pub fn describe(&self) -> String {
        match self.kind {
            FindingKind::RateDiscrepancy => format!(
                "{} billed at ${:.2}/hr vs contracted ${:.2}/hr (+${:.2}/hr)",
                self.role.as_ref().map(Role::as_str).unwrap_or("line"),
                self.billed,
                self.contracted,
                self.delta
            ),
            FindingKind::AmountMismatch => format!(
                "amount mismatch: declared ${:.2} vs computed ${:.2}",
                self.billed, self.contracted
            ),
        }
    }
}

/// Review hint that never changes the decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditWarning {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timekeeper: Option<String>,
    pub issue: String,
}

// ============================================================================
// RATE DECISION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateDecision {
    pub invoice_id: String,
    pub firm_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,

    pub decision: Decision,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,

    pub reason: String,
    pub findings: Vec<Finding>,
    pub warnings: Vec<AuditWarning>,
    pub submitted_total: f64,
    pub computed_total: f64,
    pub total_overcharge: f64,
}

impl RateDecision {
    fn rejected(invoice: &Invoice, vendor: Option<&VendorRecord>, rejection: Rejection) -> Self {
        RateDecision {
            invoice_id: invoice.invoice_id.clone(),
            firm_name: invoice.firm_name.clone(),
            vendor_id: vendor.map(|v| v.vendor_id.clone()),
            decision: Decision::Rejected,
            rejection: Some(rejection),
            reason: rejection.reason().to_string(),
            findings: Vec::new(),
            warnings: Vec::new(),
            submitted_total: invoice.total_amount,
            computed_total: invoice.computed_total(),
            total_overcharge: 0.0,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.decision == Decision::Approved
    }

    pub fn rate_discrepancies(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.kind == FindingKind::RateDiscrepancy)
    }

    pub fn has_amount_mismatch(&self) -> bool {
        self.findings
            .iter()
            .any(|f| f.kind == FindingKind::AmountMismatch)
    }
}

// ============================================================================
// INVOICE AUDITOR
// ============================================================================

pub struct InvoiceAuditor {
    /// Partner hours above this on one line get a review warning
    pub high_partner_hours: f64,

    /// Any line above this many hours gets a review warning
    pub excessive_hours: f64,
}

impl InvoiceAuditor {
    pub fn new() -> Self {
        InvoiceAuditor {
            high_partner_hours: 10.0,
            excessive_hours: 20.0,
        }
    }

    pub fn with_hour_thresholds(high_partner_hours: f64, excessive_hours: f64) -> Self {
        InvoiceAuditor {
            high_partner_hours,
            excessive_hours,
        }
    }

    /// One decision per invoice, in input order
    pub fn audit(&self, invoices: &[Invoice], vendors: &VendorDatabase) -> Vec<RateDecision> {
        let decisions: Vec<RateDecision> = invoices
            .iter()
            .map(|invoice| self.audit_invoice(invoice, vendors))
            .collect();

        let summary = AuditSummary::from_decisions(&decisions);
        info!(
            total = summary.total,
            approved = summary.approved,
            flagged = summary.flagged,
            rejected = summary.rejected,
            overcharge = summary.total_overcharge,
            "invoice audit complete"
        );

        decisions
    }

    pub fn audit_invoice(&self, invoice: &Invoice, vendors: &VendorDatabase) -> RateDecision {
        // 1. Vendor must exist
        let vendor = match vendors.lookup(&invoice.firm_name) {
            Some(vendor) => vendor,
            None => {
                debug!(invoice_id = %invoice.invoice_id, firm = %invoice.firm_name, "unknown vendor");
                return RateDecision::rejected(invoice, None, Rejection::UnknownVendor);
            }
        };

        // 2. Vendor must be active
        if !vendor.is_active() {
            debug!(invoice_id = %invoice.invoice_id, firm = %vendor.firm_name, "vendor inactive");
            return RateDecision::rejected(invoice, Some(vendor), Rejection::InactiveVendor);
        }

        // 3. Rate check per line
        let mut findings = Vec::new();
        let mut warnings = Vec::new();

        for item in &invoice.line_items {
            if let Some(contracted) = vendor.contracted_rate(&item.role) {
                if money::exceeds(item.rate, contracted) {
                    findings.push(Finding::rate(
                        &item.role,
                        item.timekeeper.as_ref(),
                        item.rate,
                        contracted,
                        item.hours,
                    ));
                }
            }

            if item.role == Role::Partner && item.hours > self.high_partner_hours {
                warnings.push(AuditWarning {
                    timekeeper: item.timekeeper.clone(),
                    issue: format!("High partner hours ({}hrs) - consider reviewing", item.hours),
                });
            }
            if item.hours > self.excessive_hours {
                warnings.push(AuditWarning {
                    timekeeper: item.timekeeper.clone(),
                    issue: format!(
                        "Excessive hours ({}hrs) on single line - consider reviewing",
                        item.hours
                    ),
                });
            }
        }

        // 4. Declared total vs recomputed total
        let computed_total = invoice.computed_total();
        if !money::amounts_equal(invoice.total_amount, computed_total) {
            findings.push(Finding::amount(invoice.total_amount, computed_total));
        }

        // 5. Decide
        let total_overcharge = money::round_cents(findings.iter().map(|f| f.overcharge).sum());
        let (decision, reason) = if findings.is_empty() {
            (Decision::Approved, "all rates match contract".to_string())
        } else {
            let details: Vec<String> = findings.iter().map(Finding::describe).collect();
            (
                Decision::Flagged,
                format!(
                    "{} discrepancies (overcharge ${:.2}): {}",
                    findings.len(),
                    total_overcharge,
                    details.join("; ")
                ),
            )
        };

        debug!(
            invoice_id = %invoice.invoice_id,
            decision = decision.as_str(),
            findings = findings.len(),
            "invoice audited"
        );

        RateDecision {
            invoice_id: invoice.invoice_id.clone(),
            firm_name: invoice.firm_name.clone(),
            vendor_id: Some(vendor.vendor_id.clone()),
            decision,
            rejection: None,
            reason,
            findings,
            warnings,
            submitted_total: invoice.total_amount,
            computed_total,
            total_overcharge,
        }
    }
}

impl Default for InvoiceAuditor {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// AP NOTIFICATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApNotification {
    pub notification_id: String,
    pub timestamp: DateTime<Utc>,
    pub invoice_id: String,
    pub firm_name: String,
    pub amount: f64,
    pub status: Decision,
    pub action: PaymentAction,
    pub reason: String,
    pub discrepancies: Vec<Finding>,
    pub total_overcharge: f64,
}

impl ApNotification {
    /// Number the decisions AP-0001, AP-0002, ... in order
    pub fn batch(decisions: &[RateDecision], timestamp: DateTime<Utc>) -> Vec<ApNotification> {
        decisions
            .iter()
            .enumerate()
            .map(|(i, d)| ApNotification {
                notification_id: format!("AP-{:04}", i + 1),
                timestamp,
                invoice_id: d.invoice_id.clone(),
                firm_name: d.firm_name.clone(),
                amount: d.submitted_total,
                status: d.decision,
                action: d.decision.action(),
                reason: d.reason.clone(),
                discrepancies: d.findings.clone(),
                total_overcharge: d.total_overcharge,
            })
            .collect()
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub total: usize,
    pub approved: usize,
    pub flagged: usize,
    pub rejected: usize,
    pub approved_amount: f64,
    pub flagged_amount: f64,
    pub rejected_amount: f64,
    pub total_overcharge: f64,
}

impl AuditSummary {
    pub fn from_decisions(decisions: &[RateDecision]) -> Self {
        let mut summary = AuditSummary {
            total: decisions.len(),
            ..AuditSummary::default()
        };

        for d in decisions {
            match d.decision {
                Decision::Approved => {
                    summary.approved += 1;
                    summary.approved_amount += d.submitted_total;
                }
                Decision::Flagged => {
                    summary.flagged += 1;
                    summary.flagged_amount += d.submitted_total;
                }
                Decision::Rejected => {
                    summary.rejected += 1;
                    summary.rejected_amount += d.submitted_total;
                }
            }
            summary.total_overcharge += d.total_overcharge;
        }

        summary.approved_amount = money::round_cents(summary.approved_amount);
        summary.flagged_amount = money::round_cents(summary.flagged_amount);
        summary.rejected_amount = money::round_cents(summary.rejected_amount);
        summary.total_overcharge = money::round_cents(summary.total_overcharge);
        summary
    }

    pub fn summary(&self) -> String {
        format!(
            "Invoices: {} (approved {}, flagged {}, rejected {}), approved ${:.2}, on hold ${:.2}, overcharges ${:.2}",
            self.total,
            self.approved,
            self.flagged,
            self.rejected,
            self.approved_amount,
            self.flagged_amount,
            self.total_overcharge
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
