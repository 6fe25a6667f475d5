// 🔗 Pipeline - Vendor Validator → Invoice Auditor → Matter Assigner
//
// One pass per stage, fixed order, no retries. Each stage reads the previous
// stage's finished output value; nothing is shared through globals.

use crate::assign::{AssignmentOutcome, Matter, MatterAssigner};
use crate::audit::{ApNotification, AuditSummary, InvoiceAuditor, RateDecision};
use crate::config::EngineConfig;
use crate::intake;
use crate::invoice::Invoice;
use crate::report::AssignmentReport;
use crate::roster::Lawyer;
use crate::store;
use crate::vendor::{OnboardingOutcome, RawVendorRow, VendorValidator};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const VENDOR_DATABASE_FILE: &str = "vendor_database.json";
pub const AP_NOTIFICATIONS_FILE: &str = "ap_notifications.json";
pub const MATTER_ASSIGNMENTS_FILE: &str = "matter_assignments.json";
pub const ASSIGNMENT_REPORT_FILE: &str = "assignment_report.json";
/// Roster with post-run caseloads; same shape as the roster input
pub const ROSTER_STATE_FILE: &str = "roster_state.json";

/// Fully materialised inputs for one run
#[derive(Debug, Clone, Default)]
pub struct PipelineInput {
    pub vendor_rows: Vec<RawVendorRow>,
    pub invoices: Vec<Invoice>,
    pub lawyers: Vec<Lawyer>,
    pub matters: Vec<Matter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub onboarding: OnboardingOutcome,
    pub decisions: Vec<RateDecision>,
    pub notifications: Vec<ApNotification>,
    pub audit_summary: AuditSummary,
    pub assignment: AssignmentOutcome,
    pub report: AssignmentReport,
}

/// `matter_assignments.json` shape
#[derive(Serialize)]
struct AssignmentsDocument<'a> {
    assignments: &'a [crate::assign::Assignment],
    unassigned: &'a [crate::assign::UnassignedMatter],
}

pub struct Pipeline {
    validator: VendorValidator,
    auditor: InvoiceAuditor,
    assigner: MatterAssigner,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::from_config(&EngineConfig::default())
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Pipeline {
            validator: config.vendor_validator(),
            auditor: config.invoice_auditor(),
            assigner: config.matter_assigner(),
        }
    }

    pub fn run(&self, input: &PipelineInput, now: DateTime<Utc>) -> PipelineOutput {
        // 1. Vendors
        let onboarding = self.validator.onboard(&input.vendor_rows);

        // 2. Invoices against the vendor database just built
        let decisions = self.auditor.audit(&input.invoices, &onboarding.database);
        let notifications = ApNotification::batch(&decisions, now);
        let audit_summary = AuditSummary::from_decisions(&decisions);

        // 3. Matters against the roster
        let assignment = self.assigner.assign(&input.matters, &input.lawyers);
        let report = AssignmentReport::from_outcome(&assignment);

        info!(
            vendors = onboarding.database.len(),
            invoices = decisions.len(),
            assigned = report.assigned,
            unassigned = report.unassigned,
            "pipeline run complete"
        );

        PipelineOutput {
            onboarding,
            decisions,
            notifications,
            audit_summary,
            assignment,
            report,
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineOutput {
    /// Write the stage files and the updated roster into `dir`; returns the paths written
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let vendors: Vec<_> = self.onboarding.database.records().collect();
        let assignments = AssignmentsDocument {
            assignments: &self.assignment.assignments,
            unassigned: &self.assignment.unassigned,
        };

        let paths = vec![
            dir.join(VENDOR_DATABASE_FILE),
            dir.join(AP_NOTIFICATIONS_FILE),
            dir.join(MATTER_ASSIGNMENTS_FILE),
            dir.join(ASSIGNMENT_REPORT_FILE),
            dir.join(ROSTER_STATE_FILE),
        ];

        intake::write_json(&paths[0], &vendors)?;
        intake::write_json(&paths[1], &self.notifications)?;
        intake::write_json(&paths[2], &assignments)?;
        intake::write_json(&paths[3], &self.report)?;
        intake::write_json(&paths[4], &self.assignment.roster_document())?;

        Ok(paths)
    }

    /// Persist every stage under one run id
    pub fn persist(&self, conn: &Connection, run_id: &str) -> Result<()> {
        store::upsert_vendors(conn, &self.onboarding.database)?;
        store::insert_decisions(conn, run_id, &self.decisions)?;
        store::insert_assignments(
            conn,
            run_id,
            &self.assignment.assignments,
            &self.assignment.unassigned,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::{LineItem, Role};

    fn input() -> PipelineInput {
        PipelineInput {
            vendor_rows: vec![RawVendorRow::new(2)
                .with("firm_name", "Baker & Sterling LLP")
                .with("partner_rate", "650")
                .with("associate_rate", "425")
                .with("status", "active")],
            invoices: vec![Invoice::new("INV-001", "Baker & Sterling LLP", 3250.0)
                .with_line(LineItem::new(Role::Partner, 650.0, 5.0))],
            lawyers: vec![Lawyer::new("Robert Chen", &["regulatory"], 2)],
            matters: vec![Matter::new("MAT-001", "regulatory")],
        }
    }

    #[test]
    fn test_run_all_stages() {
        let output = Pipeline::new().run(&input(), Utc::now());

        assert_eq!(output.onboarding.database.len(), 1);
        assert!(output.decisions[0].is_approved());
        assert_eq!(output.notifications[0].notification_id, "AP-0001");
        assert_eq!(output.report.assigned, 1);
        assert_eq!(output.assignment.roster[0].current_caseload, 1);
    }

    #[test]
    fn test_persist() {
        let conn = Connection::open_in_memory().unwrap();
        store::setup_database(&conn).unwrap();

        let output = Pipeline::new().run(&input(), Utc::now());
        output.persist(&conn, "run-1").unwrap();

        assert_eq!(store::count_assignments(&conn, "run-1").unwrap(), 1);
        assert_eq!(store::load_vendor_database(&conn).unwrap().len(), 1);
    }
}
