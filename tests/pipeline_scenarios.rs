// End-to-end runs over the sample files in data/

use chrono::{TimeZone, Utc};
use ebilling::{
    intake, pipeline, store, Decision, EngineConfig, FindingKind, IntakeError, Pipeline,
    PipelineInput, Role, UnassignedReason,
};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

fn data(file: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data").join(file)
}

fn sample_input() -> PipelineInput {
    PipelineInput {
        vendor_rows: intake::load_vendor_rows(&data("law_firms.csv")).unwrap(),
        invoices: intake::load_invoices(&data("invoices.json")).unwrap(),
        lawyers: intake::load_roster(&data("internal_lawyers.json")).unwrap().lawyers,
        matters: intake::load_matters(&data("matters.csv")).unwrap(),
    }
}

fn run() -> ebilling::PipelineOutput {
    let config = EngineConfig::load(Some(data("config.json").as_path())).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    Pipeline::from_config(&config).run(&sample_input(), now)
}

#[test]
fn test_vendor_onboarding_from_sample_file() {
    let output = run();
    let onboarding = &output.onboarding;

    assert_eq!(onboarding.processed, 7);
    assert_eq!(onboarding.database.len(), 4);

    let codes: Vec<&str> = onboarding.rejected.iter().map(IntakeError::code).collect();
    assert_eq!(codes, vec!["invalid_rate", "missing_field", "invalid_status"]);

    let premier = onboarding.database.get("Premier Counsel LLP").unwrap();
    assert!(premier.is_active());
    assert_eq!(premier.vendor_id, "VND-1004");
    assert_eq!(
        onboarding
            .warnings
            .iter()
            .filter(|w| w.firm_name == "Premier Counsel LLP")
            .count(),
        3
    );
}

#[test]
fn test_invoice_decisions_follow_input_order() {
    let output = run();
    let decisions: Vec<(&str, Decision)> = output
        .decisions
        .iter()
        .map(|d| (d.invoice_id.as_str(), d.decision))
        .collect();

    assert_eq!(
        decisions,
        vec![
            ("INV-2024-001", Decision::Flagged),
            ("INV-2024-002", Decision::Rejected),
            ("INV-2024-003", Decision::Approved),
            ("INV-2024-004", Decision::Rejected),
            ("INV-2024-005", Decision::Flagged),
        ]
    );
}

#[test]
fn test_partner_overcharge_scenario() {
    let output = run();
    let baker = &output.decisions[0];

    assert_eq!(baker.findings.len(), 1);
    let finding = &baker.findings[0];
    assert_eq!(finding.kind, FindingKind::RateDiscrepancy);
    assert_eq!(finding.role, Some(Role::Partner));
    assert_eq!(finding.billed, 700.0);
    assert_eq!(finding.contracted, 650.0);
    assert_eq!(finding.delta, 50.0);
    assert_eq!(baker.total_overcharge, 250.0);
}

#[test]
fn test_inactive_and_unknown_vendor_reasons() {
    let output = run();

    assert_eq!(output.decisions[1].reason, "vendor inactive");
    assert_eq!(output.decisions[3].reason, "unknown vendor");
    assert!(output.decisions[4].has_amount_mismatch());
}

#[test]
fn test_ap_notifications() {
    let output = run();
    let actions: Vec<String> = output
        .notifications
        .iter()
        .map(|n| serde_json::to_value(n.action).unwrap().as_str().unwrap().to_string())
        .collect();

    assert_eq!(
        actions,
        vec!["HOLD_PAYMENT", "DO_NOT_PAY", "RELEASE_PAYMENT", "DO_NOT_PAY", "HOLD_PAYMENT"]
    );
    assert_eq!(output.notifications[4].notification_id, "AP-0005");
    assert_eq!(output.audit_summary.approved_amount, 4960.0);
}

#[test]
fn test_matter_assignment_scenarios() {
    let output = run();
    let assigned: Vec<(&str, &str)> = output
        .assignment
        .assignments
        .iter()
        .map(|a| (a.matter_id.as_str(), a.lawyer_name.as_str()))
        .collect();

    assert_eq!(
        assigned,
        vec![
            ("MAT-2024-001", "Sarah Patel"),
            ("MAT-2024-003", "David Okafor"),
            ("MAT-2024-004", "Emily Ross"),
            ("MAT-2024-006", "David Okafor"),
            ("MAT-2024-007", "David Okafor"),
        ]
    );

    let unassigned: Vec<(&str, UnassignedReason)> = output
        .assignment
        .unassigned
        .iter()
        .map(|u| (u.matter_id.as_str(), u.reason))
        .collect();
    assert_eq!(
        unassigned,
        vec![
            ("MAT-2024-002", UnassignedReason::AllMatchedAtCapacityOrUnavailable),
            ("MAT-2024-005", UnassignedReason::NoPracticeAreaMatch),
        ]
    );

    let report = &output.report;
    assert_eq!(report.total_matters, 7);
    assert!((report.fill_rate - 5.0 / 7.0).abs() < 1e-9);
    assert_eq!(report.per_lawyer["Lisa Nakamura"], 0);
    assert_eq!(report.per_lawyer["David Okafor"], 3);
}

#[test]
fn test_outputs_written_and_persisted() {
    let output = run();
    let dir = std::env::temp_dir().join(format!("ebilling-{}", uuid::Uuid::new_v4()));

    let written = output.write_to(&dir).unwrap();
    assert_eq!(written.len(), 5);
    assert!(dir.join(pipeline::ASSIGNMENT_REPORT_FILE).exists());

    // The updated roster reads back as the next run's input
    let roster = intake::load_roster(&dir.join(pipeline::ROSTER_STATE_FILE)).unwrap();
    let caseload = |name: &str| {
        roster
            .lawyers
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.current_caseload)
            .unwrap()
    };
    assert_eq!(roster.lawyers.len(), 7);
    assert_eq!(caseload("David Okafor"), 5);
    assert_eq!(caseload("Sarah Patel"), 4);
    assert_eq!(caseload("Emily Ross"), 2);
    assert_eq!(caseload("Lisa Nakamura"), 0);

    let notifications: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.join(pipeline::AP_NOTIFICATIONS_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(notifications.as_array().unwrap().len(), 5);
    std::fs::remove_dir_all(&dir).unwrap();

    let conn = Connection::open_in_memory().unwrap();
    store::setup_database(&conn).unwrap();
    output.persist(&conn, "run-1").unwrap();
    output.persist(&conn, "run-2").unwrap();

    // Vendor table is keyed by firm name, so a second run adds nothing
    assert_eq!(store::load_vendor_database(&conn).unwrap(), output.onboarding.database);
    assert_eq!(store::count_assignments(&conn, "run-2").unwrap(), 5);
}

#[test]
fn test_rerun_is_deterministic() {
    let first = run();
    let second = run();

    assert_eq!(
        first.onboarding.database.fingerprint(),
        second.onboarding.database.fingerprint()
    );
    assert_eq!(
        serde_json::to_string(&first.assignment.assignments).unwrap(),
        serde_json::to_string(&second.assignment.assignments).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&first.notifications).unwrap(),
        serde_json::to_string(&second.notifications).unwrap()
    );
}
