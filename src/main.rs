// E-Billing CLI - onboard vendors, audit invoices, assign matters

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};

use ebilling::{
    intake, pipeline, store, telemetry, AssignmentReport, AuditSummary, EngineConfig,
    PipelineInput, Pipeline, ApNotification, VendorDatabase,
};

#[derive(Parser, Debug)]
#[command(name = "ebilling", version, about = "Law-firm e-billing rules engine", long_about = None)]
struct Cli {
    /// Verbose output. Repeat for more (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Engine configuration (JSON). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database to persist stage results into
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Directory for JSON outputs
    #[arg(long, global = true, default_value = ".")]
    output_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate law-firm rows and build the vendor database
    Onboard {
        /// Vendor CSV
        #[arg(long, default_value = "law_firms.csv")]
        vendors: PathBuf,
    },

    /// Audit invoices against a vendor database
    Audit {
        /// Vendor CSV to onboard before auditing (ignored when --db already holds vendors)
        #[arg(long, default_value = "law_firms.csv")]
        vendors: PathBuf,

        /// Invoice inbox (JSON)
        #[arg(long, default_value = "invoices.json")]
        invoices: PathBuf,
    },

    /// Assign matters to internal lawyers
    Assign(AssignArgs),

    /// All three stages, once each, in order
    Run {
        #[arg(long, default_value = "law_firms.csv")]
        vendors: PathBuf,

        #[arg(long, default_value = "invoices.json")]
        invoices: PathBuf,

        #[command(flatten)]
        assign: AssignArgs,
    },
}

#[derive(Args, Debug)]
struct AssignArgs {
    /// Internal roster (JSON)
    #[arg(long, default_value = "internal_lawyers.json")]
    roster: PathBuf,

    /// Matter list (CSV)
    #[arg(long, default_value = "matters.csv")]
    matters: PathBuf,

    /// Start every lawyer at zero caseload
    #[arg(long)]
    reset_caseloads: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init(cli.verbose, cli.json_logs);

    tracing::debug!(version = ebilling::VERSION, "ebilling starting");

    match dispatch(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("❌ {e:#}");
            ExitCode::from(1)
        }
    }
}

fn dispatch(cli: &Cli) -> Result<()> {
    let config = EngineConfig::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Onboard { vendors } => run_onboard(cli, &config, vendors),
        Commands::Audit { vendors, invoices } => run_audit(cli, &config, vendors, invoices),
        Commands::Assign(args) => run_assign(cli, &config, args),
        Commands::Run {
            vendors,
            invoices,
            assign,
        } => run_all(cli, &config, vendors, invoices, assign),
    }
}

fn run_onboard(cli: &Cli, config: &EngineConfig, vendors: &Path) -> Result<()> {
    let rows = intake::load_vendor_rows(vendors)?;
    let outcome = config.vendor_validator().onboard(&rows);

    for err in &outcome.rejected {
        println!("  ✗ {}", err);
    }
    for warning in &outcome.warnings {
        println!("  ⚠ {} (line {}): {}", warning.firm_name, warning.line, warning.message);
    }

    // Ids already held in the database win over the batch numbering
    let database = match &cli.db {
        Some(db) => {
            let conn = store::open(db)?;
            store::upsert_vendors(&conn, &outcome.database)?;
            store::persisted_vendors(&conn, &outcome.database)?
        }
        None => outcome.database.clone(),
    };

    let records: Vec<_> = database.records().collect();
    intake::write_json(&cli.output_dir.join(pipeline::VENDOR_DATABASE_FILE), &records)?;

    println!("✓ {}", outcome.summary());
    println!("  fingerprint {}", database.fingerprint());
    Ok(())
}

fn run_audit(cli: &Cli, config: &EngineConfig, vendors: &Path, invoices: &Path) -> Result<()> {
    let conn = cli.db.as_deref().map(store::open).transpose()?;

    let database = audit_vendor_database(conn.as_ref(), config, vendors)?;

    let invoices = intake::load_invoices(invoices)?;
    let decisions = config.invoice_auditor().audit(&invoices, &database);
    let notifications = ApNotification::batch(&decisions, Utc::now());

    intake::write_json(&cli.output_dir.join(pipeline::AP_NOTIFICATIONS_FILE), &notifications)?;

    if let Some(conn) = &conn {
        store::insert_decisions(conn, &new_run_id(), &decisions)?;
    }

    for d in &decisions {
        println!("  {} {:<10} {} - {}", d.decision.as_str(), d.invoice_id, d.firm_name, d.reason);
    }
    println!("✓ {}", AuditSummary::from_decisions(&decisions).summary());
    Ok(())
}

/// Prefer the persisted vendor database; onboard from CSV otherwise, and
/// persist that onboarding when a database is open
fn audit_vendor_database(
    conn: Option<&rusqlite::Connection>,
    config: &EngineConfig,
    vendors: &Path,
) -> Result<VendorDatabase> {
    if let Some(conn) = conn {
        let stored = store::load_vendor_database(conn)?;
        if !stored.is_empty() {
            return Ok(stored);
        }
    }

    let rows = intake::load_vendor_rows(vendors)?;
    let onboarded = config.vendor_validator().onboard(&rows).database;
    if let Some(conn) = conn {
        store::upsert_vendors(conn, &onboarded)?;
    }
    Ok(onboarded)
}

fn run_assign(cli: &Cli, config: &EngineConfig, args: &AssignArgs) -> Result<()> {
    let mut roster = intake::load_roster(&args.roster)?;
    if args.reset_caseloads {
        roster.reset_caseloads();
    }
    let matters = intake::load_matters(&args.matters)?;

    let outcome = config.matter_assigner().assign(&matters, &roster.lawyers);
    let report = AssignmentReport::from_outcome(&outcome);

    intake::write_json(
        &cli.output_dir.join(pipeline::MATTER_ASSIGNMENTS_FILE),
        &serde_json::json!({
            "assignments": outcome.assignments,
            "unassigned": outcome.unassigned,
        }),
    )?;
    intake::write_json(&cli.output_dir.join(pipeline::ASSIGNMENT_REPORT_FILE), &report)?;
    intake::write_json(
        &cli.output_dir.join(pipeline::ROSTER_STATE_FILE),
        &outcome.roster_document(),
    )?;

    if let Some(db) = &cli.db {
        let conn = store::open(db)?;
        store::insert_assignments(&conn, &new_run_id(), &outcome.assignments, &outcome.unassigned)?;
    }

    for a in &outcome.assignments {
        println!("  ✓ {} → {} ({})", a.matter_id, a.lawyer_name, a.matched_area);
    }
    for u in &outcome.unassigned {
        println!("  ✗ {} ({}): {}", u.matter_id, u.case_type, u.reason_text());
    }
    println!("✓ {}", report.summary());
    Ok(())
}

fn run_all(
    cli: &Cli,
    config: &EngineConfig,
    vendors: &Path,
    invoices: &Path,
    assign: &AssignArgs,
) -> Result<()> {
    let mut roster = intake::load_roster(&assign.roster)?;
    if assign.reset_caseloads {
        roster.reset_caseloads();
    }

    let input = PipelineInput {
        vendor_rows: intake::load_vendor_rows(vendors)?,
        invoices: intake::load_invoices(invoices)?,
        lawyers: roster.lawyers,
        matters: intake::load_matters(&assign.matters)?,
    };

    let output = Pipeline::from_config(config).run(&input, Utc::now());
    let written = output
        .write_to(&cli.output_dir)
        .context("Failed to write pipeline outputs")?;

    if let Some(db) = &cli.db {
        let conn = store::open(db)?;
        output.persist(&conn, &new_run_id())?;
    }

    println!("🏛️  {}", output.onboarding.summary());
    println!("🧾 {}", output.audit_summary.summary());
    println!("🗂️  {}", output.report.summary());
    for path in written {
        println!("   → {}", path.display());
    }
    Ok(())
}

fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_run_defaults() {
        let cli = Cli::try_parse_from(["ebilling", "run"]).unwrap();
        match cli.command {
            Commands::Run { vendors, assign, .. } => {
                assert_eq!(vendors, PathBuf::from("law_firms.csv"));
                assert_eq!(assign.roster, PathBuf::from("internal_lawyers.json"));
                assert!(!assign.reset_caseloads);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn audit_onboarding_persisted_when_db_empty() {
        let vendors = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/law_firms.csv");
        let config = EngineConfig::default();
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        store::setup_database(&conn).unwrap();

        let database = audit_vendor_database(Some(&conn), &config, &vendors).unwrap();
        assert_eq!(database.len(), 4);
        assert_eq!(store::load_vendor_database(&conn).unwrap(), database);

        // A populated database wins over the CSV
        let missing = Path::new("/nonexistent/law_firms.csv");
        let stored = audit_vendor_database(Some(&conn), &config, missing).unwrap();
        assert_eq!(stored, database);
        assert!(audit_vendor_database(None, &config, missing).is_err());
    }

    #[test]
    fn cli_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "ebilling", "-vv", "assign", "--reset-caseloads", "--db", "ebilling.db",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.db, Some(PathBuf::from("ebilling.db")));
        assert!(matches!(cli.command, Commands::Assign(ref a) if a.reset_caseloads));
    }
}
