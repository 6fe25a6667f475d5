// 🗄️ Store - SQLite persistence for stage outputs + event audit trail
//
// Vendors are keyed by firm name (upsert), so re-onboarding the same file
// leaves the table unchanged. Decisions and assignments are appended per run.

use crate::assign::{Assignment, UnassignedMatter};
use crate::audit::RateDecision;
use crate::vendor::{
    format_vendor_id, vendor_id_number, VendorDatabase, VendorRecord, VendorStatus,
    FIRST_VENDOR_ID,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

// ============================================================================
// EVENTS
// ============================================================================

/// One entry in the audit trail
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).with_context(|| format!("Failed to open database: {:?}", path))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS vendors (
            firm_name TEXT PRIMARY KEY,
            vendor_id TEXT NOT NULL,
            partner_rate REAL NOT NULL,
            associate_rate REAL NOT NULL,
            paralegal_rate REAL,
            status TEXT NOT NULL,
            payment_terms TEXT,
            contact TEXT NOT NULL,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS decisions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            invoice_id TEXT NOT NULL,
            firm_name TEXT NOT NULL,
            decision TEXT NOT NULL,
            reason TEXT NOT NULL,
            submitted_total REAL NOT NULL,
            computed_total REAL NOT NULL,
            total_overcharge REAL NOT NULL,
            findings TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            assignment_id TEXT NOT NULL,
            matter_id TEXT NOT NULL,
            case_type TEXT NOT NULL,
            lawyer_name TEXT NOT NULL,
            matched_area TEXT NOT NULL,
            caseload_after INTEGER NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS unassigned (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            matter_id TEXT NOT NULL,
            case_type TEXT NOT NULL,
            reason TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_decisions_run ON decisions(run_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_run ON assignments(run_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// VENDORS
// ============================================================================

/// Insert or update every vendor; returns how many rows actually changed.
///
/// A firm already in the table keeps its stored vendor id. A new firm keeps
/// its batch id unless another firm holds it, in which case it is numbered
/// after the highest id in the table.
pub fn upsert_vendors(conn: &Connection, database: &VendorDatabase) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut changed = 0;

    for record in database.records() {
        let before = load_vendor(&tx, &record.firm_name)?;
        let vendor_id = match &before {
            Some(existing) => existing.vendor_id.clone(),
            None if vendor_id_taken(&tx, &record.vendor_id)? => {
                let reassigned = format_vendor_id(next_vendor_number(&tx)?);
                debug!(firm = %record.firm_name, batch_id = %record.vendor_id, vendor_id = %reassigned, "vendor id already held, renumbered");
                reassigned
            }
            None => record.vendor_id.clone(),
        };
        let record = VendorRecord {
            vendor_id,
            ..record.clone()
        };
        let contact = serde_json::to_string(&record.contact)?;

        tx.execute(
            "INSERT INTO vendors (
                firm_name, vendor_id, partner_rate, associate_rate, paralegal_rate,
                status, payment_terms, contact
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(firm_name) DO UPDATE SET
                partner_rate = excluded.partner_rate,
                associate_rate = excluded.associate_rate,
                paralegal_rate = excluded.paralegal_rate,
                status = excluded.status,
                payment_terms = excluded.payment_terms,
                contact = excluded.contact,
                updated_at = CURRENT_TIMESTAMP",
            params![
                record.firm_name,
                record.vendor_id,
                record.partner_rate,
                record.associate_rate,
                record.paralegal_rate,
                record.status.as_str(),
                record.payment_terms,
                contact,
            ],
        )?;

        if before.as_ref() != Some(&record) {
            changed += 1;
            let event_type = if before.is_some() { "vendor_updated" } else { "vendor_onboarded" };
            insert_event(
                &tx,
                &Event::new(
                    event_type,
                    "vendor",
                    &record.firm_name,
                    serde_json::json!({
                        "vendor_id": record.vendor_id,
                        "status": record.status.as_str(),
                        "partner_rate": record.partner_rate,
                        "associate_rate": record.associate_rate,
                    }),
                    "vendor_validator",
                ),
            )?;
        }
    }

    tx.commit()?;
    info!(vendors = database.len(), changed, "vendor database persisted");
    Ok(changed)
}

fn vendor_id_taken(conn: &Connection, vendor_id: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM vendors WHERE vendor_id = ?1",
            params![vendor_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// One past the highest `VND-nnnn` in the table
fn next_vendor_number(conn: &Connection) -> Result<usize> {
    let mut stmt = conn.prepare("SELECT vendor_id FROM vendors")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ids
        .iter()
        .filter_map(|id| vendor_id_number(id))
        .max()
        .map_or(FIRST_VENDOR_ID, |highest| highest + 1))
}

/// Stored records for the firms in `database`, with their persisted vendor ids
pub fn persisted_vendors(conn: &Connection, database: &VendorDatabase) -> Result<VendorDatabase> {
    let mut records = Vec::with_capacity(database.len());
    for record in database.records() {
        if let Some(stored) = load_vendor(conn, &record.firm_name)? {
            records.push(stored);
        }
    }
    Ok(VendorDatabase::restore(records))
}

fn load_vendor(conn: &Connection, firm_name: &str) -> Result<Option<VendorRecord>> {
    let record = conn
        .query_row(
            "SELECT firm_name, vendor_id, partner_rate, associate_rate, paralegal_rate,
                    status, payment_terms, contact
             FROM vendors WHERE firm_name = ?1",
            params![firm_name],
            row_to_vendor,
        )
        .optional()?;
    Ok(record)
}

/// Rebuild the vendor database from the table
pub fn load_vendor_database(conn: &Connection) -> Result<VendorDatabase> {
    let mut stmt = conn.prepare(
        "SELECT firm_name, vendor_id, partner_rate, associate_rate, paralegal_rate,
                status, payment_terms, contact
         FROM vendors ORDER BY firm_name",
    )?;

    let records = stmt
        .query_map([], row_to_vendor)?
        .collect::<Result<Vec<_>, _>>()?;

    debug!(vendors = records.len(), "vendor database loaded");
    Ok(VendorDatabase::restore(records))
}

fn row_to_vendor(row: &rusqlite::Row<'_>) -> rusqlite::Result<VendorRecord> {
    let status: String = row.get(5)?;
    let contact_json: String = row.get(7)?;

    Ok(VendorRecord {
        firm_name: row.get(0)?,
        vendor_id: row.get(1)?,
        partner_rate: row.get(2)?,
        associate_rate: row.get(3)?,
        paralegal_rate: row.get(4)?,
        status: VendorStatus::parse(&status).ok_or(rusqlite::Error::InvalidQuery)?,
        payment_terms: row.get(6)?,
        contact: serde_json::from_str::<BTreeMap<String, String>>(&contact_json)
            .map_err(|_| rusqlite::Error::InvalidQuery)?,
    })
}

// ============================================================================
// DECISIONS
// ============================================================================

pub fn insert_decisions(conn: &Connection, run_id: &str, decisions: &[RateDecision]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;

    for d in decisions {
        let findings = serde_json::to_string(&d.findings)?;
        tx.execute(
            "INSERT INTO decisions (
                run_id, invoice_id, firm_name, decision, reason,
                submitted_total, computed_total, total_overcharge, findings
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run_id,
                d.invoice_id,
                d.firm_name,
                d.decision.as_str(),
                d.reason,
                d.submitted_total,
                d.computed_total,
                d.total_overcharge,
                findings,
            ],
        )?;

        insert_event(
            &tx,
            &Event::new(
                "invoice_audited",
                "invoice",
                &d.invoice_id,
                serde_json::json!({
                    "run_id": run_id,
                    "decision": d.decision.as_str(),
                    "findings": d.findings.len(),
                    "total_overcharge": d.total_overcharge,
                }),
                "invoice_auditor",
            ),
        )?;
    }

    tx.commit()?;
    info!(run_id, decisions = decisions.len(), "decisions persisted");
    Ok(decisions.len())
}

/// (invoice_id, decision) pairs for a run, in insertion order
pub fn get_decisions(conn: &Connection, run_id: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT invoice_id, decision FROM decisions WHERE run_id = ?1 ORDER BY id",
    )?;

    let rows = stmt
        .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

// ============================================================================
// ASSIGNMENTS
// ============================================================================

pub fn insert_assignments(
    conn: &Connection,
    run_id: &str,
    assignments: &[Assignment],
    unassigned: &[UnassignedMatter],
) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;

    for a in assignments {
        tx.execute(
            "INSERT INTO assignments (
                run_id, ordinal, assignment_id, matter_id, case_type,
                lawyer_name, matched_area, caseload_after
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run_id,
                a.ordinal as i64,
                a.assignment_id,
                a.matter_id,
                a.case_type,
                a.lawyer_name,
                a.matched_area,
                a.caseload_after,
            ],
        )?;

        insert_event(
            &tx,
            &Event::new(
                "matter_assigned",
                "matter",
                &a.matter_id,
                serde_json::json!({
                    "run_id": run_id,
                    "assignment_id": a.assignment_id,
                    "lawyer": a.lawyer_name,
                    "caseload_after": a.caseload_after,
                }),
                "matter_assigner",
            ),
        )?;
    }

    for u in unassigned {
        tx.execute(
            "INSERT INTO unassigned (run_id, matter_id, case_type, reason)
             VALUES (?1, ?2, ?3, ?4)",
            params![run_id, u.matter_id, u.case_type, u.reason_text()],
        )?;

        insert_event(
            &tx,
            &Event::new(
                "matter_unassigned",
                "matter",
                &u.matter_id,
                serde_json::json!({ "run_id": run_id, "reason": u.reason_text() }),
                "matter_assigner",
            ),
        )?;
    }

    tx.commit()?;
    if !unassigned.is_empty() {
        warn!(run_id, unassigned = unassigned.len(), "matters left unassigned");
    }
    info!(run_id, assignments = assignments.len(), "assignments persisted");
    Ok(assignments.len())
}

pub fn count_assignments(conn: &Connection, run_id: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM assignments WHERE run_id = ?1",
        params![run_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ============================================================================
// EVENT LOG
// ============================================================================

pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Events for one entity, oldest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}
