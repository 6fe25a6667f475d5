// 📊 Assignment Report - Pure summary over one assignment run
//
// Reads an AssignmentOutcome, never changes it.

use crate::assign::{AssignmentOutcome, UnassignedReason};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseTypeCounts {
    pub assigned: usize,
    pub unassigned: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub lawyer_name: String,
    pub current_caseload: u32,
    pub max_caseload: u32,
    pub utilization: f64,
    pub on_leave: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentReport {
    pub total_matters: usize,
    pub assigned: usize,
    pub unassigned: usize,

    /// assigned / total, 0.0 for an empty run
    pub fill_rate: f64,

    /// Every roster lawyer, including those who received nothing
    pub per_lawyer: BTreeMap<String, usize>,
    pub per_case_type: BTreeMap<String, CaseTypeCounts>,
    pub per_priority: BTreeMap<String, usize>,
    pub unassigned_by_reason: BTreeMap<UnassignedReason, usize>,
    pub workload: Vec<Workload>,
}

impl AssignmentReport {
    pub fn from_outcome(outcome: &AssignmentOutcome) -> Self {
        let total_matters = outcome.total_matters();
        let assigned = outcome.assignments.len();

        let mut per_lawyer: BTreeMap<String, usize> = outcome
            .roster
            .iter()
            .map(|l| (l.name.clone(), 0))
            .collect();
        let mut per_case_type: BTreeMap<String, CaseTypeCounts> = BTreeMap::new();
        let mut per_priority: BTreeMap<String, usize> = BTreeMap::new();
        let mut unassigned_by_reason: BTreeMap<UnassignedReason, usize> = BTreeMap::new();

        for a in &outcome.assignments {
            *per_lawyer.entry(a.lawyer_name.clone()).or_default() += 1;
            per_case_type
                .entry(case_type_key(&a.case_type))
                .or_default()
                .assigned += 1;
            *per_priority.entry(priority_key(a.priority.as_deref())).or_default() += 1;
        }

        for u in &outcome.unassigned {
            per_case_type
                .entry(case_type_key(&u.case_type))
                .or_default()
                .unassigned += 1;
            *per_priority.entry(priority_key(u.priority.as_deref())).or_default() += 1;
            *unassigned_by_reason.entry(u.reason).or_default() += 1;
        }

        let workload = outcome
            .roster
            .iter()
            .map(|l| Workload {
                lawyer_name: l.name.clone(),
                current_caseload: l.current_caseload,
                max_caseload: l.max_caseload,
                utilization: l.load_ratio(),
                on_leave: l.is_on_leave(),
            })
            .collect();

        let fill_rate = if total_matters == 0 {
            0.0
        } else {
            assigned as f64 / total_matters as f64
        };

        AssignmentReport {
            total_matters,
            assigned,
            unassigned: outcome.unassigned.len(),
            fill_rate,
            per_lawyer,
            per_case_type,
            per_priority,
            unassigned_by_reason,
            workload,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Matters: {}, assigned: {}, unassigned: {}, fill rate: {:.1}%",
            self.total_matters,
            self.assigned,
            self.unassigned,
            self.fill_rate * 100.0
        )
    }
}

fn case_type_key(case_type: &str) -> String {
    case_type.trim().to_lowercase()
}

fn priority_key(priority: Option<&str>) -> String {
    match priority.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => p.to_lowercase(),
        None => "unspecified".to_string(),
    }
}
