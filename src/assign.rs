// 🗂️ Matter Assigner - Greedy, capacity-bound matching of matters to lawyers
//
// Matters are processed strictly in input order. Each matter walks:
//
//   Unassigned → CandidatesFound → Assigned
//   Unassigned → NoCandidate                 (reported, never retried)
//
// A successful assignment increments the lawyer's caseload before the next
// matter is considered. No backtracking, no global optimisation.

use crate::roster::{CaseTypeMap, Lawyer, Roster};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// MATTER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matter {
    pub matter_id: String,

    #[serde(default)]
    pub matter_name: String,

    pub case_type: String,

    /// high / medium / low; carried through, never used for matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outside_counsel: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Matter {
    pub fn new(matter_id: &str, case_type: &str) -> Self {
        Matter {
            matter_id: matter_id.to_string(),
            matter_name: String::new(),
            case_type: case_type.to_string(),
            priority: None,
            client: None,
            outside_counsel: None,
            description: None,
        }
    }

    /// Builder pattern: set the display name
    pub fn with_name(mut self, matter_name: &str) -> Self {
        self.matter_name = matter_name.to_string();
        self
    }

    /// Builder pattern: set the priority label
    pub fn with_priority(mut self, priority: &str) -> Self {
        self.priority = Some(priority.to_string());
        self
    }
}

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    /// No lawyer on the roster practices any required area
    NoPracticeAreaMatch,
    /// Someone practices the area, but every such lawyer is full or on leave
    AllMatchedAtCapacityOrUnavailable,
}

impl UnassignedReason {
    pub fn describe(&self) -> &'static str {
        match self {
            UnassignedReason::NoPracticeAreaMatch => "no practice-area match",
            UnassignedReason::AllMatchedAtCapacityOrUnavailable => {
                "all matched lawyers at capacity/unavailable"
            }
        }
    }
}

/// Where a matter stands while the assigner works on it
#[derive(Debug, Clone, PartialEq)]
pub enum MatterState {
    Unassigned,

    /// Roster indices of available lawyers practicing a required area
    CandidatesFound {
        required: Vec<String>,
        candidates: Vec<usize>,
        notes: Vec<String>,
    },

    Assigned {
        lawyer: usize,
        matched_area: String,
        notes: Vec<String>,
    },

    NoCandidate {
        reason: UnassignedReason,
        required: Vec<String>,
        notes: Vec<String>,
    },
}

impl MatterState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatterState::Assigned { .. } | MatterState::NoCandidate { .. })
    }
}

// ============================================================================
// OUTPUT RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Position within the run (1-based)
    pub ordinal: usize,

    /// ASN-0001, ASN-0002, ...
    pub assignment_id: String,

    pub matter_id: String,
    pub matter_name: String,
    pub case_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,

    pub lawyer_id: String,
    pub lawyer_name: String,

    #[serde(default)]
    pub lawyer_email: String,

    pub matched_area: String,

    /// Lawyer's caseload once this matter is counted
    pub caseload_after: u32,
    pub max_caseload: u32,

    pub reasoning: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnassignedMatter {
    pub matter_id: String,
    pub matter_name: String,
    pub case_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,

    pub required_areas: Vec<String>,
    pub reason: UnassignedReason,
    pub reasoning: Vec<String>,
}

impl UnassignedMatter {
    pub fn reason_text(&self) -> &'static str {
        self.reason.describe()
    }
}

/// Everything one run produces; `roster` carries the final caseloads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    pub assignments: Vec<Assignment>,
    pub unassigned: Vec<UnassignedMatter>,
    pub roster: Vec<Lawyer>,
}

impl AssignmentOutcome {
    pub fn total_matters(&self) -> usize {
        self.assignments.len() + self.unassigned.len()
    }

    pub fn assignments_for(&self, lawyer_name: &str) -> usize {
        self.assignments
            .iter()
            .filter(|a| a.lawyer_name == lawyer_name)
            .count()
    }

    /// Final caseloads in roster-file shape, ready to feed the next run
    pub fn roster_document(&self) -> Roster {
        Roster {
            lawyers: self.roster.clone(),
        }
    }
}

// ============================================================================
// MATTER ASSIGNER
// ============================================================================

pub struct MatterAssigner {
    case_types: CaseTypeMap,
}

impl MatterAssigner {
    pub fn new() -> Self {
        MatterAssigner {
            case_types: CaseTypeMap::default(),
        }
    }

    pub fn with_case_types(case_types: CaseTypeMap) -> Self {
        MatterAssigner { case_types }
    }

    pub fn case_types(&self) -> &CaseTypeMap {
        &self.case_types
    }

    /// Run one batch against a private copy of the roster.
    /// The caller's lawyers are untouched; the updated roster is returned.
    pub fn assign(&self, matters: &[Matter], lawyers: &[Lawyer]) -> AssignmentOutcome {
        let mut roster = lawyers.to_vec();
        let (assignments, unassigned) = self.assign_into(matters, &mut roster);

        AssignmentOutcome {
            assignments,
            unassigned,
            roster,
        }
    }

    /// Run one batch, incrementing caseloads in `lawyers` as matters land.
    pub fn assign_into(
        &self,
        matters: &[Matter],
        lawyers: &mut [Lawyer],
    ) -> (Vec<Assignment>, Vec<UnassignedMatter>) {
        let mut assignments = Vec::new();
        let mut unassigned = Vec::new();

        for matter in matters {
            let mut state = MatterState::Unassigned;
            while !state.is_terminal() {
                state = self.step(state, matter, lawyers);
            }

            match state {
                MatterState::Assigned {
                    lawyer,
                    matched_area,
                    notes,
                } => {
                    let chosen = &mut lawyers[lawyer];
                    chosen.current_caseload += 1;

                    let ordinal = assignments.len() + 1;
                    debug!(
                        matter_id = %matter.matter_id,
                        lawyer = %chosen.name,
                        caseload = chosen.current_caseload,
                        max = chosen.max_caseload,
                        "matter assigned"
                    );

                    assignments.push(Assignment {
                        ordinal,
                        assignment_id: format!("ASN-{:04}", ordinal),
                        matter_id: matter.matter_id.clone(),
                        matter_name: matter.matter_name.clone(),
                        case_type: matter.case_type.clone(),
                        priority: matter.priority.clone(),
                        client: matter.client.clone(),
                        lawyer_id: chosen.id().to_string(),
                        lawyer_name: chosen.name.clone(),
                        lawyer_email: chosen.email.clone(),
                        matched_area,
                        caseload_after: chosen.current_caseload,
                        max_caseload: chosen.max_caseload,
                        reasoning: notes,
                    });
                }
                MatterState::NoCandidate {
                    reason,
                    required,
                    notes,
                } => {
                    debug!(
                        matter_id = %matter.matter_id,
                        case_type = %matter.case_type,
                        reason = reason.describe(),
                        "matter unassigned"
                    );

                    unassigned.push(UnassignedMatter {
                        matter_id: matter.matter_id.clone(),
                        matter_name: matter.matter_name.clone(),
                        case_type: matter.case_type.clone(),
                        priority: matter.priority.clone(),
                        required_areas: required,
                        reason,
                        reasoning: notes,
                    });
                }
                // is_terminal() guarantees one of the two arms above
                MatterState::Unassigned | MatterState::CandidatesFound { .. } => {}
            }
        }

        info!(
            matters = matters.len(),
            assigned = assignments.len(),
            unassigned = unassigned.len(),
            "matter assignment complete"
        );

        (assignments, unassigned)
    }

    /// Advance a matter one state
    pub fn step(&self, state: MatterState, matter: &Matter, lawyers: &[Lawyer]) -> MatterState {
        match state {
            MatterState::Unassigned => self.find_candidates(matter, lawyers),
            MatterState::CandidatesFound {
                required,
                candidates,
                notes,
            } => select_lawyer(required, &candidates, notes, lawyers),
            terminal => terminal,
        }
    }

    fn find_candidates(&self, matter: &Matter, lawyers: &[Lawyer]) -> MatterState {
        let required = self.case_types.resolve(&matter.case_type);
        let mut notes = Vec::new();

        if self.case_types.is_known(&matter.case_type) {
            notes.push(format!(
                "Case type '{}' requires: {}",
                matter.case_type,
                required.join(", ")
            ));
        } else {
            notes.push(format!(
                "Case type '{}' not in routing table; matching on '{}'",
                matter.case_type,
                required.join(", ")
            ));
        }

        let mut practicing = 0;
        let mut candidates = Vec::new();
        for (index, lawyer) in lawyers.iter().enumerate() {
            if lawyer.matched_area(&required).is_none() {
                continue;
            }
            practicing += 1;
            if lawyer.is_on_leave() {
                notes.push(format!("{} practices the area but is on leave", lawyer.name));
                continue;
            }
            candidates.push(index);
        }

        if practicing == 0 {
            notes.push("No lawyer practices a required area".to_string());
            return MatterState::NoCandidate {
                reason: UnassignedReason::NoPracticeAreaMatch,
                required,
                notes,
            };
        }

        MatterState::CandidatesFound {
            required,
            candidates,
            notes,
        }
    }
}

impl Default for MatterAssigner {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowest current/max ratio among candidates with room; first listed wins ties
fn select_lawyer(
    required: Vec<String>,
    candidates: &[usize],
    mut notes: Vec<String>,
    lawyers: &[Lawyer],
) -> MatterState {
    let mut best: Option<usize> = None;

    for &index in candidates {
        let lawyer = &lawyers[index];
        if !lawyer.has_capacity() {
            notes.push(format!(
                "{} at capacity ({}/{})",
                lawyer.name, lawyer.current_caseload, lawyer.max_caseload
            ));
            continue;
        }

        notes.push(format!(
            "{} eligible ({}/{}, {} open)",
            lawyer.name,
            lawyer.current_caseload,
            lawyer.max_caseload,
            lawyer.available_capacity()
        ));

        best = match best {
            Some(current) if lawyers[current].load_ratio_cmp(lawyer).is_le() => Some(current),
            _ => Some(index),
        };
    }

    let Some(index) = best else {
        return MatterState::NoCandidate {
            reason: UnassignedReason::AllMatchedAtCapacityOrUnavailable,
            required,
            notes,
        };
    };

    let lawyer = &lawyers[index];
    let matched_area = lawyer
        .matched_area(&required)
        .unwrap_or_else(|| required.first().cloned().unwrap_or_default());

    notes.push(format!(
        "Selected {} (lowest load {:.0}%, matched on '{}')",
        lawyer.name,
        lawyer.load_ratio() * 100.0,
        matched_area
    ));

    MatterState::Assigned {
        lawyer: index,
        matched_area,
        notes,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[test]
    fn test_full_lawyer_skipped() {
        let assigner = MatterAssigner::new();
        let lawyers = vec![
            Lawyer::new("Michael Torres", &["patent_infringement"], 8).with_caseload(8),
            Lawyer::new("Sarah Patel", &["ip_trademark"], 6).with_caseload(3),
        ];
        let matters = vec![Matter::new("MAT-001", "patent_infringement")];

        let outcome = assigner.assign(&matters, &lawyers);

        assert_eq!(outcome.assignments.len(), 1);
        let assignment = &outcome.assignments[0];
        assert_eq!(assignment.lawyer_name, "Sarah Patel");
        assert_eq!(assignment.matched_area, "ip_trademark");
        assert_eq!(assignment.caseload_after, 4);
        assert_eq!(assignment.assignment_id, "ASN-0001");
        assert!(assignment.reasoning.iter().any(|n| n.contains("Michael Torres at capacity")));
    }

    #[test]
    fn test_capacity_and_leave_leaves_matter_unassigned() {
        let assigner = MatterAssigner::new();
        let lawyers = vec![
            Lawyer::new("Robert Chen", &["regulatory"], 5).with_caseload(5),
            Lawyer::new("Lisa Nakamura", &["regulatory"], 5).on_leave(),
        ];
        let matters = vec![Matter::new("MAT-002", "regulatory")];

        let outcome = assigner.assign(&matters, &lawyers);

        assert!(outcome.assignments.is_empty());
        assert_eq!(outcome.unassigned.len(), 1);
        assert_eq!(
            outcome.unassigned[0].reason,
            UnassignedReason::AllMatchedAtCapacityOrUnavailable
        );
        assert_eq!(
            outcome.unassigned[0].reason_text(),
            "all matched lawyers at capacity/unavailable"
        );
    }

    #[test]
    fn test_only_on_leave_match_is_unavailable_not_unmatched() {
        let assigner = MatterAssigner::new();
        let lawyers = vec![Lawyer::new("Lisa Nakamura", &["employment"], 5).on_leave()];

        let outcome = assigner.assign(&[Matter::new("MAT-003", "employment")], &lawyers);

        assert_eq!(
            outcome.unassigned[0].reason,
            UnassignedReason::AllMatchedAtCapacityOrUnavailable
        );
    }

    #[test]
    fn test_no_practice_area_match() {
        let assigner = MatterAssigner::new();
        let lawyers = vec![Lawyer::new("Robert Chen", &["regulatory"], 5)];

        let outcome = assigner.assign(&[Matter::new("MAT-004", "real_estate")], &lawyers);

        assert_eq!(outcome.unassigned[0].reason, UnassignedReason::NoPracticeAreaMatch);
        assert_eq!(outcome.unassigned[0].required_areas, vec!["real_estate".to_string()]);
    }

    #[test]
    fn test_lowest_ratio_wins_then_declared_order() {
        let assigner = MatterAssigner::new();
        let lawyers = vec![
            Lawyer::new("A", &["litigation"], 4).with_caseload(2), // 0.50
            Lawyer::new("B", &["litigation"], 8).with_caseload(2), // 0.25
            Lawyer::new("C", &["litigation"], 4).with_caseload(1), // 0.25
        ];

        let outcome = assigner.assign(&[Matter::new("MAT-005", "litigation")], &lawyers);
        assert_eq!(outcome.assignments[0].lawyer_name, "B");
    }

    #[test]
    fn test_increment_visible_to_next_matter() {
        let assigner = MatterAssigner::new();
        let lawyers = vec![
            Lawyer::new("A", &["litigation"], 2),
            Lawyer::new("B", &["litigation"], 2),
        ];
        let matters: Vec<Matter> = (1..=5)
            .map(|i| Matter::new(&format!("MAT-{:03}", i), "litigation"))
            .collect();

        let outcome = assigner.assign(&matters, &lawyers);

        let order: Vec<&str> = outcome
            .assignments
            .iter()
            .map(|a| a.lawyer_name.as_str())
            .collect();
        assert_eq!(order, vec!["A", "B", "A", "B"]);
        assert_eq!(outcome.unassigned.len(), 1);
        assert_eq!(outcome.unassigned[0].matter_id, "MAT-005");
        assert_eq!(outcome.roster[0].current_caseload, 2);
        // Caller's roster untouched
        assert_eq!(lawyers[0].current_caseload, 0);
    }

    #[test]
    fn test_zero_max_caseload_never_assigned() {
        let assigner = MatterAssigner::new();
        let lawyers = vec![Lawyer::new("Zed", &["m&a"], 0)];

        let outcome = assigner.assign(&[Matter::new("MAT-006", "M&A")], &lawyers);

        assert_eq!(
            outcome.unassigned[0].reason,
            UnassignedReason::AllMatchedAtCapacityOrUnavailable
        );
    }

    #[test]
    fn test_unknown_case_type_routes_to_itself() {
        let assigner = MatterAssigner::new();
        let lawyers = vec![Lawyer::new("Tara Singh", &["Tax"], 3)];

        let outcome = assigner.assign(&[Matter::new("MAT-007", "tax")], &lawyers);

        assert_eq!(outcome.assignments[0].lawyer_name, "Tara Singh");
        assert_eq!(outcome.assignments[0].matched_area, "tax");
    }

    #[test]
    fn test_state_machine_steps() {
        let assigner = MatterAssigner::new();
        let lawyers = vec![Lawyer::new("Robert Chen", &["regulatory"], 5)];
        let matter = Matter::new("MAT-008", "regulatory");

        let state = assigner.step(MatterState::Unassigned, &matter, &lawyers);
        assert!(matches!(state, MatterState::CandidatesFound { ref candidates, .. } if candidates == &vec![0]));

        let state = assigner.step(state, &matter, &lawyers);
        assert!(matches!(state, MatterState::Assigned { lawyer: 0, .. }));
        assert!(state.is_terminal());
    }

    fn lawyer_strategy() -> impl Strategy<Value = Lawyer> {
        (
            prop::sample::subsequence(vec!["litigation", "regulatory", "m&a", "employment"], 1..=2),
            0u32..5,
            0u32..6,
            any::<bool>(),
        )
            .prop_map(|(areas, max, current, leave)| {
                let lawyer = Lawyer::new("placeholder", &areas, max).with_caseload(current.min(max));
                if leave {
                    lawyer.on_leave()
                } else {
                    lawyer
                }
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: no lawyer ever ends above max, and on-leave lawyers get nothing.
        #[test]
        fn capacity_and_leave_respected(
            roster in prop::collection::vec(lawyer_strategy(), 1..6),
            case_types in prop::collection::vec(
                prop::sample::select(vec!["litigation", "regulatory", "m&a", "employment", "tax"]),
                0..25
            )
        ) {
            let lawyers: Vec<Lawyer> = roster
                .into_iter()
                .enumerate()
                .map(|(i, mut l)| { l.name = format!("Lawyer {}", i); l })
                .collect();
            let matters: Vec<Matter> = case_types
                .iter()
                .enumerate()
                .map(|(i, ct)| Matter::new(&format!("MAT-{}", i), ct))
                .collect();

            let outcome = MatterAssigner::new().assign(&matters, &lawyers);

            prop_assert_eq!(outcome.total_matters(), matters.len());

            let mut added: HashMap<&str, u32> = HashMap::new();
            for a in &outcome.assignments {
                *added.entry(a.lawyer_name.as_str()).or_default() += 1;
                prop_assert!(a.caseload_after <= a.max_caseload);
            }

            for (before, after) in lawyers.iter().zip(&outcome.roster) {
                let count = added.get(before.name.as_str()).copied().unwrap_or(0);
                prop_assert!(after.current_caseload <= after.max_caseload);
                prop_assert_eq!(after.current_caseload, before.current_caseload + count);
                if before.is_on_leave() {
                    prop_assert_eq!(count, 0);
                }
            }

            let ordinals: Vec<usize> = outcome.assignments.iter().map(|a| a.ordinal).collect();
            let expected: Vec<usize> = (1..=outcome.assignments.len()).collect();
            prop_assert_eq!(ordinals, expected);
        }
    }
}
