// 👩‍⚖️ Internal Roster - Lawyers, availability and case-type routing
//
// A lawyer's name is the identity; caseload is the only value that moves
// during an assignment run, and only upward.

use crate::error::BatchError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// AVAILABILITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Takes new matters (subject to capacity)
    #[default]
    #[serde(alias = "available")]
    Active,

    /// Excluded from all matching, whatever the other fields say
    #[serde(alias = "on leave", alias = "leave", alias = "inactive")]
    OnLeave,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Active => "active",
            Availability::OnLeave => "on_leave",
        }
    }
}

// ============================================================================
// LAWYER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lawyer {
    /// Roster id (e.g. "LAW-001"); falls back to the name when absent
    #[serde(default)]
    pub lawyer_id: String,

    /// Unique name
    pub name: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub email: String,

    /// Practice-area keys (e.g. "litigation", "m&a")
    #[serde(default)]
    pub practice_areas: Vec<String>,

    pub max_caseload: u32,

    #[serde(default)]
    pub current_caseload: u32,

    #[serde(rename = "status", default)]
    pub availability: Availability,
}

impl Lawyer {
    pub fn new(name: &str, practice_areas: &[&str], max_caseload: u32) -> Self {
        Lawyer {
            lawyer_id: String::new(),
            name: name.to_string(),
            title: String::new(),
            email: String::new(),
            practice_areas: practice_areas.iter().map(|a| a.to_string()).collect(),
            max_caseload,
            current_caseload: 0,
            availability: Availability::Active,
        }
    }

    /// Builder pattern: set the roster id
    pub fn with_id(mut self, lawyer_id: &str) -> Self {
        self.lawyer_id = lawyer_id.to_string();
        self
    }

    /// Builder pattern: set the starting caseload
    pub fn with_caseload(mut self, current_caseload: u32) -> Self {
        self.current_caseload = current_caseload;
        self
    }

    /// Builder pattern: mark as on leave
    pub fn on_leave(mut self) -> Self {
        self.availability = Availability::OnLeave;
        self
    }

    /// Id used in assignment records
    pub fn id(&self) -> &str {
        if self.lawyer_id.is_empty() {
            &self.name
        } else {
            &self.lawyer_id
        }
    }

    pub fn is_on_leave(&self) -> bool {
        self.availability == Availability::OnLeave
    }

    pub fn has_capacity(&self) -> bool {
        self.current_caseload < self.max_caseload
    }

    pub fn available_capacity(&self) -> u32 {
        self.max_caseload.saturating_sub(self.current_caseload)
    }

    /// First required area this lawyer practices (case-insensitive)
    pub fn matched_area(&self, required: &[String]) -> Option<String> {
        required
            .iter()
            .find(|area| {
                self.practice_areas
                    .iter()
                    .any(|pa| pa.trim().eq_ignore_ascii_case(area.trim()))
            })
            .cloned()
    }

    /// Compare current/max load ratios without floating point.
    /// Both lawyers must have a non-zero maximum.
    pub fn load_ratio_cmp(&self, other: &Lawyer) -> std::cmp::Ordering {
        let lhs = self.current_caseload as u64 * other.max_caseload as u64;
        let rhs = other.current_caseload as u64 * self.max_caseload as u64;
        lhs.cmp(&rhs)
    }

    pub fn load_ratio(&self) -> f64 {
        if self.max_caseload == 0 {
            1.0
        } else {
            self.current_caseload as f64 / self.max_caseload as f64
        }
    }
}

// ============================================================================
// ROSTER
// ============================================================================

/// Roster file shape: `{ "lawyers": [ ... ] }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    pub lawyers: Vec<Lawyer>,
}

impl Roster {
    /// Build a roster, rejecting duplicate names and active lawyers with no practice area
    pub fn new(lawyers: Vec<Lawyer>) -> Result<Self, BatchError> {
        let mut seen = HashSet::new();

        for lawyer in &lawyers {
            if lawyer.name.trim().is_empty() {
                return Err(BatchError::malformed("roster", "lawyer with empty name"));
            }
            if !seen.insert(lawyer.name.trim().to_lowercase()) {
                return Err(BatchError::malformed(
                    "roster",
                    format!("duplicate lawyer name: {}", lawyer.name),
                ));
            }
            if !lawyer.is_on_leave() && lawyer.practice_areas.is_empty() {
                return Err(BatchError::malformed(
                    "roster",
                    format!("{} has no practice areas", lawyer.name),
                ));
            }
        }

        Ok(Roster { lawyers })
    }

    /// Zero every caseload (fresh intake period)
    pub fn reset_caseloads(&mut self) {
        for lawyer in &mut self.lawyers {
            lawyer.current_caseload = 0;
        }
    }

    pub fn find(&self, name: &str) -> Option<&Lawyer> {
        self.lawyers.iter().find(|l| l.name == name)
    }

    pub fn len(&self) -> usize {
        self.lawyers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lawyers.is_empty()
    }
}

// ============================================================================
// CASE TYPE → PRACTICE AREA MAPPING
// ============================================================================

/// Static routing table; case types not listed route to a practice area of the same name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Vec<String>>",
    into = "BTreeMap<String, Vec<String>>"
)]
pub struct CaseTypeMap {
    routes: BTreeMap<String, Vec<String>>,
}

impl CaseTypeMap {
    pub fn empty() -> Self {
        CaseTypeMap {
            routes: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, case_type: &str, practice_areas: &[&str]) {
        self.routes.insert(
            normalize_key(case_type),
            practice_areas.iter().map(|a| normalize_key(a)).collect(),
        );
    }

    pub fn is_known(&self, case_type: &str) -> bool {
        self.routes.contains_key(&normalize_key(case_type))
    }

    /// Practice areas that qualify a lawyer for `case_type`
    pub fn resolve(&self, case_type: &str) -> Vec<String> {
        let key = normalize_key(case_type);
        match self.routes.get(&key) {
            Some(areas) => areas.clone(),
            None => vec![key],
        }
    }

    pub fn case_types(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(|k| k.as_str())
    }
}

impl Default for CaseTypeMap {
    fn default() -> Self {
        let mut map = CaseTypeMap::empty();
        map.insert("litigation", &["litigation"]);
        map.insert("patent_infringement", &["patent_infringement", "ip_trademark"]);
        map.insert("ip_trademark", &["ip_trademark", "patent_infringement"]);
        map.insert("m&a", &["m&a"]);
        map.insert("employment", &["employment"]);
        map.insert("regulatory", &["regulatory"]);
        map.insert("contract_review", &["contract_review"]);
        map.insert("real_estate", &["real_estate"]);
        map
    }
}

impl From<BTreeMap<String, Vec<String>>> for CaseTypeMap {
    fn from(raw: BTreeMap<String, Vec<String>>) -> Self {
        let routes = raw
            .into_iter()
            .map(|(case_type, areas)| {
                let areas = areas.iter().map(|a| normalize_key(a)).collect();
                (normalize_key(&case_type), areas)
            })
            .collect();
        CaseTypeMap { routes }
    }
}

impl From<CaseTypeMap> for BTreeMap<String, Vec<String>> {
    fn from(map: CaseTypeMap) -> Self {
        map.routes
    }
}

fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_case_type_map() {
        let map = CaseTypeMap::default();

        assert_eq!(
            map.resolve("patent_infringement"),
            vec!["patent_infringement".to_string(), "ip_trademark".to_string()]
        );
        assert_eq!(map.resolve("  Litigation "), vec!["litigation".to_string()]);
        assert!(map.is_known("m&a"));
    }

    #[test]
    fn test_unknown_case_type_routes_to_itself() {
        let map = CaseTypeMap::default();
        assert!(!map.is_known("tax"));
        assert_eq!(map.resolve("Tax"), vec!["tax".to_string()]);
    }

    #[test]
    fn test_matched_area_case_insensitive() {
        let lawyer = Lawyer::new("Sarah Patel", &["IP_Trademark", "litigation"], 6);
        let required = vec!["patent_infringement".to_string(), "ip_trademark".to_string()];

        assert_eq!(lawyer.matched_area(&required), Some("ip_trademark".to_string()));
        assert_eq!(lawyer.matched_area(&["m&a".to_string()]), None);
    }

    #[test]
    fn test_load_ratio_cmp() {
        let a = Lawyer::new("A", &["litigation"], 4).with_caseload(1); // 0.25
        let b = Lawyer::new("B", &["litigation"], 8).with_caseload(2); // 0.25
        let c = Lawyer::new("C", &["litigation"], 3).with_caseload(2); // 0.67

        assert_eq!(a.load_ratio_cmp(&b), std::cmp::Ordering::Equal);
        assert_eq!(a.load_ratio_cmp(&c), std::cmp::Ordering::Less);
        assert_eq!(c.load_ratio_cmp(&b), std::cmp::Ordering::Greater);
    }

    #[test]
    fn test_roster_rejects_duplicates() {
        let result = Roster::new(vec![
            Lawyer::new("Robert Chen", &["regulatory"], 5),
            Lawyer::new("robert chen", &["litigation"], 5),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_roster_allows_empty_areas_when_on_leave() {
        let roster = Roster::new(vec![Lawyer::new("Lisa Nakamura", &[], 5).on_leave()]).unwrap();
        assert_eq!(roster.len(), 1);

        let result = Roster::new(vec![Lawyer::new("Lisa Nakamura", &[], 5)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_roster_json_shape() {
        let json = r#"{
            "lawyers": [
                {
                    "lawyer_id": "LAW-004",
                    "name": "Lisa Nakamura",
                    "title": "Senior Counsel",
                    "email": "lisa@example.com",
                    "practice_areas": ["regulatory"],
                    "max_caseload": 5,
                    "current_caseload": 0,
                    "status": "on_leave"
                },
                {
                    "name": "Robert Chen",
                    "practice_areas": ["regulatory"],
                    "max_caseload": 5
                }
            ]
        }"#;

        let roster: Roster = serde_json::from_str(json).unwrap();
        assert!(roster.lawyers[0].is_on_leave());
        assert_eq!(roster.lawyers[1].availability, Availability::Active);
        assert_eq!(roster.lawyers[1].id(), "Robert Chen");
        assert_eq!(roster.lawyers[0].id(), "LAW-004");
    }

    #[test]
    fn test_reset_caseloads() {
        let mut roster = Roster::new(vec![
            Lawyer::new("Michael Torres", &["patent_infringement"], 8).with_caseload(8),
        ])
        .unwrap();

        roster.reset_caseloads();
        assert_eq!(roster.lawyers[0].current_caseload, 0);
        assert!(roster.lawyers[0].has_capacity());
    }
}
