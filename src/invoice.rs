// 🧾 Invoice Model - What a law firm submits to the AP inbox

use crate::money;
use serde::{Deserialize, Serialize};

// ============================================================================
// BILLING ROLE
// ============================================================================

/// Timekeeper level on a line item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Partner,
    Associate,
    Paralegal,
    /// Anything else; carried through, never rate-checked
    Other(String),
}

impl Role {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "partner" => Role::Partner,
            "associate" => Role::Associate,
            "paralegal" => Role::Paralegal,
            _ => Role::Other(value.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Partner => "partner",
            Role::Associate => "associate",
            Role::Paralegal => "paralegal",
            Role::Other(name) => name,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::parse(&value)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// LINE ITEM
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timekeeper: Option<String>,

    #[serde(alias = "level")]
    pub role: Role,

    /// Billed hourly rate
    #[serde(alias = "billed_rate")]
    pub rate: f64,

    pub hours: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LineItem {
    pub fn new(role: Role, rate: f64, hours: f64) -> Self {
        LineItem {
            timekeeper: None,
            role,
            rate,
            hours,
            description: None,
        }
    }

    /// Builder pattern: name the timekeeper
    pub fn with_timekeeper(mut self, timekeeper: &str) -> Self {
        self.timekeeper = Some(timekeeper.to_string());
        self
    }

    /// rate × hours at cent resolution
    pub fn computed_amount(&self) -> f64 {
        money::line_amount(self.rate, self.hours)
    }
}

// ============================================================================
// INVOICE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: String,

    /// Vendor reference by firm name
    #[serde(alias = "vendor")]
    pub firm_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matter_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<String>,

    #[serde(default)]
    pub line_items: Vec<LineItem>,

    /// Total as declared by the firm
    pub total_amount: f64,
}

impl Invoice {
    pub fn new(invoice_id: &str, firm_name: &str, total_amount: f64) -> Self {
        Invoice {
            invoice_id: invoice_id.to_string(),
            firm_name: firm_name.to_string(),
            matter: None,
            matter_id: None,
            invoice_date: None,
            line_items: Vec::new(),
            total_amount,
        }
    }

    /// Builder pattern: append a line item
    pub fn with_line(mut self, item: LineItem) -> Self {
        self.line_items.push(item);
        self
    }

    /// Sum of rate × hours over all line items, in cents then back to currency
    pub fn computed_total(&self) -> f64 {
        let cents: i64 = self
            .line_items
            .iter()
            .map(|item| money::to_cents(item.computed_amount()))
            .sum();
        cents as f64 / 100.0
    }

    pub fn total_hours(&self) -> f64 {
        self.line_items.iter().map(|item| item.hours).sum()
    }
}
