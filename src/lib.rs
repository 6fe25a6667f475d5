// E-Billing Rules Engine - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod money;
pub mod config;
pub mod vendor;         // Stage 1: Vendor Validator
pub mod invoice;
pub mod audit;          // Stage 2: Invoice Auditor
pub mod roster;
pub mod assign;         // Stage 3: Matter Assigner
pub mod report;
pub mod intake;         // File adapters (CSV / JSON)
pub mod store;          // SQLite persistence + event log
pub mod pipeline;
pub mod telemetry;

// Re-export commonly used types
pub use error::{BatchError, IntakeError};
pub use config::EngineConfig;
pub use vendor::{
    OnboardingOutcome, RawVendorRow, VendorDatabase, VendorRecord, VendorStatus,
    VendorValidator, VendorWarning,
};
pub use invoice::{Invoice, LineItem, Role};
pub use audit::{
    ApNotification, AuditSummary, AuditWarning, Decision, Finding, FindingKind,
    InvoiceAuditor, PaymentAction, RateDecision, Rejection,
};
pub use roster::{Availability, CaseTypeMap, Lawyer, Roster};
pub use assign::{
    Assignment, AssignmentOutcome, Matter, MatterAssigner, MatterState,
    UnassignedMatter, UnassignedReason,
};
pub use report::AssignmentReport;
pub use store::Event;
pub use pipeline::{Pipeline, PipelineInput, PipelineOutput};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
