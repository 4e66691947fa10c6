//! Shared domain types for cvtailor.
//!
//! Everything the other crates agree on lives here: the canonical résumé
//! model, the session record, the wizard stage ordering, the shared error
//! type, the config tree, and structured trace events.

pub mod action;
pub mod config;
pub mod cv;
pub mod error;
pub mod session;
pub mod signature;
pub mod stage;
pub mod trace;

pub use cv::{CvData, EducationEntry, Language, LanguageItem, Project, WorkRole};
pub use error::{Error, Result};
pub use session::{OffloadRef, PdfRef, SessionMetadata, SessionRecord};
pub use stage::WizardStage;
