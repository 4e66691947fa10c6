//! Stage engines.
//!
//! One module per wizard stage. Each engine builds its call payload from
//! canonical session state, runs the structured call with the stage's
//! post-parse rules (counts, lengths, hallucination guards), and parks the
//! result as a proposal; a separate accept function commits it into
//! `cv_data`. Engines never touch storage or HTTP — the dispatcher owns
//! persistence.

pub mod correction;
pub mod cover_letter;
pub mod education;
pub mod further;
pub mod guards;
pub mod job_posting;
pub mod prompts;
pub mod proposal;
pub mod skills;
pub mod translate;
pub mod work;

pub use job_posting::JobSummary;
