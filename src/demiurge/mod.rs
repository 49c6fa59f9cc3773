//! 🜄 Level 4: Demiurge - cultural profiles and playbooks
//!
//! Shapes what the assistant knows about a place: the profile it speaks with and the
//! playbook it distills from everything remembered there.

pub mod builtin;
pub mod export;
pub mod playbook;
pub mod profile;
pub mod resolver;

pub use export::ExportFormat;
pub use playbook::{Playbook, PlaybookSynthesizer};
pub use profile::{CulturalProfile, ProfileSource};
pub use resolver::ProfileResolver;
