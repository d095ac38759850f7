//! Record and reference types shared by the quizzes service crates.

pub mod errors;
pub mod quiz;
pub mod reference;
pub mod tag_ids;

pub use quiz::{Choice, Question, Quiz};
pub use reference::{ExternalReference, ReferenceKind};
