//! Quiz lifecycle: writes validate references, reads resolve them.

pub mod audit;
pub mod grading;
pub mod input;
pub mod repository;
pub mod service;
pub mod view;

pub use audit::StaleReferences;
pub use grading::{Answer, AnswerOutcome, GradeReport};
pub use input::{ChoiceInput, QuestionInput, QuizInput};
pub use repository::{QuizDraft, QuizRepository};
pub use service::{QuizService, WritePhase};
pub use view::{QuizDetailView, QuizView};
