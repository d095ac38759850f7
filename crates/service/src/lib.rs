//! Service layer for the quizzes service.
//! - Validates category/tag references before a quiz is written.
//! - Resolves stored reference ids into names on every read.
//! - Persists quizzes behind the `QuizRepository` trait.

pub mod errors;
pub mod quiz;
pub mod references;
pub mod storage;
