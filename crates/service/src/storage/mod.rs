//! File-backed persistence for the service layer.

pub mod json_map_store;
pub mod quiz_store;

pub use quiz_store::JsonQuizRepository;
