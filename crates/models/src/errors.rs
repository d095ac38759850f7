use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid tag id list {raw:?}: segment {segment:?} is not an integer")]
    TagIdCodec { raw: String, segment: String },
}
