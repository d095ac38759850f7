//! Shared runtime helpers for the quizhub binaries and tests.

pub mod env;

pub mod utils {
    pub mod logging;
}
