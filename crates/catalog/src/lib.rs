//! Client side of the category/tags service.
//!
//! Every call returns a [`ReferenceLookupResult`]; transport, HTTP and decoding
//! failures are normalized here and never escape as errors.

pub mod circuit_breaker;
pub mod client;
pub mod lookup;
mod payload;
pub mod retry;
pub mod source;

pub use client::{CatalogError, HttpReferenceClient};
pub use lookup::{ErrorBody, ReferenceLookupResult, ReferencePage, TransportFailure};
pub use source::ReferenceSource;
