use std::fmt;

use serde::{Deserialize, Serialize};

/// Which collection of the category/tags service an id points into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Category,
    Tag,
}

impl ReferenceKind {
    /// Path segment of the collection on the remote service.
    pub fn collection(self) -> &'static str {
        match self {
            ReferenceKind::Category => "categories",
            ReferenceKind::Tag => "tags",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Category => f.write_str("category"),
            ReferenceKind::Tag => f.write_str("tag"),
        }
    }
}

/// A category or tag as reported by the remote service. Never persisted locally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalReference {
    pub kind: ReferenceKind,
    pub id: i64,
    pub name: String,
}

impl ExternalReference {
    pub fn new(kind: ReferenceKind, id: i64, name: impl Into<String>) -> Self {
        Self { kind, id, name: name.into() }
    }
}
