/// Shared data structures for the application state
///
/// These structs represent the canonical tree schema that flows between
/// the remote store boundary, the local cache and the views. Every
/// alternate field spelling is resolved in `remote::wire` before a record
/// ever reaches this shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a tree record
///
/// A record is tentative until the remote store acknowledges it and
/// assigns its own id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub enum TreeId {
    /// Id assigned by the remote store
    Canonical(String),
    /// Locally generated id for an unacknowledged write
    Tentative(String),
}

impl TreeId {
    /// Generate a fresh tentative id
    pub fn tentative() -> Self {
        TreeId::Tentative(format!("local-{}", Uuid::new_v4()))
    }

    /// Parse a user-supplied id, recognising the tentative prefix
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("local-") {
            TreeId::Tentative(raw.to_string())
        } else {
            TreeId::Canonical(raw.to_string())
        }
    }

    pub fn is_tentative(&self) -> bool {
        matches!(self, TreeId::Tentative(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            TreeId::Canonical(id) | TreeId::Tentative(id) => id,
        }
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named view of the tree collection
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Every tree, public
    All,
    /// Trees owned by the current session
    Mine,
}

impl Scope {
    /// Every scope a mutation can affect
    pub const EVERY: [Scope; 2] = [Scope::All, Scope::Mine];

    /// Key of the persisted collection for this scope
    pub fn cache_key(&self) -> &'static str {
        match self {
            Scope::All => "trees:all",
            Scope::Mine => "trees:mine",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => f.write_str("all"),
            Scope::Mine => f.write_str("mine"),
        }
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Scope::All),
            "mine" => Ok(Scope::Mine),
            other => Err(format!("unknown scope '{}' (expected 'all' or 'mine')", other)),
        }
    }
}

/// A single tree record
///
/// Records are immutable after creation; the only lifecycle transition
/// after a write is deletion.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Tree {
    pub id: TreeId,
    /// Species or display name
    pub species: String,
    /// Inline data URL or remote URL
    pub photo_ref: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: String,
    /// Classifier confidence in [0, 1]
    pub confidence: f64,
    /// Frozen at classification time, never recomputed
    pub verified: bool,
    pub planted_at: DateTime<Utc>,
    /// Display name of the uploading session
    pub uploaded_by: Option<String>,
    /// Name typed into the submission form
    pub planter_name: Option<String>,
    /// Named location the coordinates came from
    pub location: Option<String>,
    pub user_id: Option<String>,
}

impl Tree {
    /// Name shown for the person who planted this tree
    pub fn planter(&self) -> Option<&str> {
        [self.uploaded_by.as_deref(), self.planter_name.as_deref()]
            .into_iter()
            .flatten()
            .find(|name| !name.trim().is_empty())
    }

    /// Coordinates, if both are usable on a map
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some((lat, lng)),
            _ => None,
        }
    }
}

/// Payload sent to the remote store when creating a tree
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTree {
    pub species: String,
    pub photo_ref: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    pub confidence: f64,
    pub verified: bool,
    /// Local-only fields, not part of the create body
    #[serde(skip)]
    pub planter_name: Option<String>,
    #[serde(skip)]
    pub location: Option<String>,
}
