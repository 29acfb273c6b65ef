/// Gallery of the session's own trees, most recent first
use chrono::{DateTime, Utc};

use crate::ownership::is_owner;
use crate::state::{Identity, Tree, TreeId};

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryCard {
    pub id: TreeId,
    pub species: String,
    pub photo_ref: String,
    pub description: String,
    pub location: Option<String>,
    pub planted_at: DateTime<Utc>,
    pub verified: bool,
    pub confidence_percent: f64,
    /// Tentative records have not reached the server yet
    pub pending_sync: bool,
    /// Whether to offer a delete button
    pub can_delete: bool,
}

pub fn cards(trees: &[Tree], identity: &Identity) -> Vec<GalleryCard> {
    trees
        .iter()
        .rev()
        .map(|t| GalleryCard {
            id: t.id.clone(),
            species: t.species.clone(),
            photo_ref: t.photo_ref.clone(),
            description: t.description.clone(),
            location: t.location.clone(),
            planted_at: t.planted_at,
            verified: t.verified,
            confidence_percent: (t.confidence * 1000.0).round() / 10.0,
            pending_sync: t.id.is_tentative(),
            can_delete: is_owner(t, identity),
        })
        .collect()
}
