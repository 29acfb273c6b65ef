//! Map markers
//!
//! Tile rendering is someone else's job; this builds the marker list, the
//! bounds to fit and the centre to show.

use crate::state::{Scope, Tree, TreeId};

/// Where the map opens when there is nothing to show (Nairobi)
pub const DEFAULT_CENTER: (f64, f64) = (-1.286389, 36.817223);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStatus {
    Verified,
    Pending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapMarker {
    pub id: TreeId,
    pub species: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: MarkerStatus,
    pub planter: Option<String>,
}

/// South-west and north-east corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south_west: (f64, f64),
    pub north_east: (f64, f64),
}

impl Bounds {
    fn around<'a>(points: impl Iterator<Item = (f64, f64)> + 'a) -> Option<Self> {
        points.fold(None, |acc, (lat, lng)| {
            Some(match acc {
                None => Bounds { south_west: (lat, lng), north_east: (lat, lng) },
                Some(b) => Bounds {
                    south_west: (b.south_west.0.min(lat), b.south_west.1.min(lng)),
                    north_east: (b.north_east.0.max(lat), b.north_east.1.max(lng)),
                },
            })
        })
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.south_west.0 + self.north_east.0) / 2.0,
            (self.south_west.1 + self.north_east.1) / 2.0,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    pub markers: Vec<MapMarker>,
    pub bounds: Option<Bounds>,
    pub center: (f64, f64),
}

impl MapView {
    /// Every located tree for the public map; only verified trees for "mine"
    pub fn from_trees(scope: Scope, trees: &[Tree]) -> Self {
        let markers: Vec<MapMarker> = trees
            .iter()
            .filter(|t| scope == Scope::All || t.verified)
            .filter_map(|t| {
                let (latitude, longitude) = t.coordinates()?;
                Some(MapMarker {
                    id: t.id.clone(),
                    species: t.species.clone(),
                    latitude,
                    longitude,
                    status: if t.verified { MarkerStatus::Verified } else { MarkerStatus::Pending },
                    planter: t.planter().map(str::to_string),
                })
            })
            .collect();

        let bounds = Bounds::around(markers.iter().map(|m| (m.latitude, m.longitude)));
        let center = bounds.map(|b| b.center()).unwrap_or(DEFAULT_CENTER);

        Self { markers, bounds, center }
    }
}
