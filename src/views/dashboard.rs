/// Dashboard statistics
use std::collections::HashSet;

use crate::state::Tree;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub total: usize,
    pub verified: usize,
    /// Distinct species, ignoring blanks and "Unknown"
    pub species: usize,
    /// Kilograms of CO2 offset per year
    pub co2_offset_kg: f64,
}

impl DashboardStats {
    pub fn from_trees(trees: &[Tree], co2_per_tree_kg: f64) -> Self {
        let verified = trees.iter().filter(|t| t.verified).count();
        let species: HashSet<&str> = trees
            .iter()
            .map(|t| t.species.trim())
            .filter(|s| !s.is_empty() && *s != "Unknown")
            .collect();

        Self {
            total: trees.len(),
            verified,
            species: species.len(),
            co2_offset_kg: verified as f64 * co2_per_tree_kg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::cache::tests::sample_tree;

    #[test]
    fn test_stats() {
        let mut pending = sample_tree("b", "bob");
        pending.verified = false;
        pending.species = "Acacia".to_string();
        let mut unknown = sample_tree("c", "carol");
        unknown.species = "Unknown".to_string();

        let trees = vec![sample_tree("a", "alice"), pending, unknown];
        let stats = DashboardStats::from_trees(&trees, 21.0);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.verified, 2);
        assert_eq!(stats.species, 2);
        assert_eq!(stats.co2_offset_kg, 42.0);
    }

    #[test]
    fn test_empty() {
        let stats = DashboardStats::from_trees(&[], 21.0);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.co2_offset_kg, 0.0);
    }
}
