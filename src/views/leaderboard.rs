/// Planter leaderboard
use std::collections::{HashMap, HashSet};

use crate::state::Tree;

const ANONYMOUS: &str = "Anonymous Planter";
const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    /// 1-based
    pub rank: usize,
    pub planter: String,
    pub trees: usize,
    pub verified: usize,
    pub species: usize,
    pub medal: Option<&'static str>,
}

#[derive(Default)]
struct Tally<'a> {
    trees: usize,
    verified: usize,
    species: HashSet<&'a str>,
}

/// Rank planters by tree count, highest first; ties by name
pub fn rank(trees: &[Tree]) -> Vec<LeaderboardEntry> {
    let mut tallies: HashMap<&str, Tally> = HashMap::new();
    for tree in trees {
        let tally = tallies.entry(tree.planter().unwrap_or(ANONYMOUS)).or_default();
        tally.trees += 1;
        if tree.verified {
            tally.verified += 1;
        }
        tally.species.insert(tree.species.as_str());
    }

    let mut ranked: Vec<(&str, Tally)> = tallies.into_iter().collect();
    ranked.sort_by(|a, b| b.1.trees.cmp(&a.1.trees).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, (planter, tally))| LeaderboardEntry {
            rank: i + 1,
            planter: planter.to_string(),
            trees: tally.trees,
            verified: tally.verified,
            species: tally.species.len(),
            medal: MEDALS.get(i).copied(),
        })
        .collect()
}
