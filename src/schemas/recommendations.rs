//! Ranking output for both passes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::null_as_empty;

/// Score axes, each 1-10.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreBreakdown {
    pub user_value: i32,
    pub novelty: i32,
    /// Estimated in pass 1, assessed in pass 2
    pub feasibility: i32,
    pub accessibility_impact: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// `REC-NNN`, always matching `rank` after normalization
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub rationale: String,
    /// "quick-win", "medium-term" or "long-term"
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub estimated_complexity: String,
    #[serde(default)]
    pub expected_impact: String,
    #[serde(default)]
    pub scores: ScoreBreakdown,
    #[serde(default)]
    pub rank: u32,
    /// Justified by competitors already shipping the capability
    #[serde(default)]
    pub parity_gap: bool,
    #[serde(default)]
    pub competitors_with_feature: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub user_value_signal: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pass1Output {
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub quick_wins: Vec<String>,
    #[serde(default)]
    pub long_term: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pass2Output {
    pub recommendations: Vec<Recommendation>,
    /// IDs that moved up
    #[serde(default)]
    pub promoted: Vec<String>,
    #[serde(default)]
    pub demoted: Vec<String>,
    #[serde(default)]
    pub quick_wins: Vec<String>,
    #[serde(default)]
    pub long_term: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

impl From<Pass1Output> for Pass2Output {
    fn from(pass1: Pass1Output) -> Self {
        Self {
            recommendations: pass1.recommendations,
            promoted: Vec::new(),
            demoted: Vec::new(),
            quick_wins: pass1.quick_wins,
            long_term: pass1.long_term,
            summary: pass1.summary,
        }
    }
}

pub fn rec_id(rank: u32) -> String {
    format!("REC-{:03}", rank)
}

/// Stable-sort by rank, then make ranks contiguous from 1 and derive ids
/// from them. Returns the old-id to new-id mapping.
pub fn renumber(recs: &mut [Recommendation]) -> HashMap<String, String> {
    recs.sort_by_key(|r| r.rank);
    let mut mapping = HashMap::new();
    for (i, rec) in recs.iter_mut().enumerate() {
        let rank = i as u32 + 1;
        let new_id = rec_id(rank);
        mapping.entry(rec.id.clone()).or_insert_with(|| new_id.clone());
        rec.rank = rank;
        rec.id = new_id;
    }
    mapping
}

fn remap_refs(ids: &mut [String], mapping: &HashMap<String, String>) {
    for id in ids.iter_mut() {
        if let Some(new_id) = mapping.get(id.as_str()) {
            *id = new_id.clone();
        }
    }
}

/// Ranked outputs whose id/rank pairs must stay consistent.
pub trait RankedOutput {
    fn recommendations(&self) -> &[Recommendation];

    /// Re-derive ranks and ids, rewriting every id reference in the output.
    fn normalize(&mut self);

    /// Every id suffix equals its rank and ranks run 1..=n.
    fn is_consistent(&self) -> bool {
        self.recommendations().iter().enumerate().all(|(i, r)| {
            let expected = i as u32 + 1;
            r.rank == expected
                && r.id
                    .strip_prefix("REC-")
                    .and_then(|n| n.parse::<u32>().ok())
                    == Some(expected)
        })
    }
}

impl RankedOutput for Pass1Output {
    fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    fn normalize(&mut self) {
        let mapping = renumber(&mut self.recommendations);
        remap_refs(&mut self.quick_wins, &mapping);
        remap_refs(&mut self.long_term, &mapping);
    }
}

impl RankedOutput for Pass2Output {
    fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    fn normalize(&mut self) {
        let mapping = renumber(&mut self.recommendations);
        remap_refs(&mut self.promoted, &mapping);
        remap_refs(&mut self.demoted, &mapping);
        remap_refs(&mut self.quick_wins, &mapping);
        remap_refs(&mut self.long_term, &mapping);
    }
}

/// Title to id lookup for one pass.
pub fn ids_by_title(recs: &[Recommendation]) -> HashMap<&str, &str> {
    recs.iter()
        .map(|r| (r.title.as_str(), r.id.as_str()))
        .collect()
}
