use serde::{Deserialize, Serialize};

const fn default_name_similarity_floor() -> f64 {
    0.85
}

/// Local name matching applied on top of remote match results.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MatchingConfig {
    /// Minimum Jaro-Winkler similarity between the counterparty name and a
    /// remote candidate for the candidate to count as a match.
    #[serde(default = "default_name_similarity_floor")]
    pub name_similarity_floor: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            name_similarity_floor: default_name_similarity_floor(),
        }
    }
}
