//! Risk scoring band values.

use serde::{Deserialize, Serialize};

const fn default_sanction_floor() -> u8 {
    90
}
const fn default_insolvency() -> u8 {
    80
}
const fn default_cleared_start() -> u8 {
    89
}
const fn default_cleared_end() -> u8 {
    70
}
const fn default_invalid_identifier() -> u8 {
    55
}
const fn default_recent_change_start() -> u8 {
    39
}
const fn default_recent_change_end() -> u8 {
    20
}
const fn default_unverified() -> u8 {
    10
}
const fn default_cooldown_days() -> u32 {
    30
}
const fn default_recent_change_window_days() -> u32 {
    90
}

/// Sub-score bands. The overall score is the maximum band that applies.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RiskConfig {
    /// Lower bound for an active sanctions match; the match score adds up to 10.
    #[serde(default = "default_sanction_floor")]
    pub sanction_floor: u8,

    /// Active insolvency proceeding.
    #[serde(default = "default_insolvency")]
    pub insolvency: u8,

    /// Score on the day a sanctions match clears.
    #[serde(default = "default_cleared_start")]
    pub cleared_start: u8,

    /// Score at the end of the cool-down window.
    #[serde(default = "default_cleared_end")]
    pub cleared_end: u8,

    /// VAT invalid, LEI lapsed, or identifier disabled.
    #[serde(default = "default_invalid_identifier")]
    pub invalid_identifier: u8,

    #[serde(default = "default_recent_change_start")]
    pub recent_change_start: u8,

    #[serde(default = "default_recent_change_end")]
    pub recent_change_end: u8,

    /// No snapshot from any source yet.
    #[serde(default = "default_unverified")]
    pub unverified: u8,

    #[serde(default = "default_cooldown_days")]
    pub cooldown_days: u32,

    #[serde(default = "default_recent_change_window_days")]
    pub recent_change_window_days: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            sanction_floor: default_sanction_floor(),
            insolvency: default_insolvency(),
            cleared_start: default_cleared_start(),
            cleared_end: default_cleared_end(),
            invalid_identifier: default_invalid_identifier(),
            recent_change_start: default_recent_change_start(),
            recent_change_end: default_recent_change_end(),
            unverified: default_unverified(),
            cooldown_days: default_cooldown_days(),
            recent_change_window_days: default_recent_change_window_days(),
        }
    }
}
