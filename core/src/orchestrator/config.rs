//! Run configuration.
//!
//! `RtcConfig` is a plain, frozen, serializable value covering every
//! tunable named in the external interface. It is constructed once per
//! run and never mutated.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::ConvictionParams;

/// Hard upper bound on `StakeRounds`, independent of any other configured
/// value, so the STAKE phase is always guaranteed to terminate even under a
/// pathological configuration (Open Question 4).
pub const MAX_STAKE_ROUNDS: u32 = 1000;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("agent roster must not be empty")]
    EmptyRoster,
    #[error("duplicate agent UID: {uid}")]
    DuplicateAgentUid { uid: String },
    #[error("StakeRounds must be at least 1")]
    ZeroStakeRounds,
    #[error("StakeRounds {given} exceeds the hard bound of {max}")]
    StakeRoundsTooLarge { given: u32, max: u32 },
    #[error("MaxThinkTicks must be at least 1")]
    ZeroMaxThinkTicks,
    #[error("ConvictionSaturationRounds must be at least 1")]
    ZeroConvictionSaturationRounds,
    #[error("ConvictionTargetFraction must be in (0, 1), got {given}")]
    InvalidConvictionTargetFraction { given: f64 },
}

/// Frozen run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtcConfig {
    pub standard_invite_payment: i64,
    pub maximum_credit: Option<i64>,
    pub proposal_self_stake: i64,
    pub max_think_ticks: u32,
    pub kick_out_penalty: i64,
    pub feedback_stake: i64,
    pub max_feedback_per_agent: u32,
    pub feedback_char_limit: usize,
    pub revision_cycles: u32,
    pub stake_rounds: u32,
    pub max_conviction_multiplier: f64,
    pub conviction_target_fraction: f64,
    pub conviction_saturation_rounds: u32,
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            standard_invite_payment: 100,
            maximum_credit: None,
            proposal_self_stake: 50,
            max_think_ticks: 3,
            kick_out_penalty: 0,
            feedback_stake: 5,
            max_feedback_per_agent: 3,
            feedback_char_limit: 500,
            revision_cycles: 2,
            stake_rounds: 3,
            max_conviction_multiplier: 2.0,
            conviction_target_fraction: 0.98,
            conviction_saturation_rounds: 5,
        }
    }
}

impl RtcConfig {
    pub fn conviction_params(&self) -> ConvictionParams {
        ConvictionParams {
            max_conviction_multiplier: self.max_conviction_multiplier,
            conviction_target_fraction: self.conviction_target_fraction,
            conviction_saturation_rounds: self.conviction_saturation_rounds,
        }
    }

    /// Checked once, at construction, never again.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stake_rounds == 0 {
            return Err(ConfigError::ZeroStakeRounds);
        }
        if self.stake_rounds > MAX_STAKE_ROUNDS {
            return Err(ConfigError::StakeRoundsTooLarge {
                given: self.stake_rounds,
                max: MAX_STAKE_ROUNDS,
            });
        }
        if self.max_think_ticks == 0 {
            return Err(ConfigError::ZeroMaxThinkTicks);
        }
        if self.conviction_saturation_rounds == 0 {
            return Err(ConfigError::ZeroConvictionSaturationRounds);
        }
        if !(self.conviction_target_fraction > 0.0 && self.conviction_target_fraction < 1.0) {
            return Err(ConfigError::InvalidConvictionTargetFraction {
                given: self.conviction_target_fraction,
            });
        }
        Ok(())
    }
}

/// Enrollment-time configuration for a single agent invited into the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRosterEntry {
    pub uid: String,
    pub display_name: String,
    pub credential: String,
}

pub fn validate_roster(roster: &[AgentRosterEntry]) -> Result<(), ConfigError> {
    if roster.is_empty() {
        return Err(ConfigError::EmptyRoster);
    }
    let mut seen = std::collections::BTreeSet::new();
    for entry in roster {
        if !seen.insert(entry.uid.clone()) {
            return Err(ConfigError::DuplicateAgentUid {
                uid: entry.uid.clone(),
            });
        }
    }
    Ok(())
}
