//! Credit Manager: the sole authority over CP balances and stake custody.
//!
//! Balances are not stored on `Agent`: they live in this manager's table
//! of per-agent CP, keeping every unit of CP in exactly one place.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::ledger::{Ledger, LedgerEvent};
use crate::models::stake::StakeKind;
use crate::registry::{ConvictionParams, StakeRegistry};

#[derive(Debug, Error, PartialEq)]
pub enum CreditError {
    #[error("insufficient credit: required {required}, available {available}")]
    InsufficientCredit { required: i64, available: i64 },
    #[error("award of {attempted} would exceed maximum credit {max}")]
    MaxCreditExceeded { attempted: i64, max: i64 },
    #[error("stake {stake_id} not found")]
    StakeNotFound { stake_id: String },
    #[error("stake {stake_id} is a mandatory self-stake and cannot be switched or withdrawn")]
    StakeImmutable { stake_id: String },
}

/// Owns balances and, through an embedded [`StakeRegistry`], all stake
/// custody. This is the only component that ever mutates either.
#[derive(Debug, Clone)]
pub struct CreditManager {
    balances: BTreeMap<String, i64>,
    max_credit: Option<i64>,
    registry: StakeRegistry,
}

impl CreditManager {
    pub fn new(max_credit: Option<i64>, conviction: ConvictionParams) -> Self {
        Self {
            balances: BTreeMap::new(),
            max_credit,
            registry: StakeRegistry::new(conviction),
        }
    }

    pub fn registry(&self) -> &StakeRegistry {
        &self.registry
    }

    pub fn balance(&self, agent_id: &str) -> i64 {
        *self.balances.get(agent_id).unwrap_or(&0)
    }

    pub fn locked_stakes(&self, agent_id: &str) -> i64 {
        self.registry.locked_by_agent(agent_id)
    }

    /// Credit `amount` CP to `agent_id`. Rejects if it would exceed
    /// `MaximumCredit`.
    pub fn award(
        &mut self,
        ledger: &mut Ledger,
        agent_id: &str,
        amount: i64,
        reason: &str,
        tick: usize,
    ) -> Result<u64, CreditError> {
        let current = self.balance(agent_id);
        if let Some(max) = self.max_credit {
            if current + amount > max {
                return Err(CreditError::MaxCreditExceeded {
                    attempted: current + amount,
                    max,
                });
            }
        }
        self.balances.insert(agent_id.to_string(), current + amount);
        Ok(ledger.append(LedgerEvent::CreditAward {
            tick,
            agent_id: agent_id.to_string(),
            amount,
            reason: reason.to_string(),
        }))
    }

    /// Atomic deduct-or-log-and-fail. Never partially mutates state.
    pub fn attempt_deduct(
        &mut self,
        ledger: &mut Ledger,
        agent_id: &str,
        amount: i64,
        reason: &str,
        tick: usize,
    ) -> bool {
        let current = self.balance(agent_id);
        if current < amount {
            ledger.append(LedgerEvent::InsufficientCredit {
                tick,
                agent_id: agent_id.to_string(),
                needed: amount,
                available: current,
                context: reason.to_string(),
            });
            return false;
        }
        self.balances.insert(agent_id.to_string(), current - amount);
        ledger.append(LedgerEvent::CreditBurn {
            tick,
            agent_id: agent_id.to_string(),
            amount,
            reason: reason.to_string(),
        });
        true
    }

    /// Deduct `amount` from `agent_id` and lock it into a new stake on
    /// `proposal_id`. Returns the new stake's ID, or `None` if the agent
    /// lacked sufficient CP (an `insufficient_credit` event is still logged).
    pub fn stake_to_proposal(
        &mut self,
        ledger: &mut Ledger,
        agent_id: &str,
        proposal_id: &str,
        amount: i64,
        kind: StakeKind,
        tick: usize,
    ) -> Option<String> {
        let current = self.balance(agent_id);
        if current < amount {
            ledger.append(LedgerEvent::InsufficientCredit {
                tick,
                agent_id: agent_id.to_string(),
                needed: amount,
                available: current,
                context: "stake".to_string(),
            });
            return None;
        }
        self.balances.insert(agent_id.to_string(), current - amount);
        let stake_id = self.registry.add(
            agent_id.to_string(),
            proposal_id.to_string(),
            amount,
            kind,
            tick,
        );
        ledger.append(LedgerEvent::StakeRecorded {
            tick,
            agent_id: agent_id.to_string(),
            stake_id: stake_id.clone(),
            proposal_id: proposal_id.to_string(),
            amount,
            mandatory: matches!(kind, StakeKind::MandatorySelf),
        });
        Some(stake_id)
    }

    /// Move every stake on `old_proposal_id` belonging to `agent_id` onto
    /// `new_proposal_id`, preserving `rounds_held`. Used for the mandatory
    /// self-stake transfer on revision.
    pub fn transfer_stake(
        &mut self,
        agent_id: &str,
        old_proposal_id: &str,
        new_proposal_id: &str,
        tick: usize,
    ) {
        let matching_ids: Vec<String> = self
            .registry
            .stakes_for_proposal(old_proposal_id)
            .into_iter()
            .filter(|s| s.agent_id() == agent_id)
            .map(|s| s.id().to_string())
            .collect();
        for id in matching_ids {
            if let Some(stake) = self.registry.get_mut(&id) {
                stake.retarget(new_proposal_id.to_string(), tick);
            }
        }
    }

    /// Move a voluntary stake onto a different proposal, resetting its
    /// conviction counter.
    pub fn switch_voluntary(
        &mut self,
        ledger: &mut Ledger,
        stake_id: &str,
        new_proposal_id: &str,
        tick: usize,
    ) -> Result<(), CreditError> {
        let stake = self
            .registry
            .get_mut(stake_id)
            .ok_or_else(|| CreditError::StakeNotFound {
                stake_id: stake_id.to_string(),
            })?;
        if stake.is_mandatory() {
            return Err(CreditError::StakeImmutable {
                stake_id: stake_id.to_string(),
            });
        }
        let agent_id = stake.agent_id().to_string();
        let from_proposal = stake.proposal_id().to_string();
        let previous_rounds_held = stake.reset_rounds_held();
        stake.retarget(new_proposal_id.to_string(), tick);

        ledger.append(LedgerEvent::StakeSwitched {
            tick,
            agent_id,
            stake_id: stake_id.to_string(),
            from_proposal,
            to_proposal: new_proposal_id.to_string(),
            previous_rounds_held,
        });
        ledger.append(LedgerEvent::ConvictionSwitched {
            tick,
            stake_id: stake_id.to_string(),
            previous_rounds_held,
        });
        Ok(())
    }

    /// Withdraw a voluntary stake, returning its amount to the owner's
    /// liquid balance.
    pub fn withdraw_voluntary(
        &mut self,
        ledger: &mut Ledger,
        stake_id: &str,
        tick: usize,
    ) -> Result<i64, CreditError> {
        {
            let stake = self
                .registry
                .get(stake_id)
                .ok_or_else(|| CreditError::StakeNotFound {
                    stake_id: stake_id.to_string(),
                })?;
            if stake.is_mandatory() {
                return Err(CreditError::StakeImmutable {
                    stake_id: stake_id.to_string(),
                });
            }
        }
        let stake = self.registry.remove(stake_id).map_err(|_| CreditError::StakeNotFound {
            stake_id: stake_id.to_string(),
        })?;
        let agent_id = stake.agent_id().to_string();
        let proposal_id = stake.proposal_id().to_string();
        let amount = stake.amount();
        let current = self.balance(&agent_id);
        self.balances.insert(agent_id.clone(), current + amount);

        ledger.append(LedgerEvent::StakeWithdrawn {
            tick,
            agent_id,
            stake_id: stake_id.to_string(),
            proposal_id,
            amount,
            reason: "voluntary_withdraw".to_string(),
        });
        Ok(amount)
    }

    /// FINALIZE: burn every remaining stake as `credit_burn` events. Balances
    /// are not refunded; this is the end of the run for this issue.
    pub fn burn_all_stakes(&mut self, ledger: &mut Ledger, tick: usize) {
        let ids: Vec<String> = self.registry.all().map(|s| s.id().to_string()).collect();
        for id in ids {
            if let Ok(stake) = self.registry.remove(&id) {
                ledger.append(LedgerEvent::CreditBurn {
                    tick,
                    agent_id: stake.agent_id().to_string(),
                    amount: stake.amount(),
                    reason: "stake_burn".to_string(),
                });
            }
        }
    }

    /// REVISE-only: if `agent_id`'s liquid balance is short of `needed`,
    /// withdraw the minimum amount from their own mandatory self-stake to
    /// cover the deficit. Returns `true` if the agent now has `needed`
    /// liquid CP (after any tap), `false` if still short.
    pub fn auto_stake_tap(
        &mut self,
        ledger: &mut Ledger,
        agent_id: &str,
        needed: i64,
        tick: usize,
    ) -> bool {
        let liquid = self.balance(agent_id);
        if liquid >= needed {
            return true;
        }
        let deficit = needed - liquid;

        let mandatory_id = self
            .registry
            .stakes_for_agent(agent_id)
            .into_iter()
            .find(|s| s.is_mandatory())
            .map(|s| s.id().to_string());

        let Some(mandatory_id) = mandatory_id else {
            return false;
        };
        let available = self.registry.get(&mandatory_id).map(|s| s.amount()).unwrap_or(0);
        if available < deficit {
            return false;
        }
        let tap_amount = deficit;

        let new_amount = available - tap_amount;
        let proposal = self
            .registry
            .get(&mandatory_id)
            .map(|s| s.proposal_id().to_string())
            .unwrap_or_default();

        if new_amount <= 0 {
            self.registry.remove(&mandatory_id).ok();
        } else {
            self.registry.reduce_amount(&mandatory_id, tap_amount).ok();
        }
        let current = self.balance(agent_id);
        self.balances.insert(agent_id.to_string(), current + tap_amount);

        ledger.append(LedgerEvent::StakeWithdrawn {
            tick,
            agent_id: agent_id.to_string(),
            stake_id: mandatory_id,
            proposal_id: proposal,
            amount: tap_amount,
            reason: "auto_tap".to_string(),
        });

        true
    }

    /// End-of-round conviction accrual: every stake not touched this round
    /// has its `rounds_held` incremented, saturating at the configured
    /// bound, and its new weight is logged for audit.
    pub fn advance_conviction_round(
        &mut self,
        ledger: &mut Ledger,
        moved: &std::collections::HashSet<String>,
        tick: usize,
    ) {
        self.registry.advance_round(moved);
        let updated: Vec<(String, u32, f64)> = self
            .registry
            .all()
            .filter(|s| !moved.contains(s.id()))
            .map(|s| (s.id().to_string(), s.rounds_held(), self.registry.effective_weight(s)))
            .collect();
        for (stake_id, rounds_held, weight) in updated {
            ledger.append(LedgerEvent::ConvictionUpdated {
                tick,
                stake_id,
                rounds_held,
                weight,
            });
        }
    }

    /// Set an agent's liquid balance directly, bypassing the max-credit
    /// check and without committing a ledger event. Used only to rebuild
    /// state from a checkpoint.
    pub fn restore_balance(&mut self, agent_id: &str, balance: i64) {
        self.balances.insert(agent_id.to_string(), balance);
    }

    /// Reinsert a stake record as-is. Used only to rebuild state from a
    /// checkpoint.
    pub fn restore_stake(&mut self, record: crate::models::stake::StakeRecord) {
        self.registry.restore(record);
    }
}
