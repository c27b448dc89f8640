//! Orchestrator — the process-wide driver.
//!
//! Exposes the action API to agents, advances ticks, dispatches to the
//! phase engine, and commits every change through the Credit Manager,
//! Proposal Graph, and Ledger. Each tick runs a fixed sequence of
//! sub-steps rather than a monolithic match.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use thiserror::Error;

use crate::core::time::Clock;
use crate::credit::CreditManager;
use crate::graph::ProposalGraph;
use crate::models::agent::Agent;
use crate::models::feedback::FeedbackRecord;
use crate::models::issue::Issue;
use crate::models::ledger::{Ledger, LedgerEvent, LedgerRow};
use crate::models::stake::StakeKind;
use crate::orchestrator::action::{Action, ActionResult};
use crate::orchestrator::config::{AgentRosterEntry, ConfigError, RtcConfig};
use crate::phase::{Phase, PhaseTracker};

#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("run already finalized")]
    AlreadyFinalized,
    #[error("snapshot config hash does not match the restoring config")]
    ConfigMismatch,
    #[error("invalid snapshot: {0}")]
    SnapshotInvalid(String),
}

/// Summary of the work a single `tick()` call performed.
#[derive(Debug, Clone, PartialEq)]
pub struct TickResult {
    pub tick: usize,
    pub phase: Phase,
    pub kicked_out: Vec<String>,
    pub phase_advanced: bool,
}

pub struct Orchestrator {
    config: RtcConfig,
    clock: Clock,
    agents: BTreeMap<String, Agent>,
    issue: Issue,
    credit: CreditManager,
    graph: ProposalGraph,
    ledger: Ledger,
    phase: Phase,
    tracker: PhaseTracker,
    feedback_log: Vec<FeedbackRecord>,
    feedback_counts: BTreeMap<String, u32>,
    moved_stakes_this_round: HashSet<String>,
    stake_round_start_tick: Option<usize>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("tick", &self.clock.current_tick())
            .field("phase", &self.phase)
            .field("issue", &self.issue.id())
            .field("agents", &self.agents.len())
            .field("ledger_len", &self.ledger.len())
            .finish()
    }
}

impl Orchestrator {
    /// Build a fresh run. Configuration and roster are validated once here,
    /// never again.
    pub fn new(
        config: RtcConfig,
        roster: Vec<AgentRosterEntry>,
        issue: Issue,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        crate::orchestrator::config::validate_roster(&roster)?;

        let mut agents = BTreeMap::new();
        for entry in &roster {
            agents.insert(
                entry.uid.clone(),
                Agent::new(entry.uid.clone(), entry.display_name.clone(), entry.credential.clone()),
            );
        }

        let mut ledger = Ledger::new();
        ledger.set_phase_label(Phase::Propose.label());
        let mut credit = CreditManager::new(config.maximum_credit, config.conviction_params());
        for entry in &roster {
            credit
                .award(&mut ledger, &entry.uid, config.standard_invite_payment, "enrollment", 0)
                .expect("initial award never exceeds a freshly configured maximum");
        }

        Ok(Self {
            config,
            clock: Clock::new(),
            agents,
            issue,
            credit,
            graph: ProposalGraph::new(),
            ledger,
            phase: Phase::Propose,
            tracker: PhaseTracker::new(),
            feedback_log: Vec::new(),
            feedback_counts: BTreeMap::new(),
            moved_stakes_this_round: HashSet::new(),
            stake_round_start_tick: None,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_tick(&self) -> usize {
        self.clock.current_tick()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn credit(&self) -> &CreditManager {
        &self.credit
    }

    pub fn graph(&self) -> &ProposalGraph {
        &self.graph
    }

    pub fn issue(&self) -> &Issue {
        &self.issue
    }

    pub fn is_finalized(&self) -> bool {
        self.phase.is_terminal()
    }

    fn assigned(&self) -> BTreeSet<String> {
        self.issue.assigned_agents().clone()
    }

    /// Authenticate, resolving to `None` if the credential does not match or
    /// the agent is unknown.
    fn authenticate(&mut self, agent_id: &str, credential: &str) -> bool {
        match self.agents.get_mut(agent_id) {
            Some(agent) => agent.authenticate(credential),
            None => false,
        }
    }

    /// Validate and commit a single agent action. Rejections never mutate
    /// state beyond appending the rejection event itself.
    pub fn submit_action(&mut self, agent_id: &str, credential: &str, action: Action) -> ActionResult {
        if !self.authenticate(agent_id, credential) {
            return ActionResult::RejectedUnauthenticated;
        }
        if !self.issue.is_assigned(agent_id) {
            return ActionResult::RejectedUnauthenticated;
        }
        if self.phase.is_terminal() {
            return ActionResult::RejectedInvalidPhase;
        }

        let tick = self.clock.current_tick();
        match action {
            Action::SubmitProposal { body } => self.handle_submit_proposal(agent_id, body, tick),
            Action::SignalReady => self.handle_signal_ready(agent_id, tick),
            Action::SubmitFeedback { target_proposal_id, body } => {
                self.handle_submit_feedback(agent_id, &target_proposal_id, body, tick)
            }
            Action::SubmitRevision { new_body } => self.handle_submit_revision(agent_id, new_body, tick),
            Action::StakeAdd { proposal_id, amount } => {
                self.handle_stake_add(agent_id, &proposal_id, amount, tick)
            }
            Action::StakeSwitch { stake_id, new_proposal_id } => {
                self.handle_stake_switch(agent_id, &stake_id, &new_proposal_id, tick)
            }
            Action::StakeWithdraw { stake_id } => self.handle_stake_withdraw(agent_id, &stake_id, tick),
        }
    }

    fn handle_submit_proposal(&mut self, agent_id: &str, body: crate::models::proposal::ProposalBody, tick: usize) -> ActionResult {
        if !matches!(self.phase, Phase::Propose) {
            return ActionResult::RejectedInvalidPhase;
        }
        if self.graph.has_active_proposal(agent_id) {
            return ActionResult::RejectedSemantic("agent already has an active proposal".to_string());
        }
        let self_stake = self.config.proposal_self_stake;
        if self.credit.balance(agent_id) < self_stake {
            self.ledger.append(LedgerEvent::ProposalRejected {
                tick,
                agent_id: agent_id.to_string(),
                reason: "insufficient_cp_for_stake".to_string(),
            });
            return ActionResult::RejectedInsufficientCredit;
        }
        let proposal_id = self
            .graph
            .submit(&mut self.ledger, agent_id, body, tick)
            .expect("existence already checked above");
        self.credit
            .stake_to_proposal(&mut self.ledger, agent_id, &proposal_id, self_stake, StakeKind::MandatorySelf, tick)
            .expect("balance already checked above");
        self.tracker.mark_ready(agent_id);
        ActionResult::OkWithId(proposal_id)
    }

    /// Assign `agent_id` to the canonical NoAction proposal and attempt its
    /// self-stake. Used both by explicit `signal_ready()` in PROPOSE and by
    /// kick-out substitution.
    fn assign_noaction(&mut self, agent_id: &str, tick: usize) -> ActionResult {
        if self.graph.has_active_proposal(agent_id) {
            self.tracker.mark_ready(agent_id);
            return ActionResult::Ok;
        }
        let proposal_id = self
            .graph
            .submit_noaction(&mut self.ledger, agent_id, tick)
            .expect("existence already checked above");
        let self_stake = self.config.proposal_self_stake;
        if self.credit.balance(agent_id) < self_stake {
            self.ledger.append(LedgerEvent::InsufficientCredit {
                tick,
                agent_id: agent_id.to_string(),
                needed: self_stake,
                available: self.credit.balance(agent_id),
                context: "noaction_self_stake".to_string(),
            });
        } else {
            self.credit
                .stake_to_proposal(&mut self.ledger, agent_id, &proposal_id, self_stake, StakeKind::MandatorySelf, tick)
                .expect("balance already checked above");
        }
        self.tracker.mark_ready(agent_id);
        ActionResult::OkWithId(proposal_id)
    }

    fn handle_signal_ready(&mut self, agent_id: &str, tick: usize) -> ActionResult {
        match self.phase {
            Phase::Propose => self.assign_noaction(agent_id, tick),
            Phase::Feedback(_) | Phase::Revise(_) | Phase::Stake(_) => {
                self.tracker.mark_ready(agent_id);
                self.ledger.append(LedgerEvent::AgentReady {
                    tick,
                    agent_id: agent_id.to_string(),
                });
                ActionResult::Ok
            }
            Phase::Finalize => ActionResult::RejectedInvalidPhase,
        }
    }

    fn handle_submit_feedback(&mut self, agent_id: &str, target: &str, body: String, tick: usize) -> ActionResult {
        if !matches!(self.phase, Phase::Feedback(_)) {
            return ActionResult::RejectedInvalidPhase;
        }
        if self.graph.active_proposal_for(agent_id).map(|p| p.id()) == Some(target) {
            return ActionResult::RejectedSemantic("cannot give feedback on own proposal".to_string());
        }
        if self.graph.get(target).is_none() {
            return ActionResult::RejectedNotFound;
        }
        let count = self.feedback_counts.get(agent_id).copied().unwrap_or(0);
        if count >= self.config.max_feedback_per_agent {
            return ActionResult::RejectedQuotaExceeded;
        }
        if body.len() > self.config.feedback_char_limit {
            return ActionResult::RejectedQuotaExceeded;
        }
        if !self.credit.attempt_deduct(&mut self.ledger, agent_id, self.config.feedback_stake, "feedback_stake", tick) {
            return ActionResult::RejectedInsufficientCredit;
        }
        self.feedback_log.push(FeedbackRecord::new(agent_id.to_string(), target.to_string(), body, tick));
        self.feedback_counts.insert(agent_id.to_string(), count + 1);
        self.ledger.append(LedgerEvent::FeedbackRecorded {
            tick,
            agent_id: agent_id.to_string(),
            target_proposal_id: target.to_string(),
        });
        self.tracker.mark_ready(agent_id);
        ActionResult::Ok
    }

    fn handle_submit_revision(&mut self, agent_id: &str, new_body: crate::models::proposal::ProposalBody, tick: usize) -> ActionResult {
        if !matches!(self.phase, Phase::Revise(_)) {
            return ActionResult::RejectedInvalidPhase;
        }
        let delta = match self.graph.preview_delta(agent_id, &new_body) {
            Ok(d) => d,
            Err(_) => return ActionResult::RejectedNotFound,
        };
        let cost = (self.config.proposal_self_stake as f64 * delta).round() as i64;

        if self.credit.balance(agent_id) < cost {
            if !self.credit.auto_stake_tap(&mut self.ledger, agent_id, cost, tick) {
                return ActionResult::RejectedInsufficientCredit;
            }
        }
        if cost > 0 {
            self.credit.attempt_deduct(&mut self.ledger, agent_id, cost, "revision_cost", tick);
        }

        let old_id = self.graph.active_proposal_for(agent_id).unwrap().id().to_string();
        let (_, new_id, _delta) = self
            .graph
            .revise(&mut self.ledger, agent_id, new_body, cost, tick)
            .expect("active proposal existence already checked via preview_delta");
        self.credit.transfer_stake(agent_id, &old_id, &new_id, tick);
        self.tracker.mark_ready(agent_id);
        ActionResult::OkWithId(new_id)
    }

    fn handle_stake_add(&mut self, agent_id: &str, proposal_id: &str, amount: i64, tick: usize) -> ActionResult {
        if !matches!(self.phase, Phase::Stake(_)) {
            return ActionResult::RejectedInvalidPhase;
        }
        if amount <= 0 {
            return ActionResult::RejectedSemantic("stake amount must be positive".to_string());
        }
        match self.graph.get(proposal_id) {
            Some(p) if p.is_active() => {}
            _ => return ActionResult::RejectedNotFound,
        }
        match self
            .credit
            .stake_to_proposal(&mut self.ledger, agent_id, proposal_id, amount, StakeKind::Voluntary, tick)
        {
            Some(stake_id) => {
                self.moved_stakes_this_round.insert(stake_id.clone());
                self.tracker.mark_ready(agent_id);
                ActionResult::OkWithId(stake_id)
            }
            None => ActionResult::RejectedInsufficientCredit,
        }
    }

    fn handle_stake_switch(&mut self, agent_id: &str, stake_id: &str, new_proposal_id: &str, tick: usize) -> ActionResult {
        if !matches!(self.phase, Phase::Stake(_)) {
            return ActionResult::RejectedInvalidPhase;
        }
        match self.credit.registry().get(stake_id) {
            Some(s) if s.agent_id() == agent_id => {}
            Some(_) => return ActionResult::RejectedSemantic("stake does not belong to this agent".to_string()),
            None => return ActionResult::RejectedNotFound,
        }
        if self.graph.get(new_proposal_id).map(|p| p.is_active()) != Some(true) {
            return ActionResult::RejectedNotFound;
        }
        match self.credit.switch_voluntary(&mut self.ledger, stake_id, new_proposal_id, tick) {
            Ok(()) => {
                self.moved_stakes_this_round.insert(stake_id.to_string());
                self.tracker.mark_ready(agent_id);
                ActionResult::Ok
            }
            Err(crate::credit::CreditError::StakeImmutable { .. }) => {
                ActionResult::RejectedSemantic("mandatory self-stake cannot be switched".to_string())
            }
            Err(_) => ActionResult::RejectedNotFound,
        }
    }

    fn handle_stake_withdraw(&mut self, agent_id: &str, stake_id: &str, tick: usize) -> ActionResult {
        if !matches!(self.phase, Phase::Stake(_)) {
            return ActionResult::RejectedInvalidPhase;
        }
        match self.credit.registry().get(stake_id) {
            Some(s) if s.agent_id() == agent_id => {}
            Some(_) => return ActionResult::RejectedSemantic("stake does not belong to this agent".to_string()),
            None => return ActionResult::RejectedNotFound,
        }
        match self.credit.withdraw_voluntary(&mut self.ledger, stake_id, tick) {
            Ok(_amount) => {
                self.moved_stakes_this_round.insert(stake_id.to_string());
                self.tracker.mark_ready(agent_id);
                ActionResult::Ok
            }
            Err(crate::credit::CreditError::StakeImmutable { .. }) => {
                ActionResult::RejectedSemantic("mandatory self-stake cannot be withdrawn".to_string())
            }
            Err(_) => ActionResult::RejectedNotFound,
        }
    }

    fn apply_kickout(&mut self, agent_id: &str, tick: usize) {
        self.ledger.append(LedgerEvent::PhaseTimeout {
            tick,
            agent_id: agent_id.to_string(),
            phase: self.phase.label(),
        });
        match self.phase {
            Phase::Propose => {
                self.assign_noaction(agent_id, tick);
            }
            Phase::Feedback(_) | Phase::Revise(_) | Phase::Stake(_) => {
                self.tracker.mark_ready(agent_id);
            }
            Phase::Finalize => {}
        }
        if self.config.kick_out_penalty > 0 {
            self.credit
                .attempt_deduct(&mut self.ledger, agent_id, self.config.kick_out_penalty, "kick_out_penalty", tick);
        }
    }

    /// Advance the run by one logical tick: apply any kick-out
    /// substitutions, then, if every assigned agent has completed their
    /// obligation, advance to the next phase.
    pub fn tick(&mut self) -> Result<TickResult, SimulationError> {
        if self.phase.is_terminal() {
            return Err(SimulationError::AlreadyFinalized);
        }

        let assigned = self.assigned();
        let timed_out = self.tracker.advance_think_ticks(&assigned, self.config.max_think_ticks);
        self.clock.advance();
        let tick = self.clock.current_tick();

        for agent_id in &timed_out {
            self.apply_kickout(agent_id, tick);
        }

        let phase_advanced = self.tracker.all_ready(&assigned);
        if phase_advanced {
            self.advance_phase(tick);
        }

        Ok(TickResult {
            tick,
            phase: self.phase,
            kicked_out: timed_out,
            phase_advanced,
        })
    }

    fn advance_phase(&mut self, tick: usize) {
        if matches!(self.phase, Phase::Stake(_)) {
            self.credit
                .advance_conviction_round(&mut self.ledger, &self.moved_stakes_this_round, tick);
            self.moved_stakes_this_round.clear();
        }

        let from_label = self.phase.label();
        let next = self.phase.next(self.config.revision_cycles, self.config.stake_rounds);
        self.ledger.append(LedgerEvent::PhaseTransition {
            tick,
            from_phase: from_label,
            to_phase: next.label(),
        });

        self.phase = next;
        self.ledger.set_phase_label(next.label());
        self.tracker.reset();
        self.feedback_counts.clear();

        if let Phase::Stake(_) = next {
            self.stake_round_start_tick = Some(tick);
        }
        if let Phase::Finalize = next {
            self.finalize(tick);
        }
    }

    fn finalize(&mut self, tick: usize) {
        let mut best: Option<(String, f64, usize)> = None;
        for proposal in self.graph.active_versions() {
            let score = self.credit.registry().score(proposal.id());
            let last_tick = self.credit.registry().last_stake_tick(proposal.id()).unwrap_or(0);
            best = Some(match best {
                None => (proposal.id().to_string(), score, last_tick),
                Some((best_id, best_score, best_tick)) => {
                    if score > best_score || (score == best_score && last_tick < best_tick) {
                        (proposal.id().to_string(), score, last_tick)
                    } else {
                        (best_id, best_score, best_tick)
                    }
                }
            });
        }

        let (winner_id, score, _) = best.unwrap_or_else(|| ("__no_proposals__".to_string(), 0.0, 0));
        let tie_broken = self
            .graph
            .active_versions()
            .filter(|p| (self.credit.registry().score(p.id()) - score).abs() < 1e-9)
            .count()
            > 1;

        self.credit.burn_all_stakes(&mut self.ledger, tick);
        self.ledger.append(LedgerEvent::Finalize {
            tick,
            winner_proposal_id: winner_id,
            score,
            tie_broken,
        });
        self.issue.finalize();
    }

    /// Blind-staking-aware read of the ledger: during a STAKE round, rows
    /// from the current round are withheld until the next round begins.
    pub fn query_state(&self) -> Vec<&LedgerRow> {
        let cutoff = match self.phase {
            Phase::Stake(_) => self.stake_round_start_tick.unwrap_or(0).saturating_sub(1),
            _ => self.clock.current_tick(),
        };
        self.ledger.rows_visible_through(cutoff)
    }

    /// Total CP in the system, liquid plus locked. Constant across a run:
    /// the sum of every `standard_invite_payment` award.
    pub fn total_cp(&self) -> i64 {
        self.agents
            .keys()
            .map(|uid| self.credit.balance(uid) + self.credit.locked_stakes(uid))
            .sum()
    }

    /// Rebuild a run from a checkpoint. `config` and `roster` must be the
    /// same ones the snapshot was taken under; mismatched config is
    /// rejected by hash comparison before anything else is touched.
    pub fn from_snapshot(
        config: RtcConfig,
        roster: Vec<AgentRosterEntry>,
        issue: Issue,
        snapshot: crate::orchestrator::checkpoint::StateSnapshot,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        crate::orchestrator::config::validate_roster(&roster)?;

        if crate::orchestrator::checkpoint::compute_config_hash(&config) != snapshot.config_hash {
            return Err(SimulationError::ConfigMismatch);
        }
        crate::orchestrator::checkpoint::validate_snapshot(&snapshot, snapshot.total_cp)?;

        let mut agents = BTreeMap::new();
        for entry in &roster {
            agents.insert(
                entry.uid.clone(),
                Agent::new(entry.uid.clone(), entry.display_name.clone(), entry.credential.clone()),
            );
        }

        let mut ledger = Ledger::new();
        ledger.set_phase_label(snapshot.phase.label());
        let mut credit = CreditManager::new(config.maximum_credit, config.conviction_params());
        for agent in &snapshot.agents {
            credit.restore_balance(&agent.uid, agent.balance);
        }
        for stake in snapshot.stakes {
            credit.restore_stake(crate::models::stake::StakeRecord::new(
                stake.id,
                stake.agent_id,
                stake.proposal_id,
                stake.amount,
                stake.origin_tick,
                stake.kind,
            ));
        }

        let mut graph = ProposalGraph::new();
        for p in snapshot.proposals {
            graph.restore_version(crate::models::proposal::Proposal::restore(
                p.id,
                p.author_id,
                p.issue_id,
                p.parent_id,
                p.version,
                p.body,
                p.created_tick,
                p.updated_tick,
                p.archived,
                p.active,
            ));
        }

        Ok(Self {
            config,
            clock: crate::core::time::Clock::at(snapshot.tick),
            agents,
            issue,
            credit,
            graph,
            ledger,
            phase: snapshot.phase,
            tracker: PhaseTracker::new(),
            feedback_log: Vec::new(),
            feedback_counts: BTreeMap::new(),
            moved_stakes_this_round: HashSet::new(),
            stake_round_start_tick: if snapshot.phase.is_stake() { Some(snapshot.tick) } else { None },
        })
    }

    /// Capture a restartable snapshot of the full run.
    pub fn checkpoint(&self) -> crate::orchestrator::checkpoint::StateSnapshot {
        use crate::orchestrator::checkpoint::{
            compute_config_hash, new_snapshot_id, AgentSnapshot, ProposalSnapshot, StakeSnapshot,
        };

        let agents = self
            .agents
            .values()
            .map(|a| AgentSnapshot::from_agent(a, self.credit.balance(a.uid())))
            .collect();
        let proposals = self.graph.all_versions().map(ProposalSnapshot::from).collect();
        let stakes = self.credit.registry().all().map(StakeSnapshot::from).collect();

        crate::orchestrator::checkpoint::StateSnapshot {
            snapshot_id: new_snapshot_id(),
            tick: self.clock.current_tick(),
            phase: self.phase,
            total_cp: self.total_cp(),
            agents,
            proposals,
            stakes,
            config_hash: compute_config_hash(&self.config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::issue::Issue;
    use crate::models::proposal::ProposalBody;
    use std::collections::BTreeSet;

    fn roster(names: &[&str]) -> Vec<AgentRosterEntry> {
        names
            .iter()
            .map(|n| AgentRosterEntry {
                uid: n.to_string(),
                display_name: n.to_string(),
                credential: format!("secret-{n}"),
            })
            .collect()
    }

    fn issue_for(names: &[&str]) -> Issue {
        let assigned: BTreeSet<String> = names.iter().map(|s| s.to_string()).collect();
        Issue::new(
            "ISSUE-1".to_string(),
            "Should we adopt RTC?".to_string(),
            "Background".to_string(),
            assigned,
            0,
        )
    }

    fn orchestrator(names: &[&str]) -> Orchestrator {
        let mut config = RtcConfig::default();
        config.revision_cycles = 1;
        config.stake_rounds = 1;
        Orchestrator::new(config, roster(names), issue_for(names)).unwrap()
    }

    #[test]
    fn new_awards_standard_invite_payment() {
        let orch = orchestrator(&["A1", "A2"]);
        assert_eq!(orch.credit().balance("A1"), 100);
        assert_eq!(orch.credit().balance("A2"), 100);
    }

    #[test]
    fn rejects_unauthenticated_action() {
        let mut orch = orchestrator(&["A1"]);
        let result = orch.submit_action("A1", "wrong-secret", Action::SignalReady);
        assert_eq!(result, ActionResult::RejectedUnauthenticated);
    }

    #[test]
    fn submit_proposal_debits_self_stake() {
        let mut orch = orchestrator(&["A1"]);
        let result = orch.submit_action(
            "A1",
            "secret-A1",
            Action::SubmitProposal {
                body: ProposalBody::new("Title", "Action", "Rationale"),
            },
        );
        assert!(matches!(result, ActionResult::OkWithId(_)));
        assert_eq!(orch.credit().balance("A1"), 50);
        assert_eq!(orch.credit().locked_stakes("A1"), 50);
    }

    #[test]
    fn tick_advances_phase_once_all_agents_ready() {
        let mut orch = orchestrator(&["A1", "A2"]);
        orch.submit_action(
            "A1",
            "secret-A1",
            Action::SubmitProposal {
                body: ProposalBody::new("T1", "A1 action", "R1"),
            },
        );
        orch.submit_action(
            "A2",
            "secret-A2",
            Action::SubmitProposal {
                body: ProposalBody::new("T2", "A2 action", "R2"),
            },
        );
        let result = orch.tick().unwrap();
        assert!(result.phase_advanced);
        assert!(matches!(orch.phase(), Phase::Feedback(1)));
    }

    #[test]
    fn kickout_assigns_noaction_after_max_think_ticks() {
        let mut config = RtcConfig::default();
        config.max_think_ticks = 2;
        config.revision_cycles = 1;
        config.stake_rounds = 1;
        let mut orch = Orchestrator::new(config, roster(&["A1"]), issue_for(&["A1"])).unwrap();

        orch.tick().unwrap();
        let result = orch.tick().unwrap();
        assert_eq!(result.kicked_out, vec!["A1".to_string()]);
        assert!(orch.graph().active_proposal_for("A1").unwrap().is_noaction());
    }

    #[test]
    fn finalize_burns_all_stakes() {
        let mut config = RtcConfig::default();
        config.revision_cycles = 0;
        config.stake_rounds = 1;
        let mut orch = Orchestrator::new(config, roster(&["A1"]), issue_for(&["A1"])).unwrap();

        orch.submit_action(
            "A1",
            "secret-A1",
            Action::SubmitProposal {
                body: ProposalBody::new("T1", "A1 action", "R1"),
            },
        );
        orch.tick().unwrap(); // Propose -> Stake(1)
        orch.submit_action("A1", "secret-A1", Action::SignalReady);
        orch.tick().unwrap(); // Stake(1) -> Finalize, runs finalize()

        assert!(orch.is_finalized());
        assert_eq!(orch.credit().locked_stakes("A1"), 0);
    }

    #[test]
    fn checkpoint_and_restore_preserves_balances_and_proposals() {
        let mut orch = orchestrator(&["A1", "A2"]);
        orch.submit_action(
            "A1",
            "secret-A1",
            Action::SubmitProposal {
                body: ProposalBody::new("T1", "A1 action", "R1"),
            },
        );
        let snapshot = orch.checkpoint();

        let restored = Orchestrator::from_snapshot(
            {
                let mut c = RtcConfig::default();
                c.revision_cycles = 1;
                c.stake_rounds = 1;
                c
            },
            roster(&["A1", "A2"]),
            issue_for(&["A1", "A2"]),
            snapshot,
        )
        .unwrap();

        assert_eq!(restored.credit().balance("A1"), orch.credit().balance("A1"));
        assert_eq!(restored.credit().locked_stakes("A1"), orch.credit().locked_stakes("A1"));
        assert!(restored.graph().active_proposal_for("A1").is_some());
        assert_eq!(restored.current_tick(), orch.current_tick());
    }

    #[test]
    fn restore_rejects_mismatched_config() {
        let orch = orchestrator(&["A1"]);
        let snapshot = orch.checkpoint();
        let mut mismatched = RtcConfig::default();
        mismatched.stake_rounds = 99;
        let result = Orchestrator::from_snapshot(mismatched, roster(&["A1"]), issue_for(&["A1"]), snapshot);
        assert_eq!(result.unwrap_err(), SimulationError::ConfigMismatch);
    }

    #[test]
    fn query_state_hides_current_stake_round_events() {
        let mut config = RtcConfig::default();
        config.revision_cycles = 0;
        config.stake_rounds = 2;
        let mut orch = Orchestrator::new(config, roster(&["A1"]), issue_for(&["A1"])).unwrap();
        orch.submit_action(
            "A1",
            "secret-A1",
            Action::SubmitProposal {
                body: ProposalBody::new("T1", "A1 action", "R1"),
            },
        );
        orch.tick().unwrap(); // -> Stake(1)
        let visible_before = orch.query_state().len();
        orch.submit_action("A1", "secret-A1", Action::SignalReady);
        let visible_after = orch.query_state().len();
        // the AgentReady event committed this round is not yet visible
        assert_eq!(visible_before, visible_after);
    }
}
