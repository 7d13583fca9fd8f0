//! Derived views over the store's collections.
//!
//! Everything here is a pure function of its arguments: no mutation, no
//! clocks (callers pass `today`), and no panics on odd input. Negative or
//! non-finite amounts are read as zero and unknown ids as empty records.

use crate::models::{
    Agent, AgentKind, AgentMessage, Budget, Campaign, CampaignState, CrmState, Deliverable,
    DeliverableStatus, DeliverableView, DisplayStatus, Influencer, PipelineStage,
};
use crate::policy::HealthPolicy;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverableStats {
    pub total_deliverables: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub in_review: usize,
    pub not_started: usize,
    pub blocked: usize,
    pub overdue: usize,
    pub completion_rate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthInputs {
    pub total: u32,
    pub overdue: u32,
    pub blocked: u32,
    pub budget_spent_ratio: f64,
    pub schedule_elapsed_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub total: usize,
    pub by_stage: BTreeMap<PipelineStage, usize>,
    pub contacted: usize,
    pub responded: usize,
    pub contracted: usize,
    pub response_rate: u32,
    pub conversion_rate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingStatus {
    UnderPacing,
    OnTrack,
    OverPacing,
    OverBudget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPacing {
    pub agent_id: String,
    pub agent_name: String,
    pub allocated: f64,
    pub spent: f64,
    /// Unclamped share of the allocation spent; above 100 means overspend.
    pub raw_pct: f64,
    /// Bar width, clamped to 100.
    pub display_pct: f64,
    pub over_budget: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetPacing {
    pub total: f64,
    pub spent: f64,
    pub committed: f64,
    pub remaining: f64,
    pub spent_pct: f64,
    pub committed_pct: f64,
    pub elapsed_pct: f64,
    pub per_agent: Vec<AgentPacing>,
    pub pacing: PacingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentWorkload {
    pub agent_id: String,
    pub total: usize,
    pub completed: usize,
    pub open: usize,
    pub blocked: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: DeliverableStats,
    pub health_score: u8,
    pub pipeline: PipelineStats,
    pub budget: BudgetPacing,
    pub workload: Vec<AgentWorkload>,
    pub upcoming: Vec<DeliverableView>,
    pub unread_messages: usize,
    pub pending_actions: usize,
}

fn percent(numerator: usize, denominator: usize) -> u32 {
    if denominator == 0 {
        return 0;
    }
    ((numerator as f64 / denominator as f64) * 100.0).round() as u32
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn ratio_pct(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        return 0.0;
    }
    round_tenth(numerator / denominator * 100.0)
}

// ─── Deliverables ───────────────────────────────────────────────────────────

pub fn deliverable_progress(deliverable: &Deliverable) -> u32 {
    let done = deliverable.subtasks.iter().filter(|subtask| subtask.completed).count();
    percent(done, deliverable.subtasks.len())
}

pub fn is_overdue(deliverable: &Deliverable, today: NaiveDate) -> bool {
    deliverable.status != DeliverableStatus::Completed && deliverable.due_date < today
}

pub fn effective_status(deliverable: &Deliverable, today: NaiveDate) -> DisplayStatus {
    if is_overdue(deliverable, today) && deliverable.status != DeliverableStatus::Blocked {
        return DisplayStatus::Overdue;
    }
    match deliverable.status {
        DeliverableStatus::NotStarted => DisplayStatus::NotStarted,
        DeliverableStatus::InProgress => DisplayStatus::InProgress,
        DeliverableStatus::InReview => DisplayStatus::InReview,
        DeliverableStatus::Completed => DisplayStatus::Completed,
        DeliverableStatus::Blocked => DisplayStatus::Blocked,
    }
}

pub fn deliverable_view(deliverable: &Deliverable, today: NaiveDate) -> DeliverableView {
    DeliverableView {
        progress: deliverable_progress(deliverable),
        display_status: effective_status(deliverable, today),
        deliverable: deliverable.clone(),
    }
}

pub fn compute_stats(deliverables: &[Deliverable], today: NaiveDate) -> DeliverableStats {
    let mut stats = DeliverableStats {
        total_deliverables: deliverables.len(),
        ..DeliverableStats::default()
    };
    for deliverable in deliverables {
        match deliverable.status {
            DeliverableStatus::Completed => stats.completed += 1,
            DeliverableStatus::InProgress => stats.in_progress += 1,
            DeliverableStatus::InReview => stats.in_review += 1,
            DeliverableStatus::NotStarted => stats.not_started += 1,
            DeliverableStatus::Blocked => stats.blocked += 1,
        }
        if is_overdue(deliverable, today) {
            stats.overdue += 1;
        }
    }
    stats.completion_rate = percent(stats.completed, stats.total_deliverables);
    stats
}

pub fn agent_workload(agents: &[Agent], deliverables: &[Deliverable]) -> Vec<AgentWorkload> {
    agents
        .iter()
        .map(|agent| {
            let owned = deliverables
                .iter()
                .filter(|deliverable| deliverable.agent_id == agent.id)
                .collect::<Vec<_>>();
            let completed = owned
                .iter()
                .filter(|deliverable| deliverable.status == DeliverableStatus::Completed)
                .count();
            let blocked = owned
                .iter()
                .filter(|deliverable| deliverable.status == DeliverableStatus::Blocked)
                .count();
            AgentWorkload {
                agent_id: agent.id.clone(),
                total: owned.len(),
                completed,
                open: owned.len() - completed,
                blocked,
            }
        })
        .collect()
}

pub fn upcoming_deadlines(deliverables: &[Deliverable], today: NaiveDate, limit: usize) -> Vec<DeliverableView> {
    let mut open = deliverables
        .iter()
        .filter(|deliverable| deliverable.status != DeliverableStatus::Completed && deliverable.due_date >= today)
        .collect::<Vec<_>>();
    open.sort_by(|left, right| {
        left.due_date
            .cmp(&right.due_date)
            .then(left.priority.cmp(&right.priority))
    });
    open.into_iter()
        .take(limit)
        .map(|deliverable| deliverable_view(deliverable, today))
        .collect()
}

pub fn unread_count(messages: &[AgentMessage]) -> usize {
    messages.iter().filter(|message| !message.read).count()
}

pub fn pending_actions(messages: &[AgentMessage]) -> usize {
    messages
        .iter()
        .filter(|message| message.action_required && !message.actions.is_empty())
        .count()
}

// ─── Health ─────────────────────────────────────────────────────────────────

pub fn campaign_elapsed_ratio(campaign: &Campaign, today: NaiveDate) -> f64 {
    let span = (campaign.end_date - campaign.start_date).num_days();
    if span <= 0 {
        return if today >= campaign.end_date { 1.0 } else { 0.0 };
    }
    let elapsed = (today - campaign.start_date).num_days();
    (elapsed as f64 / span as f64).clamp(0.0, 1.0)
}

pub fn health_inputs(state: &CampaignState, today: NaiveDate) -> HealthInputs {
    let stats = compute_stats(&state.deliverables, today);
    let budget = &state.campaign.budget;
    let total_budget = non_negative(budget.total);
    let spent_ratio = if total_budget > 0.0 {
        non_negative(budget.spent) / total_budget
    } else {
        0.0
    };
    HealthInputs {
        total: stats.total_deliverables as u32,
        overdue: stats.overdue as u32,
        blocked: stats.blocked as u32,
        budget_spent_ratio: spent_ratio,
        schedule_elapsed_ratio: campaign_elapsed_ratio(&state.campaign, today),
    }
}

/// Composite 0..=100 indicator. Deterministic for a given input and policy,
/// and never increases when blocked or overdue counts grow.
pub fn compute_health_score(inputs: &HealthInputs, policy: &HealthPolicy) -> u8 {
    let policy = policy.normalized();

    let overdue = inputs.overdue.min(inputs.total);
    let on_time_ratio = if inputs.total == 0 {
        1.0
    } else {
        f64::from(inputs.total - overdue) / f64::from(inputs.total)
    };

    let spent = non_negative(inputs.budget_spent_ratio).min(10.0);
    let elapsed = non_negative(inputs.schedule_elapsed_ratio).min(1.0);
    let gap_points = (spent - elapsed).abs() * 100.0;
    let budget_ratio = if gap_points <= policy.pacing_tolerance_pct {
        1.0
    } else {
        (1.0 - (gap_points - policy.pacing_tolerance_pct) / 100.0).max(0.0)
    };

    let weight_sum = policy.on_time_weight + policy.budget_weight;
    let weighted = (policy.on_time_weight * on_time_ratio + policy.budget_weight * budget_ratio) / weight_sum;

    let penalty = policy.blocked_penalty * f64::from(inputs.blocked) + policy.overdue_penalty * f64::from(inputs.overdue);
    let score = (weighted * 100.0 - penalty).clamp(0.0, 100.0);
    score.round() as u8
}

// ─── Pipeline ───────────────────────────────────────────────────────────────

const CONTACTED_INDEX: u8 = 2;
const RESPONDED_INDEX: u8 = 4;
const CONTRACTED_INDEX: u8 = 6;

pub fn compute_pipeline_stats(influencers: &[Influencer]) -> PipelineStats {
    let mut by_stage = PipelineStage::ALL
        .into_iter()
        .map(|stage| (stage, 0usize))
        .collect::<BTreeMap<_, _>>();
    let mut contacted = 0usize;
    let mut responded = 0usize;
    let mut contracted = 0usize;

    for influencer in influencers {
        *by_stage.entry(influencer.stage).or_insert(0) += 1;
        let reached = influencer.stage.reached_index();
        if reached >= CONTACTED_INDEX {
            contacted += 1;
        }
        if reached >= RESPONDED_INDEX {
            responded += 1;
        }
        if reached >= CONTRACTED_INDEX {
            contracted += 1;
        }
    }

    PipelineStats {
        total: influencers.len(),
        by_stage,
        contacted,
        responded,
        contracted,
        response_rate: percent(responded, contacted),
        conversion_rate: percent(contracted, influencers.len()),
    }
}

// ─── Budget ─────────────────────────────────────────────────────────────────

fn agent_name(agents: &[Agent], agent_id: &str) -> String {
    agents
        .iter()
        .find(|agent| agent.id == agent_id)
        .map(|agent| agent.name.clone())
        .or_else(|| AgentKind::from_id(agent_id).map(|kind| kind.display().name.to_string()))
        .unwrap_or_else(|| agent_id.to_string())
}

pub fn compute_budget_pacing(
    budget: &Budget,
    agents: &[Agent],
    elapsed_ratio: f64,
    policy: &HealthPolicy,
) -> BudgetPacing {
    let policy = policy.normalized();
    let total = non_negative(budget.total);
    let spent = non_negative(budget.spent);
    let committed = non_negative(budget.committed);
    let spent_pct = ratio_pct(spent, total);
    let elapsed_pct = round_tenth(non_negative(elapsed_ratio).min(1.0) * 100.0);

    let per_agent = budget
        .by_agent
        .iter()
        .map(|line| {
            let allocated = non_negative(line.allocated);
            let agent_spent = non_negative(line.spent);
            let raw_pct = ratio_pct(agent_spent, allocated);
            let over_budget = if allocated > 0.0 { raw_pct > 100.0 } else { agent_spent > 0.0 };
            AgentPacing {
                agent_id: line.agent_id.clone(),
                agent_name: agent_name(agents, &line.agent_id),
                allocated,
                spent: agent_spent,
                raw_pct,
                display_pct: raw_pct.min(100.0),
                over_budget,
            }
        })
        .collect::<Vec<_>>();

    let pacing = if spent > total {
        PacingStatus::OverBudget
    } else if total == 0.0 {
        PacingStatus::OnTrack
    } else {
        let gap = spent_pct - elapsed_pct;
        if gap > policy.pacing_tolerance_pct {
            PacingStatus::OverPacing
        } else if gap < -policy.pacing_tolerance_pct {
            PacingStatus::UnderPacing
        } else {
            PacingStatus::OnTrack
        }
    };

    BudgetPacing {
        total,
        spent,
        committed,
        remaining: (total - spent - committed).max(0.0),
        spent_pct,
        committed_pct: ratio_pct(committed, total),
        elapsed_pct,
        per_agent,
        pacing,
    }
}

pub fn build_dashboard(
    campaign: &CampaignState,
    crm: &CrmState,
    policy: &HealthPolicy,
    today: NaiveDate,
) -> Dashboard {
    let elapsed = campaign_elapsed_ratio(&campaign.campaign, today);
    Dashboard {
        stats: compute_stats(&campaign.deliverables, today),
        health_score: compute_health_score(&health_inputs(campaign, today), policy),
        pipeline: compute_pipeline_stats(&crm.influencers),
        budget: compute_budget_pacing(&campaign.campaign.budget, &campaign.agents, elapsed, policy),
        workload: agent_workload(&campaign.agents, &campaign.deliverables),
        upcoming: upcoming_deadlines(&campaign.deliverables, today, 5),
        unread_messages: unread_count(&campaign.messages),
        pending_actions: pending_actions(&campaign.messages),
    }
}
