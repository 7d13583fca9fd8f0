//! The owned campaign aggregate and its command handlers.
//!
//! Handlers are synchronous and return whether anything changed. Ids that do
//! not resolve leave the state untouched; callers decide whether to persist
//! and publish based on the returned flag.

use crate::metrics;
use crate::models::{
    Agent, AgentMessage, AgentStatus, AgentStatusView, ChatMessage, ChatRole, CampaignState, CrmState,
    DeliverableStatus, DeliverableView, Influencer, MessageType, OnboardingState, OutreachAttempt,
    OutreachStatus, PipelineStage, ScraperJob, ScraperStatus, TimelineEvent, UpdateOnboardingPayload,
};
use crate::scheduler::next_run_after;
use crate::scraper::{remaining_daily_cap, Discovery};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CampaignStore {
    pub campaign: CampaignState,
    pub crm: CrmState,
    pub onboarding: OnboardingState,
}

impl CampaignStore {
    pub fn new(campaign: CampaignState, crm: CrmState, onboarding: OnboardingState) -> Self {
        Self {
            campaign,
            crm,
            onboarding,
        }
    }

    pub fn seeded(now: DateTime<Utc>) -> Self {
        Self::new(
            crate::seed::campaign_state(now),
            crate::seed::crm_state(now),
            crate::seed::onboarding_state(),
        )
    }

    fn agent_mut(&mut self, agent_id: &str) -> Option<&mut Agent> {
        self.campaign.agents.iter_mut().find(|agent| agent.id == agent_id)
    }

    pub fn has_agent(&self, agent_id: &str) -> bool {
        self.campaign.agents.iter().any(|agent| agent.id == agent_id)
    }

    // ─── Deliverables ──────────────────────────────────────────────────────

    /// Flips one subtask. Completing the last open subtask completes the
    /// deliverable; un-checking a subtask never reopens it.
    pub fn toggle_subtask(&mut self, deliverable_id: &str, subtask_id: &str) -> bool {
        let Some(deliverable) = self
            .campaign
            .deliverables
            .iter_mut()
            .find(|item| item.id == deliverable_id)
        else {
            return false;
        };
        let Some(subtask) = deliverable.subtasks.iter_mut().find(|item| item.id == subtask_id) else {
            return false;
        };
        subtask.completed = !subtask.completed;

        let all_done = deliverable.subtasks.iter().all(|item| item.completed);
        if all_done && !deliverable.status.is_terminal() {
            deliverable.status = DeliverableStatus::Completed;
        }
        true
    }

    pub fn set_deliverable_status(&mut self, deliverable_id: &str, status: DeliverableStatus) -> bool {
        let Some(deliverable) = self
            .campaign
            .deliverables
            .iter_mut()
            .find(|item| item.id == deliverable_id)
        else {
            return false;
        };
        if !deliverable.status.can_transition_to(status) {
            tracing::debug!(
                deliverable_id,
                from = deliverable.status.as_str(),
                to = status.as_str(),
                "rejected deliverable status transition"
            );
            return false;
        }
        deliverable.status = status;
        true
    }

    pub fn deliverable_views(&self, today: NaiveDate) -> Vec<DeliverableView> {
        self.campaign
            .deliverables
            .iter()
            .map(|deliverable| metrics::deliverable_view(deliverable, today))
            .collect()
    }

    // ─── Messages ──────────────────────────────────────────────────────────

    pub fn mark_message_read(&mut self, message_id: &str) -> bool {
        match self.campaign.messages.iter_mut().find(|message| message.id == message_id) {
            Some(message) if !message.read => {
                message.read = true;
                true
            }
            _ => false,
        }
    }

    /// Resolves one action on a message. The action is removed, so it cannot
    /// be executed twice.
    pub fn execute_action(&mut self, message_id: &str, action_id: &str) -> bool {
        let Some(message) = self.campaign.messages.iter_mut().find(|message| message.id == message_id) else {
            return false;
        };
        let Some(position) = message.actions.iter().position(|action| action.id == action_id) else {
            return false;
        };
        message.actions.remove(position);
        message.read = true;
        if message.actions.is_empty() {
            message.action_required = false;
        }
        true
    }

    pub fn push_message(&mut self, message: AgentMessage) {
        self.campaign.messages.insert(0, message);
    }

    pub fn remove_message(&mut self, message_id: &str) -> bool {
        let before = self.campaign.messages.len();
        self.campaign.messages.retain(|message| message.id != message_id);
        self.campaign.messages.len() != before
    }

    // ─── Chat ──────────────────────────────────────────────────────────────

    pub fn append_chat(&mut self, agent_id: &str, role: ChatRole, content: &str, now: DateTime<Utc>) -> Option<ChatMessage> {
        if !self.has_agent(agent_id) {
            return None;
        }
        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.to_string(),
            timestamp: now,
        };
        self.campaign
            .chats
            .entry(agent_id.to_string())
            .or_default()
            .push(message.clone());
        Some(message)
    }

    /// Drops one turn from an agent's thread, used when it could not be saved.
    pub fn remove_chat(&mut self, agent_id: &str, message_id: &str) -> bool {
        let Some(thread) = self.campaign.chats.get_mut(agent_id) else {
            return false;
        };
        let before = thread.len();
        thread.retain(|message| message.id != message_id);
        thread.len() != before
    }

    pub fn chat_history(&self, agent_id: &str) -> Vec<ChatMessage> {
        self.campaign.chats.get(agent_id).cloned().unwrap_or_default()
    }

    // ─── Agents & orchestration ────────────────────────────────────────────

    pub fn trigger_orchestration(&mut self, agent_id: &str, now: DateTime<Utc>) -> Option<AgentMessage> {
        let agent = self.agent_mut(agent_id)?;
        agent.status = AgentStatus::Running;
        agent.active_tasks = agent.active_tasks.saturating_add(1);
        agent.total_tasks = agent.total_tasks.max(agent.active_tasks + agent.completed_tasks);
        agent.last_activity_at = Some(now);
        let name = agent.name.clone();

        let message = AgentMessage {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            r#type: MessageType::Status,
            title: format!("{} started a new run", name),
            content: format!("{} picked up the next queued task.", name),
            timestamp: now,
            read: false,
            actions: Vec::new(),
            action_required: false,
        };
        self.push_message(message.clone());
        Some(message)
    }

    pub fn agent_status_views(&self) -> Vec<AgentStatusView> {
        self.campaign
            .agents
            .iter()
            .map(|agent| {
                let display = agent.display();
                AgentStatusView {
                    agent: agent.clone(),
                    color: display.color.to_string(),
                    icon: display.icon.to_string(),
                    unread_messages: self
                        .campaign
                        .messages
                        .iter()
                        .filter(|message| message.agent_id == agent.id && !message.read)
                        .count(),
                    open_deliverables: self
                        .campaign
                        .deliverables
                        .iter()
                        .filter(|item| item.agent_id == agent.id && item.status != DeliverableStatus::Completed)
                        .count(),
                }
            })
            .collect()
    }

    pub fn timeline(&self) -> Vec<TimelineEvent> {
        let mut events = self.campaign.timeline.clone();
        events.sort_by(|left, right| left.date.cmp(&right.date).then_with(|| left.id.cmp(&right.id)));
        events
    }

    // ─── CRM ───────────────────────────────────────────────────────────────

    pub fn advance_influencer(&mut self, influencer_id: &str, stage: PipelineStage) -> bool {
        let Some(influencer) = self.crm.influencers.iter_mut().find(|item| item.id == influencer_id) else {
            return false;
        };
        if !influencer.stage.can_advance_to(stage) {
            return false;
        }
        influencer.stage = stage;
        true
    }

    /// Records a manual outreach attempt. First contact moves the record to
    /// `outreach_sent`; a second attempt while waiting counts as a follow-up.
    pub fn log_outreach(&mut self, influencer_id: &str, channel: &str, now: DateTime<Utc>) -> Option<OutreachAttempt> {
        let influencer = self.crm.influencers.iter_mut().find(|item| item.id == influencer_id)?;
        if influencer.stage.is_terminal() {
            return None;
        }
        let attempt = OutreachAttempt {
            id: Uuid::new_v4().to_string(),
            channel: channel.to_string(),
            automated: false,
            status: OutreachStatus::Sent,
            sent_at: now,
        };
        influencer.outreach.push(attempt.clone());
        let next = match influencer.stage {
            PipelineStage::Discovered | PipelineStage::Qualified => Some(PipelineStage::OutreachSent),
            PipelineStage::OutreachSent => Some(PipelineStage::FollowedUp),
            _ => None,
        };
        if let Some(next) = next {
            influencer.stage = next;
        }
        Some(attempt)
    }

    pub fn existing_handles(&self) -> HashSet<String> {
        self.crm.influencers.iter().map(|item| item.handle.clone()).collect()
    }

    pub fn scraper_job(&self, job_id: &str) -> Option<&ScraperJob> {
        self.crm.scraper_jobs.iter().find(|job| job.id == job_id)
    }

    /// Marks a job running. Returns `None` when the job is unknown, already
    /// running or paused, so a second call cannot double-count results.
    pub fn begin_scrape(&mut self, job_id: &str) -> Option<ScraperJob> {
        let job = self.crm.scraper_jobs.iter_mut().find(|job| job.id == job_id)?;
        if matches!(job.status, ScraperStatus::Running | ScraperStatus::Paused) {
            return None;
        }
        job.status = ScraperStatus::Running;
        Some(job.clone())
    }

    pub fn complete_scrape(
        &mut self,
        job_id: &str,
        discovery: Discovery,
        now: DateTime<Utc>,
    ) -> Option<(ScraperJob, Vec<Influencer>)> {
        let existing = self.existing_handles();
        let job = self.crm.scraper_jobs.iter_mut().find(|job| job.id == job_id)?;
        if job.status != ScraperStatus::Running {
            return None;
        }

        let today = now.date_naive();
        if job.counted_day != Some(today) {
            job.counted_day = Some(today);
            job.added_today = 0;
        }
        let cap = remaining_daily_cap(job, now) as usize;
        let added = discovery
            .added
            .into_iter()
            .filter(|item| !existing.contains(&item.handle))
            .take(cap)
            .collect::<Vec<_>>();

        job.results.scanned = job.results.scanned.saturating_add(discovery.scanned);
        job.results.qualified = job.results.qualified.saturating_add(discovery.qualified);
        job.results.added = job.results.added.saturating_add(added.len() as u64);
        job.added_today = job.added_today.saturating_add(added.len() as u32);
        job.last_run_at = Some(now);
        job.next_run_at = next_run_after(job, now);
        job.status = if job.config.recurring {
            ScraperStatus::Queued
        } else {
            ScraperStatus::Completed
        };
        let snapshot = job.clone();

        self.crm.influencers.extend(added.iter().cloned());
        Some((snapshot, added))
    }

    pub fn fail_scrape(&mut self, job_id: &str, now: DateTime<Utc>) -> Option<ScraperJob> {
        let job = self.crm.scraper_jobs.iter_mut().find(|job| job.id == job_id)?;
        if job.status != ScraperStatus::Running {
            return None;
        }
        job.status = ScraperStatus::Failed;
        job.last_run_at = Some(now);
        Some(job.clone())
    }

    /// Releases jobs left `running` by a pass that never finished, such as one
    /// cut short by a restart. Recurring jobs are queued again; one-off jobs
    /// are marked failed so they can be rerun by hand.
    pub fn recover_interrupted_scrapes(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut recovered = Vec::new();
        for job in self
            .crm
            .scraper_jobs
            .iter_mut()
            .filter(|job| job.status == ScraperStatus::Running)
        {
            if job.config.recurring {
                job.status = ScraperStatus::Queued;
                if job.next_run_at.is_none() {
                    job.next_run_at = Some(now);
                }
            } else {
                job.status = ScraperStatus::Failed;
            }
            recovered.push(job.id.clone());
        }
        recovered
    }

    pub fn set_scraper_paused(&mut self, job_id: &str, paused: bool, now: DateTime<Utc>) -> bool {
        let Some(job) = self.crm.scraper_jobs.iter_mut().find(|job| job.id == job_id) else {
            return false;
        };
        match (paused, job.status) {
            (true, ScraperStatus::Paused | ScraperStatus::Running) => false,
            (true, _) => {
                job.status = ScraperStatus::Paused;
                true
            }
            (false, ScraperStatus::Paused) => {
                job.status = ScraperStatus::Queued;
                if job.config.recurring && job.next_run_at.is_none() {
                    job.next_run_at = Some(now);
                }
                true
            }
            (false, _) => false,
        }
    }

    // ─── Onboarding ────────────────────────────────────────────────────────

    pub fn update_onboarding(&mut self, payload: UpdateOnboardingPayload) -> OnboardingState {
        if let Some(step) = payload.step {
            self.onboarding.step = step;
        }
        if let Some(brand_name) = payload.brand_name {
            let trimmed = brand_name.trim();
            self.onboarding.brand_name = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
        if let Some(goals) = payload.goals {
            self.onboarding.goals = goals
                .into_iter()
                .map(|goal| goal.trim().to_string())
                .filter(|goal| !goal.is_empty())
                .collect();
        }
        self.onboarding.clone()
    }

    pub fn complete_onboarding(&mut self, now: DateTime<Utc>) -> bool {
        if self.onboarding.completed {
            return false;
        }
        self.onboarding.completed = true;
        self.onboarding.completed_at = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::CampaignStore;
    use crate::metrics::deliverable_progress;
    use crate::models::{ChatRole, DeliverableStatus, PipelineStage, ScraperStatus, Subtask, UpdateOnboardingPayload};
    use crate::scraper::Discovery;
    use chrono::{Duration, Utc};

    fn store() -> CampaignStore {
        CampaignStore::seeded(Utc::now())
    }

    fn four_step_deliverable(store: &mut CampaignStore) -> String {
        let deliverable = &mut store.campaign.deliverables[2];
        deliverable.status = DeliverableStatus::InProgress;
        deliverable.subtasks = (1..=4)
            .map(|index| Subtask {
                id: format!("s{}", index),
                title: format!("step {}", index),
                completed: index <= 2,
            })
            .collect();
        deliverable.id.clone()
    }

    #[test]
    fn partial_subtasks_do_not_complete_deliverable() {
        let mut store = store();
        let id = four_step_deliverable(&mut store);
        let deliverable = &store.campaign.deliverables[2];
        assert_eq!(deliverable_progress(deliverable), 50);
        assert_eq!(deliverable.status, DeliverableStatus::InProgress);

        assert!(store.toggle_subtask(&id, "s3"));
        assert_eq!(store.campaign.deliverables[2].status, DeliverableStatus::InProgress);
        assert!(store.toggle_subtask(&id, "s4"));
        assert_eq!(store.campaign.deliverables[2].status, DeliverableStatus::Completed);
        assert_eq!(deliverable_progress(&store.campaign.deliverables[2]), 100);

        assert!(store.toggle_subtask(&id, "s4"));
        assert_eq!(store.campaign.deliverables[2].status, DeliverableStatus::Completed);
    }

    #[test]
    fn double_toggle_restores_subtask() {
        let mut store = store();
        let id = four_step_deliverable(&mut store);
        let before = store.campaign.deliverables[2].subtasks[0].completed;
        assert!(store.toggle_subtask(&id, "s1"));
        assert!(store.toggle_subtask(&id, "s1"));
        assert_eq!(store.campaign.deliverables[2].subtasks[0].completed, before);
    }

    #[test]
    fn unknown_ids_are_silent_no_ops() {
        let mut store = store();
        let before = serde_json::to_value(&store.campaign).expect("serialize");
        assert!(!store.toggle_subtask("missing", "s1"));
        assert!(!store.toggle_subtask("del-hero-assets", "missing"));
        assert!(!store.mark_message_read("missing"));
        assert!(!store.execute_action("msg-legal-review", "missing"));
        assert!(!store.set_deliverable_status("missing", DeliverableStatus::Blocked));
        assert!(store.trigger_orchestration("missing", Utc::now()).is_none());
        assert!(store.append_chat("missing", ChatRole::User, "hi", Utc::now()).is_none());
        assert_eq!(serde_json::to_value(&store.campaign).expect("serialize"), before);
    }

    #[test]
    fn mark_read_is_idempotent() {
        let mut store = store();
        assert!(store.mark_message_read("msg-legal-review"));
        let once = serde_json::to_value(&store.campaign.messages).expect("serialize");
        assert!(!store.mark_message_read("msg-legal-review"));
        assert_eq!(serde_json::to_value(&store.campaign.messages).expect("serialize"), once);
    }

    #[test]
    fn executing_actions_resolves_them() {
        let mut store = store();
        assert!(store.execute_action("msg-legal-review", "approve"));
        let message = store
            .campaign
            .messages
            .iter()
            .find(|message| message.id == "msg-legal-review")
            .expect("message");
        assert!(message.read);
        assert_eq!(message.actions.len(), 1);
        assert!(message.action_required);

        assert!(!store.execute_action("msg-legal-review", "approve"));
        assert!(store.execute_action("msg-legal-review", "reject"));
        let message = store
            .campaign
            .messages
            .iter()
            .find(|message| message.id == "msg-legal-review")
            .expect("message");
        assert!(message.actions.is_empty());
        assert!(!message.action_required);
    }

    #[test]
    fn deliverable_state_machine_is_enforced() {
        let mut store = store();
        let id = "del-endcap-program";
        assert!(!store.set_deliverable_status(id, DeliverableStatus::Completed));
        assert!(store.set_deliverable_status(id, DeliverableStatus::InProgress));
        assert!(store.set_deliverable_status(id, DeliverableStatus::Blocked));
        assert!(!store.set_deliverable_status(id, DeliverableStatus::InReview));
        assert!(store.set_deliverable_status(id, DeliverableStatus::InProgress));
        assert!(store.set_deliverable_status(id, DeliverableStatus::InReview));
        assert!(store.set_deliverable_status(id, DeliverableStatus::Completed));
        assert!(!store.set_deliverable_status(id, DeliverableStatus::Blocked));
    }

    #[test]
    fn influencer_stages_only_move_forward() {
        let mut store = store();
        assert!(!store.advance_influencer("inf-3", PipelineStage::OutreachSent));
        assert!(store.advance_influencer("inf-3", PipelineStage::Negotiating));
        assert!(store.advance_influencer("inf-3", PipelineStage::Declined));
        assert!(!store.advance_influencer("inf-3", PipelineStage::Contracted));
        assert!(!store.advance_influencer("missing", PipelineStage::Qualified));
    }

    #[test]
    fn manual_outreach_moves_record_into_funnel() {
        let mut store = store();
        let now = Utc::now();
        assert!(store.log_outreach("inf-8", "dm", now).is_some());
        let stage = |store: &CampaignStore| {
            store
                .crm
                .influencers
                .iter()
                .find(|item| item.id == "inf-8")
                .map(|item| item.stage)
        };
        assert_eq!(stage(&store), Some(PipelineStage::OutreachSent));
        store.log_outreach("inf-8", "email", now);
        assert_eq!(stage(&store), Some(PipelineStage::FollowedUp));
        assert!(store.log_outreach("inf-6", "email", now).is_none());
    }

    #[test]
    fn running_scrape_cannot_begin_twice() {
        let mut store = store();
        let job_id = "job-hashtag-holidayhome";
        assert!(store.begin_scrape(job_id).is_some());
        assert!(store.begin_scrape(job_id).is_none());
        assert!(store.begin_scrape("job-keyword-tablescape").is_none());
    }

    #[test]
    fn completing_scrape_requeues_recurring_jobs() {
        let mut store = store();
        let now = Utc::now();
        let job_id = "job-hashtag-holidayhome";
        let before = store.scraper_job(job_id).expect("job").results.clone();
        let influencers_before = store.crm.influencers.len();
        store.begin_scrape(job_id).expect("begin");

        let mut discovery = Discovery {
            scanned: 100,
            qualified: 10,
            added: Vec::new(),
        };
        for index in 0..20 {
            let mut influencer = store.crm.influencers[0].clone();
            influencer.id = format!("new-{}", index);
            influencer.handle = format!("@new{}", index);
            discovery.added.push(influencer);
        }

        let (job, added) = store.complete_scrape(job_id, discovery, now).expect("complete");
        assert_eq!(added.len(), 15);
        assert_eq!(job.status, ScraperStatus::Queued);
        assert_eq!(job.results.scanned, before.scanned + 100);
        assert_eq!(job.results.added, before.added + 15);
        assert_eq!(job.added_today, 15);
        assert_eq!(job.next_run_at, Some(now + Duration::hours(24)));
        assert_eq!(store.crm.influencers.len(), influencers_before + 15);

        assert!(store.complete_scrape(job_id, Discovery::default(), now).is_none());
    }

    #[test]
    fn one_shot_jobs_complete() {
        let mut store = store();
        let now = Utc::now();
        let job_id = "job-competitor-homegoods";
        store.begin_scrape(job_id).expect("begin");
        let (job, _) = store.complete_scrape(job_id, Discovery::default(), now).expect("complete");
        assert_eq!(job.status, ScraperStatus::Completed);
        assert!(job.next_run_at.is_none());
    }

    #[test]
    fn pause_and_resume_scraper() {
        let mut store = store();
        let now = Utc::now();
        assert!(store.set_scraper_paused("job-hashtag-holidayhome", true, now));
        assert!(store.begin_scrape("job-hashtag-holidayhome").is_none());
        assert!(store.set_scraper_paused("job-keyword-tablescape", false, now));
        let resumed = store.scraper_job("job-keyword-tablescape").expect("job");
        assert_eq!(resumed.status, ScraperStatus::Queued);
        assert_eq!(resumed.next_run_at, Some(now));
    }

    #[test]
    fn interrupted_scrapes_are_released() {
        let mut store = store();
        let now = Utc::now();
        store.begin_scrape("job-hashtag-holidayhome").expect("begin");
        store.begin_scrape("job-competitor-homegoods").expect("begin");

        let mut recovered = store.recover_interrupted_scrapes(now);
        recovered.sort();
        assert_eq!(recovered, vec!["job-competitor-homegoods", "job-hashtag-holidayhome"]);
        let recurring = store.scraper_job("job-hashtag-holidayhome").expect("job");
        assert_eq!(recurring.status, ScraperStatus::Queued);
        assert_eq!(
            store.scraper_job("job-competitor-homegoods").expect("job").status,
            ScraperStatus::Failed
        );
        assert!(store.recover_interrupted_scrapes(now).is_empty());

        assert!(store.begin_scrape("job-competitor-homegoods").is_some());
        assert!(store.set_scraper_paused("job-hashtag-holidayhome", true, now));
    }

    #[test]
    fn rolled_back_chat_and_feed_entries_are_removed() {
        let mut store = store();
        let now = Utc::now();
        let turn = store.append_chat("content", ChatRole::User, "hello", now).expect("turn");
        assert!(store.remove_chat("content", &turn.id));
        assert!(store.chat_history("content").is_empty());
        assert!(!store.remove_chat("content", &turn.id));

        let message = store.trigger_orchestration("content", now).expect("message");
        assert!(store.remove_message(&message.id));
        assert!(!store.remove_message(&message.id));
    }

    #[test]
    fn orchestration_marks_agent_running() {
        let mut store = store();
        let message = store
            .trigger_orchestration("paid-media", Utc::now())
            .expect("known agent");
        assert_eq!(store.campaign.messages[0].id, message.id);
        let views = store.agent_status_views();
        let paid = views.iter().find(|view| view.agent.id == "paid-media").expect("agent");
        assert_eq!(paid.agent.status, crate::models::AgentStatus::Running);
        assert_eq!(paid.color, "#ef4444");
    }

    #[test]
    fn onboarding_updates_trim_and_complete_once() {
        let mut store = store();
        let state = store.update_onboarding(UpdateOnboardingPayload {
            step: Some(2),
            brand_name: Some("  Northwind  ".to_string()),
            goals: Some(vec!["awareness".to_string(), "  ".to_string()]),
        });
        assert_eq!(state.brand_name.as_deref(), Some("Northwind"));
        assert_eq!(state.goals, vec!["awareness".to_string()]);
        assert!(store.complete_onboarding(Utc::now()));
        assert!(!store.complete_onboarding(Utc::now()));
    }
}
