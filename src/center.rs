use crate::db::{Database, StoredState, CAMPAIGN_KEY, CRM_KEY, ONBOARDING_KEY};
use crate::errors::{AppError, AppResult};
use crate::inflight::{brief_key, chat_key, InflightRegistry};
use crate::metrics::{self, BudgetPacing, Dashboard, PipelineStats};
use crate::models::{
    AgentKind, AgentMessage, AgentStatusView, AppSettings, BooleanResponse, BriefKind, BriefOutcome,
    CampaignSummary, ChatMessage, ChatOutcome, ChatRole, DeliverableStatus, DeliverableView, Influencer,
    LoadingState, MessageType, OnboardingState, OutreachAttempt, PipelineStage, RunScraperResponse,
    ScraperJob, ScraperStatus, StoreEvent, TimelineEvent, UpdateOnboardingPayload,
};
use crate::policy::HealthPolicy;
use crate::provider::{AssistantProvider, BriefRequest, ChatRequest, SimulatedProvider};
use crate::scheduler::{due_jobs, Scheduler};
use crate::scraper::simulate_discovery;
use crate::seed;
use crate::store::CampaignStore;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::{timeout, Duration};
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const MAX_QUEUED_SCRAPES: usize = 32;

#[derive(Debug, Clone, Copy)]
enum Namespace {
    Campaign,
    Crm,
    Onboarding,
}

/// Service behind the command surface: owns the store and routes every
/// mutation through persistence and the event channel.
#[derive(Clone)]
pub struct CommandCenter {
    db: Arc<Database>,
    store: Arc<Mutex<CampaignStore>>,
    provider: Arc<dyn AssistantProvider>,
    inflight: InflightRegistry,
    scheduler: Scheduler,
    events: broadcast::Sender<StoreEvent>,
    seq: Arc<AtomicU64>,
    hydrated: Arc<AtomicBool>,
    settings: Arc<RwLock<AppSettings>>,
    policy_override: Option<HealthPolicy>,
    app_data_dir: PathBuf,
}

impl CommandCenter {
    pub fn new(app_data_dir: PathBuf) -> AppResult<Arc<Self>> {
        let db = Database::new(&app_data_dir.join("state.sqlite"))?;
        let settings = db.get_settings()?;
        let provider = Arc::new(SimulatedProvider::from_settings(&settings));
        Self::build(app_data_dir, db, settings, provider)
    }

    pub fn with_provider(app_data_dir: PathBuf, provider: Arc<dyn AssistantProvider>) -> AppResult<Arc<Self>> {
        let db = Database::new(&app_data_dir.join("state.sqlite"))?;
        let settings = db.get_settings()?;
        Self::build(app_data_dir, db, settings, provider)
    }

    fn build(
        app_data_dir: PathBuf,
        db: Database,
        settings: AppSettings,
        provider: Arc<dyn AssistantProvider>,
    ) -> AppResult<Arc<Self>> {
        let policy_override = match HealthPolicy::load_override(&app_data_dir) {
            Ok(policy) => policy,
            Err(error) => {
                tracing::warn!(error = %error, "ignoring unreadable health policy override");
                None
            }
        };
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let scheduler = Scheduler::new(MAX_QUEUED_SCRAPES);

        let this = Arc::new(Self {
            db: Arc::new(db),
            store: Arc::new(Mutex::new(CampaignStore::seeded(Utc::now()))),
            provider,
            inflight: InflightRegistry::new(),
            scheduler: scheduler.clone(),
            events,
            seq: Arc::new(AtomicU64::new(0)),
            hydrated: Arc::new(AtomicBool::new(false)),
            settings: Arc::new(RwLock::new(settings)),
            policy_override,
            app_data_dir,
        });

        let weak = Arc::downgrade(&this);
        scheduler.set_executor(Arc::new(move |job_id: String| {
            let weak = weak.clone();
            Box::pin(async move {
                match weak.upgrade() {
                    Some(strong) => strong.execute_scheduled_scrape(job_id).await,
                    None => true,
                }
            })
        }));

        Ok(this)
    }

    pub fn app_data_dir(&self) -> &Path {
        &self.app_data_dir
    }

    // ─── Hydration & persistence ───────────────────────────────────────────

    /// Loads every persisted namespace, falling back to seed data for any
    /// namespace that is missing or unreadable.
    pub async fn hydrate(&self) -> AppResult<()> {
        let now = Utc::now();
        let campaign = self.load_or_seed(CAMPAIGN_KEY, || seed::campaign_state(now))?;
        let crm = self.load_or_seed(CRM_KEY, || seed::crm_state(now))?;
        let onboarding = self.load_or_seed(ONBOARDING_KEY, seed::onboarding_state)?;

        {
            let mut store = self.store.lock().await;
            *store = CampaignStore::new(campaign, crm, onboarding);
            let recovered = store.recover_interrupted_scrapes(now);
            if !recovered.is_empty() {
                tracing::warn!(jobs = ?recovered, "released scrapes interrupted before completion");
            }
            for namespace in [Namespace::Campaign, Namespace::Crm, Namespace::Onboarding] {
                self.persist(&store, namespace)?;
            }
        }
        self.hydrated.store(true, Ordering::SeqCst);
        tracing::info!(db_path = %self.db.path().display(), "command center state hydrated");
        self.publish("store.hydrated", json!({}));
        Ok(())
    }

    fn load_or_seed<T: DeserializeOwned>(&self, key: &str, seed: impl FnOnce() -> T) -> AppResult<T> {
        match self.db.load_state::<T>(key)? {
            StoredState::Loaded(value) => Ok(value),
            StoredState::Missing => {
                tracing::debug!(key, "no persisted state, using seed");
                Ok(seed())
            }
            StoredState::Invalid(reason) => {
                tracing::warn!(key, reason = %reason, "persisted state unreadable, falling back to seed");
                Ok(seed())
            }
        }
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated.load(Ordering::SeqCst)
    }

    fn persist(&self, store: &CampaignStore, namespace: Namespace) -> AppResult<()> {
        match namespace {
            Namespace::Campaign => self.db.save_state(CAMPAIGN_KEY, &store.campaign),
            Namespace::Crm => self.db.save_state(CRM_KEY, &store.crm),
            Namespace::Onboarding => self.db.save_state(ONBOARDING_KEY, &store.onboarding),
        }
    }

    // ─── Events ────────────────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event_type: &str, payload: serde_json::Value) {
        let envelope = StoreEvent {
            r#type: event_type.to_string(),
            payload,
            timestamp: Utc::now(),
            event_id: Uuid::new_v4().to_string(),
            seq: self.seq.fetch_add(1, Ordering::SeqCst) + 1,
        };
        // No subscribers is fine; the store is the source of truth.
        let _ = self.events.send(envelope);
    }

    fn publish_loading(&self, key: &str, loading: bool) {
        self.publish("loading.changed", json!({ "key": key, "loading": loading }));
    }

    // ─── Settings ──────────────────────────────────────────────────────────

    pub fn get_settings(&self) -> AppResult<AppSettings> {
        self.db.get_settings()
    }

    pub async fn update_settings(&self, update: serde_json::Value) -> AppResult<AppSettings> {
        let updated = self.db.update_settings(update)?;
        self.provider.apply_settings(&updated);
        *self.settings.write().await = updated.clone();
        tracing::info!(
            chat_latency_ms = updated.chat_latency_ms,
            provider_timeout_ms = updated.provider_timeout_ms,
            "settings updated"
        );
        self.publish("settings.updated", json!({}));
        Ok(updated)
    }

    async fn health_policy(&self) -> HealthPolicy {
        match &self.policy_override {
            Some(policy) => policy.normalized(),
            None => self.settings.read().await.health_policy.normalized(),
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    // ─── Selectors ─────────────────────────────────────────────────────────

    pub async fn get_dashboard(&self) -> Dashboard {
        let policy = self.health_policy().await;
        let store = self.store.lock().await;
        metrics::build_dashboard(&store.campaign, &store.crm, &policy, Self::today())
    }

    pub async fn get_pipeline_stats(&self) -> PipelineStats {
        let store = self.store.lock().await;
        metrics::compute_pipeline_stats(&store.crm.influencers)
    }

    pub async fn get_budget_pacing(&self) -> BudgetPacing {
        let policy = self.health_policy().await;
        let store = self.store.lock().await;
        let elapsed = metrics::campaign_elapsed_ratio(&store.campaign.campaign, Self::today());
        metrics::compute_budget_pacing(&store.campaign.campaign.budget, &store.campaign.agents, elapsed, &policy)
    }

    pub async fn list_campaigns(&self) -> Vec<CampaignSummary> {
        let policy = self.health_policy().await;
        let today = Self::today();
        let store = self.store.lock().await;
        let campaign = &store.campaign.campaign;
        let stats = metrics::compute_stats(&store.campaign.deliverables, today);
        let health = metrics::compute_health_score(&metrics::health_inputs(&store.campaign, today), &policy);
        vec![CampaignSummary {
            id: campaign.id.clone(),
            name: campaign.name.clone(),
            client: campaign.client.clone(),
            start_date: campaign.start_date,
            end_date: campaign.end_date,
            health_score: health,
            completion_rate: stats.completion_rate,
        }]
    }

    pub async fn get_agent_status(&self, agent_id: Option<&str>) -> Vec<AgentStatusView> {
        let store = self.store.lock().await;
        store
            .agent_status_views()
            .into_iter()
            .filter(|view| agent_id.map_or(true, |id| view.agent.id == id))
            .collect()
    }

    pub async fn list_deliverables(&self, agent_id: Option<&str>) -> Vec<DeliverableView> {
        let store = self.store.lock().await;
        store
            .deliverable_views(Self::today())
            .into_iter()
            .filter(|view| agent_id.map_or(true, |id| view.deliverable.agent_id == id))
            .collect()
    }

    pub async fn list_timeline(&self) -> Vec<TimelineEvent> {
        self.store.lock().await.timeline()
    }

    pub async fn list_messages(&self) -> Vec<AgentMessage> {
        self.store.lock().await.campaign.messages.clone()
    }

    pub async fn list_influencers(&self) -> Vec<Influencer> {
        self.store.lock().await.crm.influencers.clone()
    }

    pub async fn list_scraper_jobs(&self) -> Vec<ScraperJob> {
        self.store.lock().await.crm.scraper_jobs.clone()
    }

    pub async fn get_chat_history(&self, agent_id: &str) -> Vec<ChatMessage> {
        self.store.lock().await.chat_history(agent_id)
    }

    pub async fn get_onboarding(&self) -> OnboardingState {
        self.store.lock().await.onboarding.clone()
    }

    pub fn get_loading_state(&self) -> LoadingState {
        let mut state = LoadingState {
            errors: self.inflight.errors(),
            ..LoadingState::default()
        };
        for key in self.inflight.loading_keys() {
            if let Some(agent_id) = key.strip_prefix("chat:") {
                state.chats.push(agent_id.to_string());
            } else if key == brief_key(BriefKind::Morning) {
                state.briefs.push(BriefKind::Morning);
            } else if key == brief_key(BriefKind::Eod) {
                state.briefs.push(BriefKind::Eod);
            }
        }
        state
    }

    // ─── Synchronous commands ──────────────────────────────────────────────

    async fn mutate<F>(
        &self,
        namespace: Namespace,
        event_type: &str,
        payload: serde_json::Value,
        apply: F,
    ) -> AppResult<BooleanResponse>
    where
        F: FnOnce(&mut CampaignStore) -> bool,
    {
        let changed = {
            let mut store = self.store.lock().await;
            let changed = apply(&mut store);
            if changed {
                self.persist(&store, namespace)?;
            }
            changed
        };
        if changed {
            self.publish(event_type, payload);
        } else {
            tracing::debug!(event_type, "command left state unchanged");
        }
        Ok(BooleanResponse { success: changed })
    }

    pub async fn toggle_subtask(&self, deliverable_id: &str, subtask_id: &str) -> AppResult<BooleanResponse> {
        self.mutate(
            Namespace::Campaign,
            "deliverable.subtask_toggled",
            json!({ "deliverableId": deliverable_id, "subtaskId": subtask_id }),
            |store| store.toggle_subtask(deliverable_id, subtask_id),
        )
        .await
    }

    pub async fn set_deliverable_status(
        &self,
        deliverable_id: &str,
        status: DeliverableStatus,
    ) -> AppResult<BooleanResponse> {
        self.mutate(
            Namespace::Campaign,
            "deliverable.status_changed",
            json!({ "deliverableId": deliverable_id, "status": status }),
            |store| store.set_deliverable_status(deliverable_id, status),
        )
        .await
    }

    pub async fn mark_message_read(&self, message_id: &str) -> AppResult<BooleanResponse> {
        self.mutate(
            Namespace::Campaign,
            "message.read",
            json!({ "messageId": message_id }),
            |store| store.mark_message_read(message_id),
        )
        .await
    }

    pub async fn execute_action(&self, message_id: &str, action_id: &str) -> AppResult<BooleanResponse> {
        self.mutate(
            Namespace::Campaign,
            "message.action_executed",
            json!({ "messageId": message_id, "actionId": action_id }),
            |store| store.execute_action(message_id, action_id),
        )
        .await
    }

    pub async fn advance_influencer(&self, influencer_id: &str, stage: PipelineStage) -> AppResult<BooleanResponse> {
        self.mutate(
            Namespace::Crm,
            "influencer.stage_changed",
            json!({ "influencerId": influencer_id, "stage": stage }),
            |store| store.advance_influencer(influencer_id, stage),
        )
        .await
    }

    pub async fn set_scraper_paused(&self, job_id: &str, paused: bool) -> AppResult<BooleanResponse> {
        let now = Utc::now();
        self.mutate(
            Namespace::Crm,
            "scraper.paused_changed",
            json!({ "jobId": job_id, "paused": paused }),
            |store| store.set_scraper_paused(job_id, paused, now),
        )
        .await
    }

    pub async fn complete_onboarding(&self) -> AppResult<BooleanResponse> {
        let now = Utc::now();
        self.mutate(Namespace::Onboarding, "onboarding.completed", json!({}), |store| {
            store.complete_onboarding(now)
        })
        .await
    }

    pub async fn update_onboarding(&self, payload: UpdateOnboardingPayload) -> AppResult<OnboardingState> {
        let onboarding = {
            let mut store = self.store.lock().await;
            let onboarding = store.update_onboarding(payload);
            self.persist(&store, Namespace::Onboarding)?;
            onboarding
        };
        self.publish("onboarding.updated", json!({ "step": onboarding.step }));
        Ok(onboarding)
    }

    pub async fn log_outreach(&self, influencer_id: &str, channel: &str) -> AppResult<Option<OutreachAttempt>> {
        let channel = channel.trim();
        if channel.is_empty() {
            return Err(AppError::Invalid("Outreach channel is required".to_string()));
        }
        let attempt = {
            let mut store = self.store.lock().await;
            let attempt = store.log_outreach(influencer_id, channel, Utc::now());
            if attempt.is_some() {
                self.persist(&store, Namespace::Crm)?;
            }
            attempt
        };
        match &attempt {
            Some(attempt) => self.publish(
                "influencer.outreach_logged",
                json!({ "influencerId": influencer_id, "attempt": attempt }),
            ),
            None => tracing::debug!(influencer_id, "outreach not logged"),
        }
        Ok(attempt)
    }

    pub async fn trigger_orchestration(&self, agent_id: &str) -> AppResult<Option<AgentMessage>> {
        let message = {
            let mut store = self.store.lock().await;
            let message = store.trigger_orchestration(agent_id, Utc::now());
            if message.is_some() {
                self.persist(&store, Namespace::Campaign)?;
            }
            message
        };
        match &message {
            Some(message) => {
                tracing::info!(agent_id, "orchestration triggered");
                self.publish("message.created", json!({ "message": message }));
            }
            None => tracing::debug!(agent_id, "orchestration requested for unknown agent"),
        }
        Ok(message)
    }

    pub fn dismiss_error(&self, key: &str) -> BooleanResponse {
        let success = self.inflight.clear_error(key);
        if success {
            self.publish("error.dismissed", json!({ "key": key }));
        }
        BooleanResponse { success }
    }

    pub fn cancel_request(&self, key: &str) -> BooleanResponse {
        let success = self.inflight.cancel(key);
        if success {
            tracing::info!(key, "in-flight request canceled");
        }
        BooleanResponse { success }
    }

    // ─── Async provider commands ───────────────────────────────────────────

    async fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.read().await.provider_timeout_ms)
    }

    /// Sends one chat turn. Returns `Ok(None)` for an unknown agent and
    /// `Err(Busy)` while a reply for the same agent is still pending.
    pub async fn send_chat_message(&self, agent_id: &str, text: &str) -> AppResult<Option<ChatOutcome>> {
        let prompt = text.trim();
        self.provider.validate(prompt)?;

        let key = chat_key(agent_id);
        let guard = self.inflight.try_begin(&key)?;

        let (user_message, request) = {
            let mut store = self.store.lock().await;
            let Some(user_message) = store.append_chat(agent_id, ChatRole::User, prompt, Utc::now()) else {
                tracing::debug!(agent_id, "chat message for unknown agent ignored");
                return Ok(None);
            };
            if let Err(error) = self.persist(&store, Namespace::Campaign) {
                store.remove_chat(agent_id, &user_message.id);
                return Err(error);
            }
            let agent_name = store
                .campaign
                .agents
                .iter()
                .find(|agent| agent.id == agent_id)
                .map(|agent| agent.name.clone())
                .unwrap_or_else(|| agent_id.to_string());
            let request = ChatRequest {
                agent_id: agent_id.to_string(),
                agent_name,
                kind: AgentKind::from_id(agent_id),
                history: store.chat_history(agent_id),
                prompt: prompt.to_string(),
            };
            (user_message, request)
        };
        self.publish("chat.message", json!({ "agentId": agent_id, "message": user_message }));
        self.publish_loading(&key, true);

        let limit = self.provider_timeout().await;
        let result = match timeout(limit, self.provider.reply(request)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(error)) => Err(error.to_string()),
            Err(_) => Err(format!("Assistant did not respond within {} ms", limit.as_millis())),
        };

        let outcome = match result {
            Ok(_) if guard.is_canceled() => {
                tracing::info!(agent_id, "discarding reply for canceled chat request");
                ChatOutcome {
                    user_message,
                    assistant_message: None,
                    error: None,
                }
            }
            Ok(reply) => {
                let saved = {
                    let mut store = self.store.lock().await;
                    match store.append_chat(agent_id, ChatRole::Assistant, &reply, Utc::now()) {
                        Some(message) => match self.persist(&store, Namespace::Campaign) {
                            Ok(()) => Ok(Some(message)),
                            Err(error) => {
                                store.remove_chat(agent_id, &message.id);
                                Err(error.to_string())
                            }
                        },
                        None => Ok(None),
                    }
                };
                match saved {
                    Ok(assistant_message) => {
                        if let Some(message) = &assistant_message {
                            self.publish("chat.message", json!({ "agentId": agent_id, "message": message }));
                        }
                        ChatOutcome {
                            user_message,
                            assistant_message,
                            error: None,
                        }
                    }
                    Err(error) => {
                        tracing::warn!(agent_id, error = %error, "chat reply could not be saved");
                        self.inflight.record_error(&key, error.clone());
                        ChatOutcome {
                            user_message,
                            assistant_message: None,
                            error: Some(error),
                        }
                    }
                }
            }
            Err(error) => {
                tracing::warn!(agent_id, error = %error, "chat reply failed");
                self.inflight.record_error(&key, error.clone());
                ChatOutcome {
                    user_message,
                    assistant_message: None,
                    error: Some(error),
                }
            }
        };

        drop(guard);
        self.publish_loading(&key, false);
        Ok(Some(outcome))
    }

    /// Generates a morning or end-of-day brief and posts it to the feed.
    pub async fn generate_brief(&self, kind: BriefKind) -> AppResult<BriefOutcome> {
        let key = brief_key(kind);
        let guard = self.inflight.try_begin(&key)?;

        let request = {
            let dashboard = self.get_dashboard().await;
            let store = self.store.lock().await;
            BriefRequest {
                kind,
                campaign_name: store.campaign.campaign.name.clone(),
                stats: dashboard.stats,
                health_score: dashboard.health_score,
                pipeline: dashboard.pipeline,
                budget: dashboard.budget,
                unread_messages: dashboard.unread_messages,
                pending_actions: dashboard.pending_actions,
            }
        };
        self.publish_loading(&key, true);

        let limit = self.provider_timeout().await;
        let result = match timeout(limit, self.provider.brief(request)).await {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(error)) => Err(error.to_string()),
            Err(_) => Err(format!("Brief did not complete within {} ms", limit.as_millis())),
        };

        let outcome = match result {
            Ok(_) if guard.is_canceled() => {
                tracing::info!(kind = kind.as_str(), "discarding canceled brief");
                BriefOutcome {
                    message: None,
                    error: None,
                }
            }
            Ok(content) => {
                let message = brief_message(kind, content, Utc::now());
                let saved = {
                    let mut store = self.store.lock().await;
                    store.push_message(message.clone());
                    let saved = self.persist(&store, Namespace::Campaign);
                    if saved.is_err() {
                        store.remove_message(&message.id);
                    }
                    saved
                };
                match saved {
                    Ok(()) => {
                        tracing::info!(kind = kind.as_str(), "brief posted");
                        self.publish("message.created", json!({ "message": message }));
                        BriefOutcome {
                            message: Some(message),
                            error: None,
                        }
                    }
                    Err(error) => {
                        let error = error.to_string();
                        tracing::warn!(kind = kind.as_str(), error = %error, "brief could not be saved");
                        self.inflight.record_error(&key, error.clone());
                        BriefOutcome {
                            message: None,
                            error: Some(error),
                        }
                    }
                }
            }
            Err(error) => {
                tracing::warn!(kind = kind.as_str(), error = %error, "brief generation failed");
                self.inflight.record_error(&key, error.clone());
                BriefOutcome {
                    message: None,
                    error: Some(error),
                }
            }
        };

        drop(guard);
        self.publish_loading(&key, false);
        Ok(outcome)
    }

    // ─── Scrapers ──────────────────────────────────────────────────────────

    /// Runs one discovery pass. A job that is unknown, paused or already
    /// running is left alone and reported with no additions.
    pub async fn run_scraper(&self, job_id: &str) -> AppResult<RunScraperResponse> {
        let started = {
            let mut store = self.store.lock().await;
            match store.begin_scrape(job_id) {
                Some(job) => {
                    if let Err(error) = self.persist(&store, Namespace::Crm) {
                        store.fail_scrape(job_id, Utc::now());
                        return Err(error);
                    }
                    job
                }
                None => {
                    tracing::debug!(job_id, "scrape not started");
                    return Ok(RunScraperResponse {
                        job: store.scraper_job(job_id).cloned(),
                        added: Vec::new(),
                    });
                }
            }
        };
        tracing::info!(job_id, target = %started.target, "scrape started");
        self.publish("scraper.started", json!({ "jobId": job_id }));

        let latency = Duration::from_millis(self.settings.read().await.scraper_latency_ms);
        tokio::time::sleep(latency).await;

        let completed = {
            let mut store = self.store.lock().await;
            let now = Utc::now();
            let discovery = {
                let mut rng = rand::rng();
                simulate_discovery(&started, &store.existing_handles(), now, &mut rng)
            };
            let completed = store.complete_scrape(job_id, discovery, now);
            if completed.is_none() {
                store.fail_scrape(job_id, now);
            }
            self.persist(&store, Namespace::Crm)?;
            completed
        };

        match completed {
            Some((job, added)) => {
                tracing::info!(job_id, added = added.len(), status = job.status.as_str(), "scrape finished");
                self.publish(
                    "scraper.completed",
                    json!({ "jobId": job_id, "added": added.len(), "status": job.status }),
                );
                Ok(RunScraperResponse { job: Some(job), added })
            }
            None => {
                tracing::warn!(job_id, "scrape could not be completed");
                let job = self.store.lock().await.scraper_job(job_id).cloned();
                self.publish("scraper.failed", json!({ "jobId": job_id }));
                Ok(RunScraperResponse { job, added: Vec::new() })
            }
        }
    }

    async fn execute_scheduled_scrape(&self, job_id: String) -> bool {
        match self.run_scraper(&job_id).await {
            Ok(response) => response
                .job
                .map_or(true, |job| job.status == ScraperStatus::Failed),
            Err(error) => {
                tracing::warn!(job_id = %job_id, error = %error, "scheduled scrape errored");
                true
            }
        }
    }

    /// Queues every recurring job whose next run has passed.
    pub async fn run_due_scrapers(&self) -> AppResult<usize> {
        let due = {
            let store = self.store.lock().await;
            due_jobs(&store.crm.scraper_jobs, Utc::now())
        };
        let mut queued = 0;
        for scrape in due {
            self.scheduler.enqueue(scrape).await.map_err(AppError::Busy)?;
            queued += 1;
        }
        Ok(queued)
    }

    pub fn start_scheduler(&self) {
        self.scheduler.start();
    }

    /// Starts the scheduler and a ticker that queues due recurring scrapes.
    pub fn start_background(self: &Arc<Self>) {
        self.start_scheduler();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let Some(center) = weak.upgrade() else {
                    break;
                };
                let tick = Duration::from_secs(center.settings.read().await.scraper_tick_seconds);
                if center.is_hydrated() {
                    if let Err(error) = center.run_due_scrapers().await {
                        tracing::warn!(error = %error, "failed to queue due scrapes");
                    }
                }
                drop(center);
                tokio::time::sleep(tick).await;
            }
        });
    }
}

fn brief_message(kind: BriefKind, content: String, now: DateTime<Utc>) -> AgentMessage {
    let title = match kind {
        BriefKind::Morning => "Morning brief",
        BriefKind::Eod => "End-of-day brief",
    };
    AgentMessage {
        id: Uuid::new_v4().to_string(),
        agent_id: AgentKind::Strategy.as_str().to_string(),
        r#type: MessageType::Status,
        title: title.to_string(),
        content,
        timestamp: now,
        read: false,
        actions: Vec::new(),
        action_required: false,
    }
}

#[cfg(test)]
mod tests {
    use super::CommandCenter;
    use crate::db::{Database, CAMPAIGN_KEY, CRM_KEY};
    use crate::errors::AppError;
    use crate::models::{BriefKind, ChatRole, ScraperStatus, StoreEvent};
    use crate::provider::SimulatedProvider;
    use crate::seed;
    use chrono::Utc;
    use std::sync::Arc;
    use tokio::sync::broadcast;
    use tokio::time::Duration;

    async fn wait_until_loading(center: &CommandCenter, key: &str) {
        for _ in 0..100 {
            if center.inflight.is_loading(key) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("request {} never started", key);
    }

    async fn wait_for_loading_event(events: &mut broadcast::Receiver<StoreEvent>, key: &str) {
        let started = async {
            loop {
                let event = events.recv().await.expect("event");
                let loading = event.payload["loading"].as_bool() == Some(true);
                if event.r#type == "loading.changed" && event.payload["key"] == key && loading {
                    return;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(2), started)
            .await
            .expect("loading event");
    }

    fn last_loading_flag(events: &mut broadcast::Receiver<StoreEvent>, key: &str) -> Option<bool> {
        let mut last = None;
        while let Ok(event) = events.try_recv() {
            if event.r#type == "loading.changed" && event.payload["key"] == key {
                last = event.payload["loading"].as_bool();
            }
        }
        last
    }

    async fn center_with(provider: SimulatedProvider) -> (tempfile::TempDir, Arc<CommandCenter>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let center = CommandCenter::with_provider(dir.path().to_path_buf(), Arc::new(provider)).expect("center");
        center.hydrate().await.expect("hydrate");
        (dir, center)
    }

    fn fast_provider() -> SimulatedProvider {
        SimulatedProvider::new(Duration::from_millis(5), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn hydrate_marks_store_ready_and_publishes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let center =
            CommandCenter::with_provider(dir.path().to_path_buf(), Arc::new(fast_provider())).expect("center");
        let mut events = center.subscribe();
        assert!(!center.is_hydrated());
        center.hydrate().await.expect("hydrate");
        assert!(center.is_hydrated());
        let event = events.recv().await.expect("event");
        assert_eq!(event.r#type, "store.hydrated");
    }

    #[tokio::test]
    async fn malformed_persisted_campaign_falls_back_to_seed() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let db = Database::new(&dir.path().join("state.sqlite")).expect("db");
            db.write_raw_state(CAMPAIGN_KEY, crate::db::STATE_VERSION, "{\"campaign\": 42}")
                .expect("write");
        }
        let center =
            CommandCenter::with_provider(dir.path().to_path_buf(), Arc::new(fast_provider())).expect("center");
        center.hydrate().await.expect("hydrate");
        assert_eq!(center.list_deliverables(None).await.len(), 10);
    }

    #[tokio::test]
    async fn mutations_survive_a_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let center =
                CommandCenter::with_provider(dir.path().to_path_buf(), Arc::new(fast_provider())).expect("center");
            center.hydrate().await.expect("hydrate");
            let response = center.mark_message_read("msg-legal-review").await.expect("read");
            assert!(response.success);
        }
        let center =
            CommandCenter::with_provider(dir.path().to_path_buf(), Arc::new(fast_provider())).expect("center");
        center.hydrate().await.expect("hydrate");
        let message = center
            .list_messages()
            .await
            .into_iter()
            .find(|message| message.id == "msg-legal-review")
            .expect("message");
        assert!(message.read);
    }

    #[tokio::test]
    async fn unknown_ids_are_silent_no_ops() {
        let (_dir, center) = center_with(fast_provider()).await;
        assert!(!center.toggle_subtask("missing", "missing").await.expect("toggle").success);
        assert!(!center.mark_message_read("missing").await.expect("read").success);
        assert!(center.trigger_orchestration("missing").await.expect("trigger").is_none());
        assert!(center.send_chat_message("missing", "hi").await.expect("chat").is_none());
        assert!(center.get_loading_state().chats.is_empty());
    }

    #[tokio::test]
    async fn chat_round_trip_appends_both_turns() {
        let (_dir, center) = center_with(fast_provider()).await;
        let outcome = center
            .send_chat_message("content", "What's the status?")
            .await
            .expect("chat")
            .expect("known agent");
        assert!(outcome.assistant_message.is_some());
        let history = center.get_chat_history("content").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[1].role, ChatRole::Assistant);
        assert!(center.get_loading_state().chats.is_empty());
    }

    #[tokio::test]
    async fn second_chat_for_same_agent_is_rejected_while_pending() {
        let provider = SimulatedProvider::new(Duration::from_millis(200), Duration::from_millis(5));
        let (_dir, center) = center_with(provider).await;

        let first = {
            let center = center.clone();
            tokio::spawn(async move { center.send_chat_message("social", "first").await })
        };
        for _ in 0..50 {
            if !center.get_loading_state().chats.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(center.get_loading_state().chats, vec!["social".to_string()]);
        assert!(matches!(
            center.send_chat_message("social", "second").await,
            Err(AppError::Busy(_))
        ));

        first.await.expect("join").expect("chat").expect("known agent");
        let history = center.get_chat_history("social").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "first");
    }

    #[tokio::test]
    async fn provider_failure_records_error_and_appends_nothing() {
        let provider = fast_provider();
        provider.set_failing(true);
        let (_dir, center) = center_with(provider).await;

        let outcome = center
            .send_chat_message("analytics", "status?")
            .await
            .expect("chat")
            .expect("known agent");
        assert!(outcome.assistant_message.is_none());
        assert!(outcome.error.is_some());
        assert_eq!(center.get_chat_history("analytics").await.len(), 1);

        let loading = center.get_loading_state();
        assert!(loading.chats.is_empty());
        assert!(loading.errors.contains_key("chat:analytics"));
        assert!(center.dismiss_error("chat:analytics").success);
        assert!(center.get_loading_state().errors.is_empty());
    }

    #[tokio::test]
    async fn brief_is_posted_to_the_feed() {
        let (_dir, center) = center_with(fast_provider()).await;
        let before = center.list_messages().await.len();
        let outcome = center.generate_brief(BriefKind::Morning).await.expect("brief");
        let message = outcome.message.expect("message");
        assert!(message.content.contains("health score"));
        let messages = center.list_messages().await;
        assert_eq!(messages.len(), before + 1);
        assert_eq!(messages[0].id, message.id);
    }

    #[tokio::test]
    async fn scraper_run_updates_job_and_pipeline() {
        let (_dir, center) = center_with(fast_provider()).await;
        center
            .update_settings(serde_json::json!({ "scraperLatencyMs": 1 }))
            .await
            .expect("settings");
        let before = center.list_influencers().await.len();

        let response = center.run_scraper("job-hashtag-holidayhome").await.expect("scrape");
        let job = response.job.expect("job");
        assert_eq!(job.status, ScraperStatus::Queued);
        assert!(job.next_run_at.is_some());
        assert!(response.added.len() <= 15);
        assert_eq!(center.list_influencers().await.len(), before + response.added.len());

        let paused = center.run_scraper("job-keyword-tablescape").await.expect("paused");
        assert!(paused.added.is_empty());
        assert_eq!(paused.job.expect("job").status, ScraperStatus::Paused);
    }

    #[tokio::test]
    async fn scrape_interrupted_by_restart_is_released_on_hydrate() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let db = Database::new(&dir.path().join("state.sqlite")).expect("db");
            let mut crm = seed::crm_state(Utc::now());
            for job in crm.scraper_jobs.iter_mut() {
                if job.id == "job-hashtag-holidayhome" || job.id == "job-competitor-homegoods" {
                    job.status = ScraperStatus::Running;
                }
            }
            db.save_state(CRM_KEY, &crm).expect("save");
        }

        let center =
            CommandCenter::with_provider(dir.path().to_path_buf(), Arc::new(fast_provider())).expect("center");
        center
            .update_settings(serde_json::json!({ "scraperLatencyMs": 1 }))
            .await
            .expect("settings");
        center.hydrate().await.expect("hydrate");

        let jobs = center.list_scraper_jobs().await;
        let status = |id: &str| jobs.iter().find(|job| job.id == id).map(|job| job.status);
        assert_eq!(status("job-hashtag-holidayhome"), Some(ScraperStatus::Queued));
        assert_eq!(status("job-competitor-homegoods"), Some(ScraperStatus::Failed));

        let response = center.run_scraper("job-hashtag-holidayhome").await.expect("scrape");
        assert_eq!(response.job.expect("job").status, ScraperStatus::Queued);
        assert!(center.set_scraper_paused("job-hashtag-holidayhome", true).await.expect("pause").success);
        assert!(center.set_scraper_paused("job-hashtag-holidayhome", false).await.expect("resume").success);
    }

    #[tokio::test]
    async fn scrape_that_cannot_be_saved_does_not_stay_running() {
        let (_dir, center) = center_with(fast_provider()).await;
        center.db.execute_raw("DROP TABLE kv_state").expect("drop");

        assert!(center.run_scraper("job-hashtag-holidayhome").await.is_err());
        let job = center
            .list_scraper_jobs()
            .await
            .into_iter()
            .find(|job| job.id == "job-hashtag-holidayhome")
            .expect("job");
        assert_eq!(job.status, ScraperStatus::Failed);
    }

    #[tokio::test]
    async fn unsaved_user_turn_is_rolled_back() {
        let (_dir, center) = center_with(fast_provider()).await;
        center.db.execute_raw("DROP TABLE kv_state").expect("drop");

        assert!(matches!(
            center.send_chat_message("content", "hello").await,
            Err(AppError::Internal(_))
        ));
        assert!(center.get_chat_history("content").await.is_empty());
        assert!(center.get_loading_state().chats.is_empty());
    }

    #[tokio::test]
    async fn unsaved_reply_clears_loading_and_is_rolled_back() {
        let provider = SimulatedProvider::new(Duration::from_millis(150), Duration::from_millis(5));
        let (_dir, center) = center_with(provider).await;
        let mut events = center.subscribe();

        let pending = {
            let center = center.clone();
            tokio::spawn(async move { center.send_chat_message("content", "status?").await })
        };
        wait_for_loading_event(&mut events, "chat:content").await;
        center.db.execute_raw("DROP TABLE kv_state").expect("drop");

        let outcome = pending.await.expect("join").expect("chat").expect("known agent");
        assert!(outcome.assistant_message.is_none());
        assert!(outcome.error.is_some());
        assert_eq!(center.get_chat_history("content").await.len(), 1);
        assert_eq!(last_loading_flag(&mut events, "chat:content"), Some(false));
        assert!(center.get_loading_state().errors.contains_key("chat:content"));
    }

    #[tokio::test]
    async fn unsaved_brief_is_not_left_in_the_feed() {
        let provider = SimulatedProvider::new(Duration::from_millis(5), Duration::from_millis(150));
        let (_dir, center) = center_with(provider).await;
        let before = center.list_messages().await.len();
        let mut events = center.subscribe();

        let pending = {
            let center = center.clone();
            tokio::spawn(async move { center.generate_brief(BriefKind::Eod).await })
        };
        wait_for_loading_event(&mut events, "brief:eod").await;
        center.db.execute_raw("DROP TABLE kv_state").expect("drop");

        let outcome = pending.await.expect("join").expect("brief");
        assert!(outcome.message.is_none());
        assert!(outcome.error.is_some());
        assert_eq!(center.list_messages().await.len(), before);
        assert_eq!(last_loading_flag(&mut events, "brief:eod"), Some(false));
    }

    #[tokio::test]
    async fn failed_brief_records_error_and_posts_nothing() {
        let provider = fast_provider();
        provider.set_failing(true);
        let (_dir, center) = center_with(provider).await;
        let before = center.list_messages().await.len();
        let mut events = center.subscribe();

        let outcome = center.generate_brief(BriefKind::Morning).await.expect("brief");
        assert!(outcome.message.is_none());
        assert!(outcome.error.is_some());
        assert_eq!(center.list_messages().await.len(), before);

        let loading = center.get_loading_state();
        assert!(loading.briefs.is_empty());
        assert!(loading.errors.contains_key("brief:morning"));
        assert_eq!(last_loading_flag(&mut events, "brief:morning"), Some(false));
    }

    #[tokio::test]
    async fn second_brief_of_same_kind_is_rejected_while_pending() {
        let provider = SimulatedProvider::new(Duration::from_millis(5), Duration::from_millis(150));
        let (_dir, center) = center_with(provider).await;

        let first = {
            let center = center.clone();
            tokio::spawn(async move { center.generate_brief(BriefKind::Morning).await })
        };
        wait_until_loading(&center, "brief:morning").await;
        assert_eq!(center.get_loading_state().briefs, vec![BriefKind::Morning]);
        assert!(matches!(
            center.generate_brief(BriefKind::Morning).await,
            Err(AppError::Busy(_))
        ));
        assert!(center.generate_brief(BriefKind::Eod).await.expect("eod").message.is_some());

        assert!(first.await.expect("join").expect("brief").message.is_some());
        assert!(center.get_loading_state().briefs.is_empty());
    }

    #[tokio::test]
    async fn canceled_chat_discards_the_reply() {
        let provider = SimulatedProvider::new(Duration::from_millis(150), Duration::from_millis(5));
        let (_dir, center) = center_with(provider).await;

        let pending = {
            let center = center.clone();
            tokio::spawn(async move { center.send_chat_message("social", "draft a post").await })
        };
        wait_until_loading(&center, "chat:social").await;
        assert!(center.cancel_request("chat:social").success);

        let outcome = pending.await.expect("join").expect("chat").expect("known agent");
        assert!(outcome.assistant_message.is_none());
        assert!(outcome.error.is_none());
        assert_eq!(center.get_chat_history("social").await.len(), 1);
        assert!(center.get_loading_state().chats.is_empty());
        assert!(!center.cancel_request("chat:social").success);
    }

    #[tokio::test]
    async fn canceled_brief_is_not_posted() {
        let provider = SimulatedProvider::new(Duration::from_millis(5), Duration::from_millis(150));
        let (_dir, center) = center_with(provider).await;
        let before = center.list_messages().await.len();

        let pending = {
            let center = center.clone();
            tokio::spawn(async move { center.generate_brief(BriefKind::Eod).await })
        };
        wait_until_loading(&center, "brief:eod").await;
        assert!(center.cancel_request("brief:eod").success);

        let outcome = pending.await.expect("join").expect("brief");
        assert!(outcome.message.is_none());
        assert!(outcome.error.is_none());
        assert_eq!(center.list_messages().await.len(), before);
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let (_dir, center) = center_with(fast_provider()).await;
        center
            .update_settings(serde_json::json!({
                "providerTimeoutMs": 20,
                "chatLatencyMs": 400,
                "briefLatencyMs": 400
            }))
            .await
            .expect("settings");
        let before = center.list_messages().await.len();

        let chat = center
            .send_chat_message("analytics", "status?")
            .await
            .expect("chat")
            .expect("known agent");
        assert!(chat.assistant_message.is_none());
        assert!(chat.error.expect("error").contains("did not respond"));
        assert_eq!(center.get_chat_history("analytics").await.len(), 1);

        let brief = center.generate_brief(BriefKind::Morning).await.expect("brief");
        assert!(brief.message.is_none());
        assert!(brief.error.expect("error").contains("did not complete"));
        assert_eq!(center.list_messages().await.len(), before);

        let loading = center.get_loading_state();
        assert!(loading.chats.is_empty());
        assert!(loading.briefs.is_empty());
        assert!(loading.errors.contains_key("chat:analytics"));
        assert!(loading.errors.contains_key("brief:morning"));
    }
}
