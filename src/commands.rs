use crate::center::CommandCenter;
use crate::metrics::{BudgetPacing, Dashboard, PipelineStats};
use crate::models::{
    AgentMessage, AgentStatusView, AppSettings, BooleanResponse, BriefKind, BriefOutcome, CampaignSummary,
    ChatMessage, ChatOutcome, DeliverableStatus, DeliverableView, Influencer, LoadingState, OnboardingState,
    OutreachAttempt, PipelineStage, RunScraperResponse, ScraperJob, TimelineEvent, UpdateOnboardingPayload,
};
use std::sync::Arc;
use tauri::{AppHandle, Emitter};

#[derive(Clone)]
pub struct AppState {
    pub center: Arc<CommandCenter>,
}

pub fn to_client_error(error: impl std::fmt::Display) -> String {
    error.to_string()
}

/// Relays store events to the webview until the center is dropped.
pub async fn forward_store_events(center: Arc<CommandCenter>, handle: AppHandle) {
    let mut events = center.subscribe();
    drop(center);
    loop {
        match events.recv().await {
            Ok(event) => {
                let _ = handle.emit("store_event", event);
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "store event forwarder lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

// ─── Routes ─────────────────────────────────────────────────────────────────

#[tauri::command]
pub async fn trigger_orchestration(
    state: tauri::State<'_, AppState>,
    agent_id: String,
) -> Result<Option<AgentMessage>, String> {
    state.center.trigger_orchestration(&agent_id).await.map_err(to_client_error)
}

#[tauri::command]
pub async fn get_agent_status(
    state: tauri::State<'_, AppState>,
    agent_id: Option<String>,
) -> Result<Vec<AgentStatusView>, String> {
    Ok(state.center.get_agent_status(agent_id.as_deref()).await)
}

#[tauri::command]
pub async fn list_campaigns(state: tauri::State<'_, AppState>) -> Result<Vec<CampaignSummary>, String> {
    Ok(state.center.list_campaigns().await)
}

#[tauri::command]
pub async fn list_deliverables(
    state: tauri::State<'_, AppState>,
    agent_id: Option<String>,
) -> Result<Vec<DeliverableView>, String> {
    Ok(state.center.list_deliverables(agent_id.as_deref()).await)
}

#[tauri::command]
pub async fn list_timeline(state: tauri::State<'_, AppState>) -> Result<Vec<TimelineEvent>, String> {
    Ok(state.center.list_timeline().await)
}

// ─── Selectors ──────────────────────────────────────────────────────────────

#[tauri::command]
pub fn is_hydrated(state: tauri::State<'_, AppState>) -> bool {
    state.center.is_hydrated()
}

#[tauri::command]
pub async fn get_dashboard(state: tauri::State<'_, AppState>) -> Result<Dashboard, String> {
    Ok(state.center.get_dashboard().await)
}

#[tauri::command]
pub async fn get_pipeline_stats(state: tauri::State<'_, AppState>) -> Result<PipelineStats, String> {
    Ok(state.center.get_pipeline_stats().await)
}

#[tauri::command]
pub async fn get_budget_pacing(state: tauri::State<'_, AppState>) -> Result<BudgetPacing, String> {
    Ok(state.center.get_budget_pacing().await)
}

#[tauri::command]
pub async fn list_messages(state: tauri::State<'_, AppState>) -> Result<Vec<AgentMessage>, String> {
    Ok(state.center.list_messages().await)
}

#[tauri::command]
pub async fn list_influencers(state: tauri::State<'_, AppState>) -> Result<Vec<Influencer>, String> {
    Ok(state.center.list_influencers().await)
}

#[tauri::command]
pub async fn list_scraper_jobs(state: tauri::State<'_, AppState>) -> Result<Vec<ScraperJob>, String> {
    Ok(state.center.list_scraper_jobs().await)
}

#[tauri::command]
pub async fn get_chat_history(
    state: tauri::State<'_, AppState>,
    agent_id: String,
) -> Result<Vec<ChatMessage>, String> {
    Ok(state.center.get_chat_history(&agent_id).await)
}

#[tauri::command]
pub fn get_loading_state(state: tauri::State<'_, AppState>) -> LoadingState {
    state.center.get_loading_state()
}

#[tauri::command]
pub async fn get_onboarding(state: tauri::State<'_, AppState>) -> Result<OnboardingState, String> {
    Ok(state.center.get_onboarding().await)
}

#[tauri::command]
pub fn get_settings(state: tauri::State<'_, AppState>) -> Result<AppSettings, String> {
    state.center.get_settings().map_err(to_client_error)
}

#[tauri::command]
pub async fn update_settings(
    state: tauri::State<'_, AppState>,
    settings: serde_json::Value,
) -> Result<AppSettings, String> {
    state.center.update_settings(settings).await.map_err(to_client_error)
}

// ─── Store operations ───────────────────────────────────────────────────────

#[tauri::command]
pub async fn toggle_subtask(
    state: tauri::State<'_, AppState>,
    deliverable_id: String,
    subtask_id: String,
) -> Result<BooleanResponse, String> {
    state
        .center
        .toggle_subtask(&deliverable_id, &subtask_id)
        .await
        .map_err(to_client_error)
}

#[tauri::command]
pub async fn set_deliverable_status(
    state: tauri::State<'_, AppState>,
    deliverable_id: String,
    status: DeliverableStatus,
) -> Result<BooleanResponse, String> {
    state
        .center
        .set_deliverable_status(&deliverable_id, status)
        .await
        .map_err(to_client_error)
}

#[tauri::command]
pub async fn mark_message_read(
    state: tauri::State<'_, AppState>,
    message_id: String,
) -> Result<BooleanResponse, String> {
    state.center.mark_message_read(&message_id).await.map_err(to_client_error)
}

#[tauri::command]
pub async fn execute_action(
    state: tauri::State<'_, AppState>,
    message_id: String,
    action_id: String,
) -> Result<BooleanResponse, String> {
    state
        .center
        .execute_action(&message_id, &action_id)
        .await
        .map_err(to_client_error)
}

#[tauri::command]
pub async fn send_chat_message(
    state: tauri::State<'_, AppState>,
    agent_id: String,
    text: String,
) -> Result<Option<ChatOutcome>, String> {
    state
        .center
        .send_chat_message(&agent_id, &text)
        .await
        .map_err(to_client_error)
}

#[tauri::command]
pub async fn generate_brief(state: tauri::State<'_, AppState>, kind: BriefKind) -> Result<BriefOutcome, String> {
    state.center.generate_brief(kind).await.map_err(to_client_error)
}

#[tauri::command]
pub fn cancel_request(state: tauri::State<'_, AppState>, key: String) -> BooleanResponse {
    state.center.cancel_request(&key)
}

#[tauri::command]
pub fn dismiss_error(state: tauri::State<'_, AppState>, key: String) -> BooleanResponse {
    state.center.dismiss_error(&key)
}

#[tauri::command]
pub async fn run_scraper(state: tauri::State<'_, AppState>, job_id: String) -> Result<RunScraperResponse, String> {
    state.center.run_scraper(&job_id).await.map_err(to_client_error)
}

#[tauri::command]
pub async fn set_scraper_paused(
    state: tauri::State<'_, AppState>,
    job_id: String,
    paused: bool,
) -> Result<BooleanResponse, String> {
    state
        .center
        .set_scraper_paused(&job_id, paused)
        .await
        .map_err(to_client_error)
}

#[tauri::command]
pub async fn advance_influencer(
    state: tauri::State<'_, AppState>,
    influencer_id: String,
    stage: PipelineStage,
) -> Result<BooleanResponse, String> {
    state
        .center
        .advance_influencer(&influencer_id, stage)
        .await
        .map_err(to_client_error)
}

#[tauri::command]
pub async fn log_outreach(
    state: tauri::State<'_, AppState>,
    influencer_id: String,
    channel: String,
) -> Result<Option<OutreachAttempt>, String> {
    state
        .center
        .log_outreach(&influencer_id, &channel)
        .await
        .map_err(to_client_error)
}

#[tauri::command]
pub async fn update_onboarding(
    state: tauri::State<'_, AppState>,
    payload: UpdateOnboardingPayload,
) -> Result<OnboardingState, String> {
    state.center.update_onboarding(payload).await.map_err(to_client_error)
}

#[tauri::command]
pub async fn complete_onboarding(state: tauri::State<'_, AppState>) -> Result<BooleanResponse, String> {
    state.center.complete_onboarding().await.map_err(to_client_error)
}
