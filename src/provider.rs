use crate::errors::{AppError, AppResult};
use crate::metrics::{BudgetPacing, DeliverableStats, PacingStatus, PipelineStats};
use crate::models::{AgentKind, AppSettings, BriefKind, ChatMessage, ChatRole};
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Duration;

pub type ProviderFuture = Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send>>;

const MAX_PROMPT_CHARS: usize = 4_000;

static BUDGET_INTENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(budget|spend|spent|cost|roas|cpa)\b").expect("valid budget regex"));
static DEADLINE_INTENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(deadline|due|late|overdue|timeline|when)\b").expect("valid deadline regex"));
static BLOCKER_INTENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(block(ed|er|ing)?|stuck|risk|issue)\b").expect("valid blocker regex"));
static STATUS_INTENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(status|progress|update|how are)\b").expect("valid status regex"));

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub agent_id: String,
    pub agent_name: String,
    pub kind: Option<AgentKind>,
    pub history: Vec<ChatMessage>,
    pub prompt: String,
}

#[derive(Debug, Clone)]
pub struct BriefRequest {
    pub kind: BriefKind,
    pub campaign_name: String,
    pub stats: DeliverableStats,
    pub health_score: u8,
    pub pipeline: PipelineStats,
    pub budget: BudgetPacing,
    pub unread_messages: usize,
    pub pending_actions: usize,
}

/// Source of assistant chat replies and feed briefs.
pub trait AssistantProvider: Send + Sync {
    fn validate(&self, prompt: &str) -> AppResult<()> {
        if prompt.trim().is_empty() {
            return Err(AppError::Invalid("Message cannot be empty".to_string()));
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(AppError::Invalid(format!(
                "Message exceeds {} characters",
                MAX_PROMPT_CHARS
            )));
        }
        Ok(())
    }
    fn apply_settings(&self, _settings: &AppSettings) {}
    fn reply(&self, request: ChatRequest) -> ProviderFuture;
    fn brief(&self, request: BriefRequest) -> ProviderFuture;
}

/// Local stand-in for a model backend: waits a configurable latency, then
/// answers from the request context.
#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    chat_latency_ms: Arc<AtomicU64>,
    brief_latency_ms: Arc<AtomicU64>,
    failing: Arc<AtomicBool>,
}

impl SimulatedProvider {
    pub fn new(chat_latency: Duration, brief_latency: Duration) -> Self {
        Self {
            chat_latency_ms: Arc::new(AtomicU64::new(chat_latency.as_millis() as u64)),
            brief_latency_ms: Arc::new(AtomicU64::new(brief_latency.as_millis() as u64)),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.chat_latency_ms),
            Duration::from_millis(settings.brief_latency_ms),
        )
    }

    /// Makes subsequent calls fail, as a provider outage would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl AssistantProvider for SimulatedProvider {
    fn apply_settings(&self, settings: &AppSettings) {
        self.chat_latency_ms.store(settings.chat_latency_ms, Ordering::SeqCst);
        self.brief_latency_ms.store(settings.brief_latency_ms, Ordering::SeqCst);
    }

    fn reply(&self, request: ChatRequest) -> ProviderFuture {
        let latency = Duration::from_millis(self.chat_latency_ms.load(Ordering::SeqCst));
        let failing = self.failing.clone();
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            if failing.load(Ordering::SeqCst) {
                anyhow::bail!("assistant provider unavailable");
            }
            Ok(compose_reply(&request))
        })
    }

    fn brief(&self, request: BriefRequest) -> ProviderFuture {
        let latency = Duration::from_millis(self.brief_latency_ms.load(Ordering::SeqCst));
        let failing = self.failing.clone();
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            if failing.load(Ordering::SeqCst) {
                anyhow::bail!("brief generation unavailable");
            }
            Ok(compose_brief(&request))
        })
    }
}

fn specialty(kind: Option<AgentKind>) -> &'static str {
    kind.map(|kind| kind.display().description)
        .unwrap_or("campaign coordination")
}

pub fn compose_reply(request: &ChatRequest) -> String {
    let prompt = request.prompt.trim();
    let turns = request
        .history
        .iter()
        .filter(|message| message.role == ChatRole::User)
        .count();
    let opener = if turns <= 1 {
        format!("{} here.", request.agent_name)
    } else {
        "Following up on our thread.".to_string()
    };

    let body = if BUDGET_INTENT.is_match(prompt) {
        "Spend is tracking against the flighting plan; I'll flag any line that crosses its allocation before the next pacing review."
    } else if BLOCKER_INTENT.is_match(prompt) {
        "The open blocker is upstream approval. I've queued an escalation and will re-sequence dependent work if it isn't cleared by end of day."
    } else if DEADLINE_INTENT.is_match(prompt) {
        "Current deliverables are on the timeline view; anything past its due date is surfaced as overdue on the board."
    } else if STATUS_INTENT.is_match(prompt) {
        "Work is in flight and the latest progress is reflected on my card. I'll post a status note when the next subtask closes."
    } else {
        "Noted. I'll fold that into the next task I pick up."
    };

    format!("{} Focus: {}. {}", opener, specialty(request.kind), body)
}

pub fn compose_brief(request: &BriefRequest) -> String {
    let heading = match request.kind {
        BriefKind::Morning => "Good morning.",
        BriefKind::Eod => "End of day wrap-up.",
    };
    let pacing = match request.budget.pacing {
        PacingStatus::UnderPacing => "under-pacing",
        PacingStatus::OnTrack => "on track",
        PacingStatus::OverPacing => "over-pacing",
        PacingStatus::OverBudget => "over budget",
    };
    let overspent = request
        .budget
        .per_agent
        .iter()
        .filter(|line| line.over_budget)
        .map(|line| line.agent_name.as_str())
        .collect::<Vec<_>>();

    let mut lines = vec![
        format!("{} {} health score is {}/100.", heading, request.campaign_name, request.health_score),
        format!(
            "Deliverables: {} of {} complete ({}%), {} blocked, {} overdue.",
            request.stats.completed,
            request.stats.total_deliverables,
            request.stats.completion_rate,
            request.stats.blocked,
            request.stats.overdue
        ),
        format!(
            "Budget: {}% spent, {}% committed, pacing {}.",
            request.budget.spent_pct, request.budget.committed_pct, pacing
        ),
        format!(
            "Creators: {} in pipeline, {}% response rate, {}% converted.",
            request.pipeline.total, request.pipeline.response_rate, request.pipeline.conversion_rate
        ),
    ];
    if !overspent.is_empty() {
        lines.push(format!("Over allocation: {}.", overspent.join(", ")));
    }
    if request.pending_actions > 0 {
        lines.push(format!(
            "{} item(s) need your decision; {} unread update(s).",
            request.pending_actions, request.unread_messages
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{compose_reply, AssistantProvider, ChatRequest, SimulatedProvider};
    use crate::models::AgentKind;
    use tokio::time::Duration;

    fn request(prompt: &str) -> ChatRequest {
        ChatRequest {
            agent_id: "paid-media".to_string(),
            agent_name: "Paid Media Agent".to_string(),
            kind: Some(AgentKind::PaidMedia),
            history: Vec::new(),
            prompt: prompt.to_string(),
        }
    }

    #[test]
    fn validate_rejects_blank_prompts() {
        let provider = SimulatedProvider::new(Duration::from_millis(0), Duration::from_millis(0));
        assert!(provider.validate("   ").is_err());
        assert!(provider.validate(&"x".repeat(5_000)).is_err());
        assert!(provider.validate("what's our spend?").is_ok());
    }

    #[test]
    fn replies_follow_detected_intent() {
        assert!(compose_reply(&request("How is the budget looking?")).contains("allocation"));
        assert!(compose_reply(&request("anything blocked?")).contains("blocker"));
        assert!(compose_reply(&request("hello")).starts_with("Paid Media Agent here."));
    }

    #[tokio::test]
    async fn failing_provider_returns_error() {
        let provider = SimulatedProvider::new(Duration::from_millis(1), Duration::from_millis(1));
        assert!(provider.reply(request("status?")).await.is_ok());
        provider.set_failing(true);
        assert!(provider.reply(request("status?")).await.is_err());
    }
}
