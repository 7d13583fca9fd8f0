use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::policy::HealthPolicy;

// ─── Agents ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    Strategy,
    Content,
    Social,
    Influencer,
    RetailPartner,
    PaidMedia,
    Analytics,
}

/// Static display metadata for an agent card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDisplay {
    pub name: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
}

impl AgentKind {
    pub const ALL: [AgentKind; 7] = [
        Self::Strategy,
        Self::Content,
        Self::Social,
        Self::Influencer,
        Self::RetailPartner,
        Self::PaidMedia,
        Self::Analytics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strategy => "strategy",
            Self::Content => "content",
            Self::Social => "social",
            Self::Influencer => "influencer",
            Self::RetailPartner => "retail-partner",
            Self::PaidMedia => "paid-media",
            Self::Analytics => "analytics",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == id)
    }

    pub fn display(self) -> AgentDisplay {
        match self {
            Self::Strategy => AgentDisplay {
                name: "Strategy Agent",
                color: "#6366f1",
                icon: "compass",
                description: "Positioning, messaging pillars and launch sequencing",
            },
            Self::Content => AgentDisplay {
                name: "Content Agent",
                color: "#ec4899",
                icon: "pen-tool",
                description: "Creative briefs, copy and asset production",
            },
            Self::Social => AgentDisplay {
                name: "Social Agent",
                color: "#0ea5e9",
                icon: "share-2",
                description: "Organic social calendar and community",
            },
            Self::Influencer => AgentDisplay {
                name: "Influencer Agent",
                color: "#f59e0b",
                icon: "users",
                description: "Creator discovery, outreach and contracting",
            },
            Self::RetailPartner => AgentDisplay {
                name: "Retail Partner Agent",
                color: "#10b981",
                icon: "store",
                description: "Retailer sell-in, co-marketing and shelf placement",
            },
            Self::PaidMedia => AgentDisplay {
                name: "Paid Media Agent",
                color: "#ef4444",
                icon: "megaphone",
                description: "Paid social and search flighting",
            },
            Self::Analytics => AgentDisplay {
                name: "Analytics Agent",
                color: "#8b5cf6",
                icon: "bar-chart-3",
                description: "Attribution, reporting and KPI tracking",
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentStatus {
    Running,
    Idle,
    Waiting,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentKpi {
    pub label: String,
    pub value: f64,
    pub target: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub kind: AgentKind,
    pub name: String,
    pub status: AgentStatus,
    pub active_tasks: u32,
    pub completed_tasks: u32,
    pub total_tasks: u32,
    pub kpis: Vec<AgentKpi>,
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl Agent {
    pub fn display(&self) -> AgentDisplay {
        self.kind.display()
    }
}

// ─── Deliverables ───────────────────────────────────────────────────────────

/// Stored lifecycle status. `overdue` is never stored; see [`DisplayStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverableStatus {
    NotStarted,
    #[serde(alias = "overdue")]
    InProgress,
    InReview,
    Completed,
    Blocked,
}

impl DeliverableStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::InReview => "in_review",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Allowed lifecycle edges.
    pub fn can_transition_to(self, next: DeliverableStatus) -> bool {
        use DeliverableStatus::*;
        if self == next || self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Blocked) => true,
            (Blocked, InProgress) => true,
            (NotStarted, InProgress) => true,
            (InProgress, InReview) => true,
            (InReview, Completed) => true,
            (InReview, InProgress) => true,
            _ => false,
        }
    }
}

/// Status as shown to the view, with `overdue` derived from the due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    NotStarted,
    InProgress,
    InReview,
    Completed,
    Overdue,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deliverable {
    pub id: String,
    pub agent_id: String,
    pub title: String,
    pub description: String,
    pub status: DeliverableStatus,
    pub priority: Priority,
    pub week: u32,
    pub phase: String,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

/// Read model for a deliverable row: stored fields plus derived values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverableView {
    #[serde(flatten)]
    pub deliverable: Deliverable,
    pub progress: u32,
    pub display_status: DisplayStatus,
}

// ─── Messages & chat ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Action,
    Insight,
    Alert,
    Recommendation,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Approve,
    Reject,
    Review,
    Navigate,
    Dismiss,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageAction {
    pub id: String,
    pub label: String,
    pub r#type: ActionType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    pub id: String,
    pub agent_id: String,
    pub r#type: MessageType,
    pub title: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    #[serde(default)]
    pub actions: Vec<MessageAction>,
    pub action_required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BriefKind {
    Morning,
    Eod,
}

impl BriefKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Eod => "eod",
        }
    }
}

// ─── Influencer CRM ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Discovered,
    Qualified,
    OutreachSent,
    FollowedUp,
    Responded,
    Negotiating,
    Contracted,
    ContentInProgress,
    Published,
    Completed,
    Declined,
    Unresponsive,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 12] = [
        Self::Discovered,
        Self::Qualified,
        Self::OutreachSent,
        Self::FollowedUp,
        Self::Responded,
        Self::Negotiating,
        Self::Contracted,
        Self::ContentInProgress,
        Self::Published,
        Self::Completed,
        Self::Declined,
        Self::Unresponsive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Qualified => "qualified",
            Self::OutreachSent => "outreach_sent",
            Self::FollowedUp => "followed_up",
            Self::Responded => "responded",
            Self::Negotiating => "negotiating",
            Self::Contracted => "contracted",
            Self::ContentInProgress => "content_in_progress",
            Self::Published => "published",
            Self::Completed => "completed",
            Self::Declined => "declined",
            Self::Unresponsive => "unresponsive",
        }
    }

    /// Position along the forward funnel; `None` for the terminal exits.
    pub fn funnel_index(self) -> Option<u8> {
        match self {
            Self::Discovered => Some(0),
            Self::Qualified => Some(1),
            Self::OutreachSent => Some(2),
            Self::FollowedUp => Some(3),
            Self::Responded => Some(4),
            Self::Negotiating => Some(5),
            Self::Contracted => Some(6),
            Self::ContentInProgress => Some(7),
            Self::Published => Some(8),
            Self::Completed => Some(9),
            Self::Declined | Self::Unresponsive => None,
        }
    }

    /// Furthest funnel position a record in this stage is known to have reached.
    /// A decline is a response; an unresponsive record was contacted.
    pub fn reached_index(self) -> u8 {
        match self {
            Self::Declined => 4,
            Self::Unresponsive => 2,
            other => other.funnel_index().unwrap_or(0),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Declined | Self::Unresponsive)
    }

    pub fn can_advance_to(self, next: PipelineStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.funnel_index(), next.funnel_index()) {
            (Some(current), Some(target)) => target > current,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutreachStatus {
    Queued,
    Sent,
    Opened,
    Replied,
    Bounced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutreachAttempt {
    pub id: String,
    pub channel: String,
    pub automated: bool,
    pub status: OutreachStatus,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Influencer {
    pub id: String,
    pub name: String,
    pub handle: String,
    pub platform: String,
    pub source: String,
    pub stage: PipelineStage,
    pub score: u8,
    pub followers: u64,
    pub engagement_rate: f64,
    #[serde(default)]
    pub outreach: Vec<OutreachAttempt>,
    pub added_at: DateTime<Utc>,
}

// ─── Scraper jobs ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScraperType {
    Hashtag,
    Competitor,
    Keyword,
    Lookalike,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScraperStatus {
    Running,
    Queued,
    Completed,
    Failed,
    Paused,
}

impl ScraperStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Queued => "queued",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Paused => "paused",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperConfig {
    pub recurring: bool,
    pub interval_hours: u32,
    pub auto_outreach: bool,
    pub max_per_day: u32,
    pub min_followers: u64,
    pub min_engagement: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperResults {
    pub scanned: u64,
    pub qualified: u64,
    pub added: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperJob {
    pub id: String,
    pub name: String,
    pub r#type: ScraperType,
    pub target: String,
    pub status: ScraperStatus,
    pub config: ScraperConfig,
    pub results: ScraperResults,
    #[serde(default)]
    pub added_today: u32,
    #[serde(default)]
    pub counted_day: Option<NaiveDate>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
}

// ─── Budget, timeline, campaign ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentBudget {
    pub agent_id: String,
    pub allocated: f64,
    pub spent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub total: f64,
    pub spent: f64,
    pub committed: f64,
    #[serde(default)]
    pub by_agent: Vec<AgentBudget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    Milestone,
    Launch,
    Review,
    Deadline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    pub kind: TimelineKind,
    pub agent_id: Option<String>,
    pub deliverable_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub client: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget: Budget,
}

// ─── Persisted namespaces ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignState {
    pub campaign: Campaign,
    pub agents: Vec<Agent>,
    pub deliverables: Vec<Deliverable>,
    pub messages: Vec<AgentMessage>,
    pub timeline: Vec<TimelineEvent>,
    #[serde(default)]
    pub chats: BTreeMap<String, Vec<ChatMessage>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmState {
    pub influencers: Vec<Influencer>,
    pub scraper_jobs: Vec<ScraperJob>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingState {
    pub completed: bool,
    pub step: u32,
    pub brand_name: Option<String>,
    #[serde(default)]
    pub goals: Vec<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOnboardingPayload {
    pub step: Option<u32>,
    pub brand_name: Option<String>,
    pub goals: Option<Vec<String>>,
}

// ─── Settings ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub chat_latency_ms: u64,
    pub brief_latency_ms: u64,
    pub scraper_latency_ms: u64,
    pub provider_timeout_ms: u64,
    pub scraper_tick_seconds: u64,
    pub health_policy: HealthPolicy,
}

pub const MAX_SIMULATED_LATENCY_MS: u64 = 60_000;
pub const MIN_PROVIDER_TIMEOUT_MS: u64 = 10;
pub const MAX_PROVIDER_TIMEOUT_MS: u64 = 300_000;
pub const MAX_SCRAPER_TICK_SECONDS: u64 = 86_400;

impl AppSettings {
    /// Clamps timings into ranges the scheduler and provider can honor.
    pub fn normalized(mut self) -> Self {
        self.chat_latency_ms = self.chat_latency_ms.min(MAX_SIMULATED_LATENCY_MS);
        self.brief_latency_ms = self.brief_latency_ms.min(MAX_SIMULATED_LATENCY_MS);
        self.scraper_latency_ms = self.scraper_latency_ms.min(MAX_SIMULATED_LATENCY_MS);
        self.provider_timeout_ms = self
            .provider_timeout_ms
            .clamp(MIN_PROVIDER_TIMEOUT_MS, MAX_PROVIDER_TIMEOUT_MS);
        self.scraper_tick_seconds = self.scraper_tick_seconds.clamp(1, MAX_SCRAPER_TICK_SECONDS);
        self.health_policy = self.health_policy.normalized();
        self
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            chat_latency_ms: 900,
            brief_latency_ms: 1_500,
            scraper_latency_ms: 1_200,
            provider_timeout_ms: 15_000,
            scraper_tick_seconds: 60,
            health_policy: HealthPolicy::default(),
        }
    }
}

// ─── Responses & events ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreEvent {
    pub r#type: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub event_id: String,
    pub seq: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOutcome {
    pub user_message: ChatMessage,
    pub assistant_message: Option<ChatMessage>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefOutcome {
    pub message: Option<AgentMessage>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingState {
    pub chats: Vec<String>,
    pub briefs: Vec<BriefKind>,
    pub errors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSummary {
    pub id: String,
    pub name: String,
    pub client: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub health_score: u8,
    pub completion_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusView {
    #[serde(flatten)]
    pub agent: Agent,
    pub color: String,
    pub icon: String,
    pub unread_messages: usize,
    pub open_deliverables: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunScraperResponse {
    pub job: Option<ScraperJob>,
    pub added: Vec<Influencer>,
}
