//! Fixture state used on first launch and whenever persisted state cannot be read.

use crate::models::{
    ActionType, Agent, AgentBudget, AgentKind, AgentKpi, AgentMessage, AgentStatus, Budget, Campaign,
    CampaignState, CrmState, Deliverable, DeliverableStatus, Influencer, MessageAction, MessageType,
    OnboardingState, OutreachAttempt, OutreachStatus, PipelineStage, Priority, ScraperConfig, ScraperJob,
    ScraperResults, ScraperStatus, ScraperType, Subtask, TimelineEvent, TimelineKind,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn kpi(label: &str, value: f64, target: f64, unit: &str) -> AgentKpi {
    AgentKpi {
        label: label.to_string(),
        value,
        target,
        unit: unit.to_string(),
    }
}

fn subtasks(prefix: &str, titles: &[(&str, bool)]) -> Vec<Subtask> {
    titles
        .iter()
        .enumerate()
        .map(|(index, (title, completed))| Subtask {
            id: format!("{}-st{}", prefix, index + 1),
            title: (*title).to_string(),
            completed: *completed,
        })
        .collect()
}

fn agent(kind: AgentKind, status: AgentStatus, counters: (u32, u32, u32), kpis: Vec<AgentKpi>, now: DateTime<Utc>) -> Agent {
    let (active_tasks, completed_tasks, total_tasks) = counters;
    Agent {
        id: kind.as_str().to_string(),
        kind,
        name: kind.display().name.to_string(),
        status,
        active_tasks,
        completed_tasks,
        total_tasks,
        kpis,
        last_activity_at: Some(now - Duration::minutes(i64::from(total_tasks) * 7)),
    }
}

pub fn agents(now: DateTime<Utc>) -> Vec<Agent> {
    vec![
        agent(
            AgentKind::Strategy,
            AgentStatus::Completed,
            (0, 6, 6),
            vec![kpi("Pillars approved", 3.0, 3.0, "count")],
            now,
        ),
        agent(
            AgentKind::Content,
            AgentStatus::Running,
            (3, 9, 16),
            vec![kpi("Assets delivered", 42.0, 80.0, "count"), kpi("Approval rate", 88.0, 90.0, "%")],
            now,
        ),
        agent(
            AgentKind::Social,
            AgentStatus::Running,
            (2, 14, 20),
            vec![kpi("Engagement rate", 4.1, 5.0, "%"), kpi("Followers gained", 12_400.0, 25_000.0, "count")],
            now,
        ),
        agent(
            AgentKind::Influencer,
            AgentStatus::Waiting,
            (2, 4, 10),
            vec![kpi("Creators contracted", 6.0, 20.0, "count")],
            now,
        ),
        agent(
            AgentKind::RetailPartner,
            AgentStatus::Idle,
            (1, 3, 8),
            vec![kpi("Doors secured", 1_150.0, 2_000.0, "count")],
            now,
        ),
        agent(
            AgentKind::PaidMedia,
            AgentStatus::Error,
            (1, 5, 9),
            vec![kpi("ROAS", 2.4, 3.0, "x"), kpi("CPA", 18.5, 15.0, "usd")],
            now,
        ),
        agent(
            AgentKind::Analytics,
            AgentStatus::Idle,
            (0, 7, 9),
            vec![kpi("Dashboards live", 4.0, 5.0, "count")],
            now,
        ),
    ]
}

#[allow(clippy::too_many_arguments)]
fn deliverable(
    id: &str,
    agent: AgentKind,
    title: &str,
    description: &str,
    status: DeliverableStatus,
    priority: Priority,
    week: u32,
    phase: &str,
    window: (NaiveDate, NaiveDate),
    dependencies: &[&str],
    steps: &[(&str, bool)],
) -> Deliverable {
    Deliverable {
        id: id.to_string(),
        agent_id: agent.as_str().to_string(),
        title: title.to_string(),
        description: description.to_string(),
        status,
        priority,
        week,
        phase: phase.to_string(),
        start_date: window.0,
        due_date: window.1,
        dependencies: dependencies.iter().map(ToString::to_string).collect(),
        subtasks: subtasks(id, steps),
    }
}

pub fn deliverables() -> Vec<Deliverable> {
    use DeliverableStatus::*;
    vec![
        deliverable(
            "del-brand-platform",
            AgentKind::Strategy,
            "Brand platform & messaging pillars",
            "Positioning statement, three pillars and proof points",
            Completed,
            Priority::Critical,
            1,
            "foundation",
            (date(2026, 9, 7), date(2026, 9, 18)),
            &[],
            &[("Audience research", true), ("Pillar drafts", true), ("Client sign-off", true)],
        ),
        deliverable(
            "del-creative-brief",
            AgentKind::Content,
            "Holiday creative brief",
            "Brief covering hero film, cutdowns and static suite",
            InReview,
            Priority::High,
            3,
            "foundation",
            (date(2026, 9, 21), date(2026, 10, 2)),
            &["del-brand-platform"],
            &[("Mood boards", true), ("Copy directions", true), ("Production budget", true), ("Legal review", false)],
        ),
        deliverable(
            "del-hero-assets",
            AgentKind::Content,
            "Hero asset production",
            "Hero film plus 12 social cutdowns",
            InProgress,
            Priority::Critical,
            6,
            "production",
            (date(2026, 10, 5), date(2026, 11, 6)),
            &["del-creative-brief"],
            &[("Shoot", true), ("Edit v1", false), ("Color & sound", false), ("Cutdowns", false)],
        ),
        deliverable(
            "del-social-calendar",
            AgentKind::Social,
            "Q4 organic social calendar",
            "Eight weeks of posts across three channels",
            InProgress,
            Priority::High,
            4,
            "production",
            (date(2026, 9, 28), date(2026, 10, 16)),
            &["del-brand-platform"],
            &[("Channel strategy", true), ("Post drafts", true), ("Scheduling", false)],
        ),
        deliverable(
            "del-creator-roster",
            AgentKind::Influencer,
            "Creator roster (20 contracted)",
            "Recruit and contract 20 mid-tier creators",
            InProgress,
            Priority::High,
            5,
            "activation",
            (date(2026, 9, 28), date(2026, 11, 13)),
            &["del-creative-brief"],
            &[("Shortlist 60", true), ("Outreach wave 1", true), ("Negotiate rates", false), ("Contracts", false)],
        ),
        deliverable(
            "del-retail-sell-in",
            AgentKind::RetailPartner,
            "Retail sell-in deck",
            "Deck and co-op proposal for top three retailers",
            Blocked,
            Priority::Critical,
            4,
            "activation",
            (date(2026, 9, 28), date(2026, 10, 23)),
            &["del-brand-platform"],
            &[("Sales story", true), ("Co-op pricing", false), ("Buyer meetings", false)],
        ),
        deliverable(
            "del-endcap-program",
            AgentKind::RetailPartner,
            "Endcap display program",
            "In-store display specs and placement schedule",
            NotStarted,
            Priority::Medium,
            8,
            "activation",
            (date(2026, 10, 26), date(2026, 11, 20)),
            &["del-retail-sell-in"],
            &[("Display specs", false), ("Vendor quotes", false)],
        ),
        deliverable(
            "del-paid-flighting",
            AgentKind::PaidMedia,
            "Paid social flighting plan",
            "Channel mix, flighting and audience plan",
            InProgress,
            Priority::High,
            5,
            "production",
            (date(2026, 10, 5), date(2026, 10, 30)),
            &["del-brand-platform"],
            &[("Audience build", true), ("Channel mix", true), ("Creative mapping", false), ("Trafficking", false)],
        ),
        deliverable(
            "del-measurement-plan",
            AgentKind::Analytics,
            "Measurement framework",
            "KPI tree, attribution model and reporting cadence",
            Completed,
            Priority::Medium,
            2,
            "foundation",
            (date(2026, 9, 14), date(2026, 9, 25)),
            &[],
            &[("KPI tree", true), ("Attribution model", true)],
        ),
        deliverable(
            "del-launch-report",
            AgentKind::Analytics,
            "Launch week report",
            "Performance readout for launch week",
            NotStarted,
            Priority::Low,
            11,
            "optimization",
            (date(2026, 11, 16), date(2026, 11, 27)),
            &["del-measurement-plan", "del-paid-flighting"],
            &[("Data pull", false), ("Readout deck", false)],
        ),
    ]
}

fn action(id: &str, label: &str, r#type: ActionType) -> MessageAction {
    MessageAction {
        id: id.to_string(),
        label: label.to_string(),
        r#type,
    }
}

pub fn messages(now: DateTime<Utc>) -> Vec<AgentMessage> {
    vec![
        AgentMessage {
            id: "msg-legal-review".to_string(),
            agent_id: AgentKind::Content.as_str().to_string(),
            r#type: MessageType::Action,
            title: "Creative brief awaiting legal review".to_string(),
            content: "Claims language in the hero script needs sign-off before edit v1 can lock.".to_string(),
            timestamp: now - Duration::hours(2),
            read: false,
            actions: vec![
                action("approve", "Approve claims", ActionType::Approve),
                action("reject", "Send back", ActionType::Reject),
            ],
            action_required: true,
        },
        AgentMessage {
            id: "msg-retail-blocked".to_string(),
            agent_id: AgentKind::RetailPartner.as_str().to_string(),
            r#type: MessageType::Alert,
            title: "Sell-in blocked on co-op pricing".to_string(),
            content: "Finance has not released co-op rates; buyer meetings slip a week per day of delay.".to_string(),
            timestamp: now - Duration::hours(5),
            read: false,
            actions: vec![action("escalate", "Escalate to finance", ActionType::Review)],
            action_required: true,
        },
        AgentMessage {
            id: "msg-social-insight".to_string(),
            agent_id: AgentKind::Social.as_str().to_string(),
            r#type: MessageType::Insight,
            title: "Short-form video outperforming carousels 3:1".to_string(),
            content: "Reels engagement is averaging 6.2% against 2.1% for carousels over the last 14 days.".to_string(),
            timestamp: now - Duration::hours(20),
            read: true,
            actions: Vec::new(),
            action_required: false,
        },
        AgentMessage {
            id: "msg-paid-reco".to_string(),
            agent_id: AgentKind::PaidMedia.as_str().to_string(),
            r#type: MessageType::Recommendation,
            title: "Shift 15% of search budget to paid social".to_string(),
            content: "Search CPA is 40% above target while paid social is pacing under. Reallocation recovers an estimated 0.3x ROAS.".to_string(),
            timestamp: now - Duration::hours(9),
            read: false,
            actions: vec![
                action("apply", "Apply reallocation", ActionType::Approve),
                action("dismiss", "Dismiss", ActionType::Dismiss),
            ],
            action_required: true,
        },
        AgentMessage {
            id: "msg-analytics-status".to_string(),
            agent_id: AgentKind::Analytics.as_str().to_string(),
            r#type: MessageType::Status,
            title: "Attribution dashboard refreshed".to_string(),
            content: "All four channel dashboards refreshed with yesterday's data.".to_string(),
            timestamp: now - Duration::hours(14),
            read: true,
            actions: vec![action("open", "Open dashboard", ActionType::Navigate)],
            action_required: false,
        },
    ]
}

fn milestone(id: &str, title: &str, on: NaiveDate, kind: TimelineKind, agent: Option<AgentKind>, deliverable: Option<&str>) -> TimelineEvent {
    TimelineEvent {
        id: id.to_string(),
        title: title.to_string(),
        date: on,
        kind,
        agent_id: agent.map(|kind| kind.as_str().to_string()),
        deliverable_id: deliverable.map(ToString::to_string),
    }
}

pub fn timeline() -> Vec<TimelineEvent> {
    vec![
        milestone("tl-kickoff", "Campaign kickoff", date(2026, 9, 7), TimelineKind::Milestone, None, None),
        milestone(
            "tl-platform-approval",
            "Brand platform approved",
            date(2026, 9, 18),
            TimelineKind::Review,
            Some(AgentKind::Strategy),
            Some("del-brand-platform"),
        ),
        milestone(
            "tl-sell-in",
            "Retail sell-in deadline",
            date(2026, 10, 23),
            TimelineKind::Deadline,
            Some(AgentKind::RetailPartner),
            Some("del-retail-sell-in"),
        ),
        milestone(
            "tl-hero-lock",
            "Hero film picture lock",
            date(2026, 11, 6),
            TimelineKind::Deadline,
            Some(AgentKind::Content),
            Some("del-hero-assets"),
        ),
        milestone("tl-launch", "Holiday launch", date(2026, 11, 16), TimelineKind::Launch, None, None),
        milestone(
            "tl-readout",
            "Launch week readout",
            date(2026, 11, 27),
            TimelineKind::Review,
            Some(AgentKind::Analytics),
            Some("del-launch-report"),
        ),
    ]
}

pub fn budget() -> Budget {
    let line = |kind: AgentKind, allocated: f64, spent: f64| AgentBudget {
        agent_id: kind.as_str().to_string(),
        allocated,
        spent,
    };
    Budget {
        total: 1_000_000.0,
        spent: 420_000.0,
        committed: 180_000.0,
        by_agent: vec![
            line(AgentKind::Strategy, 60_000.0, 58_000.0),
            line(AgentKind::Content, 280_000.0, 141_000.0),
            line(AgentKind::Social, 90_000.0, 38_000.0),
            line(AgentKind::Influencer, 200_000.0, 52_000.0),
            line(AgentKind::RetailPartner, 120_000.0, 21_000.0),
            line(AgentKind::PaidMedia, 210_000.0, 83_000.0),
            line(AgentKind::Analytics, 40_000.0, 12_000.0),
        ],
    }
}

pub fn campaign_state(now: DateTime<Utc>) -> CampaignState {
    CampaignState {
        campaign: Campaign {
            id: "cmp-holiday-2026".to_string(),
            name: "Holiday 2026 Launch".to_string(),
            client: "Northwind Home".to_string(),
            start_date: date(2026, 9, 7),
            end_date: date(2026, 12, 18),
            budget: budget(),
        },
        agents: agents(now),
        deliverables: deliverables(),
        messages: messages(now),
        timeline: timeline(),
        chats: BTreeMap::new(),
    }
}

#[allow(clippy::too_many_arguments)]
fn creator(
    id: &str,
    name: &str,
    handle: &str,
    stage: PipelineStage,
    score: u8,
    followers: u64,
    engagement_rate: f64,
    now: DateTime<Utc>,
) -> Influencer {
    let contacted = stage.reached_index() >= 2;
    let outreach = if contacted {
        vec![OutreachAttempt {
            id: format!("{}-out1", id),
            channel: "email".to_string(),
            automated: true,
            status: if stage.reached_index() >= 4 {
                OutreachStatus::Replied
            } else {
                OutreachStatus::Sent
            },
            sent_at: now - Duration::days(6),
        }]
    } else {
        Vec::new()
    };
    Influencer {
        id: id.to_string(),
        name: name.to_string(),
        handle: handle.to_string(),
        platform: "instagram".to_string(),
        source: "seed".to_string(),
        stage,
        score,
        followers,
        engagement_rate,
        outreach,
        added_at: now - Duration::days(14),
    }
}

pub fn influencers(now: DateTime<Utc>) -> Vec<Influencer> {
    vec![
        creator("inf-1", "Maya Chen", "@mayamakeshome", PipelineStage::Contracted, 92, 184_000, 5.4, now),
        creator("inf-2", "Jordan Reyes", "@jordanhosts", PipelineStage::Negotiating, 85, 96_000, 6.1, now),
        creator("inf-3", "Priya Nair", "@priyaplates", PipelineStage::Responded, 78, 61_000, 4.8, now),
        creator("inf-4", "Sam Okafor", "@samdiyspace", PipelineStage::OutreachSent, 74, 43_500, 3.9, now),
        creator("inf-5", "Lena Vogel", "@lenalivingroom", PipelineStage::FollowedUp, 70, 38_200, 3.3, now),
        creator("inf-6", "Chris Park", "@chrisparkcooks", PipelineStage::Declined, 81, 220_000, 2.7, now),
        creator("inf-7", "Ava Moreno", "@avahomeedit", PipelineStage::Qualified, 76, 52_000, 4.4, now),
        creator("inf-8", "Noah Blake", "@noahbuilds", PipelineStage::Discovered, 64, 18_900, 5.0, now),
    ]
}

pub fn scraper_jobs(now: DateTime<Utc>) -> Vec<ScraperJob> {
    vec![
        ScraperJob {
            id: "job-hashtag-holidayhome".to_string(),
            name: "#holidayhome creators".to_string(),
            r#type: ScraperType::Hashtag,
            target: "#holidayhome".to_string(),
            status: ScraperStatus::Queued,
            config: ScraperConfig {
                recurring: true,
                interval_hours: 24,
                auto_outreach: true,
                max_per_day: 15,
                min_followers: 10_000,
                min_engagement: 3.0,
            },
            results: ScraperResults {
                scanned: 1_240,
                qualified: 86,
                added: 31,
            },
            added_today: 0,
            counted_day: None,
            last_run_at: Some(now - Duration::hours(20)),
            next_run_at: Some(now + Duration::hours(4)),
        },
        ScraperJob {
            id: "job-competitor-homegoods".to_string(),
            name: "Competitor partner scan".to_string(),
            r#type: ScraperType::Competitor,
            target: "@rivalhomegoods".to_string(),
            status: ScraperStatus::Completed,
            config: ScraperConfig {
                recurring: false,
                interval_hours: 0,
                auto_outreach: false,
                max_per_day: 25,
                min_followers: 25_000,
                min_engagement: 2.5,
            },
            results: ScraperResults {
                scanned: 640,
                qualified: 41,
                added: 25,
            },
            added_today: 0,
            counted_day: None,
            last_run_at: Some(now - Duration::days(3)),
            next_run_at: None,
        },
        ScraperJob {
            id: "job-keyword-tablescape".to_string(),
            name: "Tablescape keyword sweep".to_string(),
            r#type: ScraperType::Keyword,
            target: "tablescape ideas".to_string(),
            status: ScraperStatus::Paused,
            config: ScraperConfig {
                recurring: true,
                interval_hours: 12,
                auto_outreach: false,
                max_per_day: 10,
                min_followers: 5_000,
                min_engagement: 4.0,
            },
            results: ScraperResults::default(),
            added_today: 0,
            counted_day: None,
            last_run_at: None,
            next_run_at: None,
        },
    ]
}

pub fn crm_state(now: DateTime<Utc>) -> CrmState {
    CrmState {
        influencers: influencers(now),
        scraper_jobs: scraper_jobs(now),
    }
}

pub fn onboarding_state() -> OnboardingState {
    OnboardingState::default()
}
