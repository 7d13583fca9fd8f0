use crate::models::{Influencer, OutreachAttempt, OutreachStatus, PipelineStage, ScraperJob, ScraperType};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashSet;
use uuid::Uuid;

const FIRST_NAMES: &[&str] = &[
    "Aria", "Ben", "Camila", "Dev", "Elise", "Felix", "Gia", "Hugo", "Iris", "Jonah", "Kira", "Luca",
    "Mina", "Omar", "Paige", "Quinn", "Rosa", "Theo", "Uma", "Wes",
];
const LAST_NAMES: &[&str] = &[
    "Alvarez", "Brooks", "Castillo", "Dunn", "Ellis", "Foster", "Garcia", "Hayes", "Ito", "Jensen",
    "Khan", "Lowe", "Mills", "Novak", "Ortiz", "Patel",
];
const HANDLE_TOPICS: &[&str] = &["home", "hosts", "decor", "table", "nest", "cozy", "makes", "styled"];

/// Outcome of one simulated scraper pass, before it is applied to the store.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub scanned: u64,
    pub qualified: u64,
    pub added: Vec<Influencer>,
}

/// How many records the job may still add today.
pub fn remaining_daily_cap(job: &ScraperJob, now: DateTime<Utc>) -> u32 {
    let today = now.date_naive();
    let used = if job.counted_day == Some(today) { job.added_today } else { 0 };
    job.config.max_per_day.saturating_sub(used)
}

fn source_label(job: &ScraperJob) -> String {
    let kind = match job.r#type {
        ScraperType::Hashtag => "hashtag",
        ScraperType::Competitor => "competitor",
        ScraperType::Keyword => "keyword",
        ScraperType::Lookalike => "lookalike",
    };
    format!("scraper:{}:{}", kind, job.target)
}

/// Scores a candidate on 0..=100 from engagement and reach.
pub fn score_candidate(followers: u64, engagement_rate: f64) -> u8 {
    let engagement = if engagement_rate.is_finite() { engagement_rate.max(0.0) } else { 0.0 };
    let engagement_points = (engagement / 8.0).min(1.0) * 70.0;
    let reach_points = ((followers.max(1) as f64).log10() / 6.0).min(1.0) * 30.0;
    (engagement_points + reach_points).round().clamp(0.0, 100.0) as u8
}

fn unique_handle<R: Rng + ?Sized>(name: &str, taken: &mut HashSet<String>, rng: &mut R) -> String {
    let base = name.split_whitespace().next().unwrap_or("creator").to_ascii_lowercase();
    loop {
        let topic = HANDLE_TOPICS[rng.random_range(0..HANDLE_TOPICS.len())];
        let suffix: u16 = rng.random_range(1..1000);
        let handle = format!("@{}{}{}", base, topic, suffix);
        if taken.insert(handle.clone()) {
            return handle;
        }
    }
}

/// Simulates one discovery pass for `job`.
///
/// At most `remaining_daily_cap` records are added. When the job has
/// `auto_outreach` enabled each added record gets an automated outreach
/// attempt and enters the funnel at `outreach_sent`.
pub fn simulate_discovery<R: Rng + ?Sized>(
    job: &ScraperJob,
    existing_handles: &HashSet<String>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Discovery {
    let scanned = rng.random_range(80u64..400);
    let qualified = (scanned as f64 * rng.random_range(0.05..0.15)).round() as u64;
    let cap = u64::from(remaining_daily_cap(job, now));
    let to_add = qualified.min(cap);

    let mut taken = existing_handles.clone();
    let min_followers = job.config.min_followers.max(1_000);
    let min_engagement = if job.config.min_engagement.is_finite() {
        job.config.min_engagement.max(0.0)
    } else {
        0.0
    };

    let added = (0..to_add)
        .map(|_| {
            let name = format!(
                "{} {}",
                FIRST_NAMES[rng.random_range(0..FIRST_NAMES.len())],
                LAST_NAMES[rng.random_range(0..LAST_NAMES.len())]
            );
            let handle = unique_handle(&name, &mut taken, rng);
            let followers = rng.random_range(min_followers..min_followers.saturating_mul(20).max(min_followers + 1));
            let engagement_rate = ((min_engagement + rng.random_range(0.0..4.0)) * 10.0).round() / 10.0;
            let score = score_candidate(followers, engagement_rate);

            let (stage, outreach) = if job.config.auto_outreach {
                (
                    PipelineStage::OutreachSent,
                    vec![OutreachAttempt {
                        id: Uuid::new_v4().to_string(),
                        channel: "email".to_string(),
                        automated: true,
                        status: OutreachStatus::Sent,
                        sent_at: now,
                    }],
                )
            } else if score >= 70 {
                (PipelineStage::Qualified, Vec::new())
            } else {
                (PipelineStage::Discovered, Vec::new())
            };

            Influencer {
                id: Uuid::new_v4().to_string(),
                name,
                handle,
                platform: "instagram".to_string(),
                source: source_label(job),
                stage,
                score,
                followers,
                engagement_rate,
                outreach,
                added_at: now,
            }
        })
        .collect();

    Discovery {
        scanned,
        qualified,
        added,
    }
}

#[cfg(test)]
mod tests {
    use super::{remaining_daily_cap, score_candidate, simulate_discovery};
    use crate::models::PipelineStage;
    use crate::seed;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn discovery_respects_daily_cap() {
        let now = Utc::now();
        let mut job = seed::scraper_jobs(now).remove(0);
        job.config.max_per_day = 3;
        job.counted_day = Some(now.date_naive());
        job.added_today = 2;
        assert_eq!(remaining_daily_cap(&job, now), 1);

        let mut rng = StdRng::seed_from_u64(7);
        let discovery = simulate_discovery(&job, &HashSet::new(), now, &mut rng);
        assert!(discovery.added.len() <= 1);
        assert!(discovery.qualified <= discovery.scanned);
    }

    #[test]
    fn previous_day_usage_does_not_count() {
        let now = Utc::now();
        let mut job = seed::scraper_jobs(now).remove(0);
        job.config.max_per_day = 5;
        job.added_today = 5;
        job.counted_day = Some(now.date_naive() - chrono::Duration::days(1));
        assert_eq!(remaining_daily_cap(&job, now), 5);
    }

    #[test]
    fn auto_outreach_creates_automated_attempts() {
        let now = Utc::now();
        let mut job = seed::scraper_jobs(now).remove(0);
        job.config.auto_outreach = true;
        job.config.max_per_day = 50;

        let mut rng = StdRng::seed_from_u64(11);
        let discovery = simulate_discovery(&job, &HashSet::new(), now, &mut rng);
        assert!(!discovery.added.is_empty());
        for influencer in &discovery.added {
            assert_eq!(influencer.stage, PipelineStage::OutreachSent);
            assert_eq!(influencer.outreach.len(), 1);
            assert!(influencer.outreach[0].automated);
        }
        let handles = discovery.added.iter().map(|item| item.handle.clone()).collect::<HashSet<_>>();
        assert_eq!(handles.len(), discovery.added.len());
    }

    #[test]
    fn manual_jobs_never_contact_creators() {
        let now = Utc::now();
        let mut job = seed::scraper_jobs(now).remove(1);
        job.config.auto_outreach = false;

        let mut rng = StdRng::seed_from_u64(3);
        let discovery = simulate_discovery(&job, &HashSet::new(), now, &mut rng);
        assert!(discovery.added.iter().all(|item| item.outreach.is_empty()));
        assert!(discovery
            .added
            .iter()
            .all(|item| matches!(item.stage, PipelineStage::Discovered | PipelineStage::Qualified)));
    }

    #[test]
    fn candidate_score_is_bounded() {
        assert_eq!(score_candidate(0, f64::NAN), 0);
        assert!(score_candidate(10_000_000, 50.0) <= 100);
        assert!(score_candidate(50_000, 5.0) > score_candidate(50_000, 1.0));
    }
}
