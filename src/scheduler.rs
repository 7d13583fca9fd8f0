use crate::models::{ScraperJob, ScraperStatus};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::RwLock;
use tokio::sync::{Mutex, Notify};

#[derive(Debug, Clone)]
pub struct ScheduledScrape {
    pub job_id: String,
    pub priority: i32,
    pub queued_at: DateTime<Utc>,
}

type ExecutorFuture = Pin<Box<dyn Future<Output = bool> + Send>>;
type Executor = Arc<dyn Fn(String) -> ExecutorFuture + Send + Sync>;

/// Next time a recurring job should run after finishing at `finished_at`.
pub fn next_run_after(job: &ScraperJob, finished_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if !job.config.recurring {
        return None;
    }
    let hours = i64::from(job.config.interval_hours.max(1));
    Some(finished_at + ChronoDuration::hours(hours))
}

/// Recurring, queued jobs whose `next_run_at` has passed, most overdue first.
pub fn due_jobs(jobs: &[ScraperJob], now: DateTime<Utc>) -> Vec<ScheduledScrape> {
    let mut due = jobs
        .iter()
        .filter(|job| job.config.recurring && job.status == ScraperStatus::Queued)
        .filter_map(|job| {
            let at = job.next_run_at?;
            (at <= now).then(|| ScheduledScrape {
                job_id: job.id.clone(),
                priority: i32::from(job.config.auto_outreach),
                queued_at: at,
            })
        })
        .collect::<Vec<_>>();
    due.sort_by_key(|scrape| std::cmp::Reverse(effective_priority(scrape, now)));
    due
}

/// Runs queued scrapes one at a time through the registered executor.
#[derive(Clone)]
pub struct Scheduler {
    queue: Arc<Mutex<Vec<ScheduledScrape>>>,
    notify: Arc<Notify>,
    executor: Arc<RwLock<Option<Executor>>>,
    max_queue_size: usize,
}

impl Scheduler {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            queue: Arc::new(Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
            executor: Arc::new(RwLock::new(None)),
            max_queue_size,
        }
    }

    pub fn set_executor(&self, executor: Executor) {
        if let Ok(mut writer) = self.executor.write() {
            *writer = Some(executor);
        }
    }

    pub async fn enqueue(&self, scrape: ScheduledScrape) -> Result<(), String> {
        {
            let mut queue = self.queue.lock().await;
            if queue.iter().any(|queued| queued.job_id == scrape.job_id) {
                return Ok(());
            }
            if queue.len() >= self.max_queue_size {
                return Err(format!(
                    "Scrape queue capacity exceeded (max {}).",
                    self.max_queue_size
                ));
            }
            queue.push(scrape);
        }
        self.notify.notify_one();
        Ok(())
    }

    pub async fn queued_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub fn start(&self) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_loop().await;
        });
    }

    async fn run_loop(self) {
        loop {
            self.notify.notified().await;
            while let Some(scrape) = self.pick_next().await {
                let failed = self.execute(scrape.job_id.clone()).await;
                if failed {
                    tracing::warn!(job_id = %scrape.job_id, "scheduled scrape finished in failed state");
                }
            }
        }
    }

    async fn execute(&self, job_id: String) -> bool {
        let executor = self.executor.read().ok().and_then(|reader| reader.clone());
        match executor {
            Some(executor) => executor(job_id).await,
            None => true,
        }
    }

    async fn pick_next(&self) -> Option<ScheduledScrape> {
        let mut queue = self.queue.lock().await;
        if queue.is_empty() {
            return None;
        }
        let now = Utc::now();
        let best_index = queue
            .iter()
            .enumerate()
            .max_by_key(|(_, scrape)| effective_priority(scrape, now))
            .map(|(index, _)| index)?;
        Some(queue.remove(best_index))
    }
}

fn effective_priority(scrape: &ScheduledScrape, now: DateTime<Utc>) -> i64 {
    let waited = (now - scrape.queued_at).num_seconds().max(0);
    i64::from(scrape.priority) * 100 + waited / 15
}
