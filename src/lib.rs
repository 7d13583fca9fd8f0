pub mod center;
pub mod db;
pub mod errors;
pub mod inflight;
pub mod metrics;
pub mod models;
pub mod policy;
pub mod provider;
pub mod scheduler;
pub mod scraper;
pub mod seed;
pub mod store;

#[cfg(feature = "desktop")]
mod commands;

pub use crate::center::CommandCenter;
pub use crate::errors::{AppError, AppResult};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

#[cfg(feature = "desktop")]
pub fn run() {
    use crate::commands::{self, forward_store_events, AppState};
    use tauri::Manager;

    tauri::Builder::default()
        .setup(|app| {
            let app_data_dir = app.path().app_data_dir().map_err(|error| error.to_string())?;
            std::fs::create_dir_all(&app_data_dir).map_err(|error| error.to_string())?;
            init_tracing(&app_data_dir).map_err(|error| error.to_string())?;

            let center = CommandCenter::new(app_data_dir).map_err(|error| error.to_string())?;
            let handle = app.handle().clone();

            tauri::async_runtime::spawn({
                let center = center.clone();
                async move {
                    forward_store_events(center, handle).await;
                }
            });

            tauri::async_runtime::spawn({
                let center = center.clone();
                async move {
                    if let Err(error) = center.hydrate().await {
                        tracing::error!(error = %error, "state hydration failed");
                        return;
                    }
                    center.start_background();
                }
            });

            app.manage(AppState { center });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::trigger_orchestration,
            commands::get_agent_status,
            commands::list_campaigns,
            commands::list_deliverables,
            commands::list_timeline,
            commands::is_hydrated,
            commands::get_dashboard,
            commands::get_pipeline_stats,
            commands::get_budget_pacing,
            commands::list_messages,
            commands::list_influencers,
            commands::list_scraper_jobs,
            commands::get_chat_history,
            commands::get_loading_state,
            commands::get_onboarding,
            commands::get_settings,
            commands::update_settings,
            commands::toggle_subtask,
            commands::set_deliverable_status,
            commands::mark_message_read,
            commands::execute_action,
            commands::send_chat_message,
            commands::generate_brief,
            commands::cancel_request,
            commands::dismiss_error,
            commands::run_scraper,
            commands::set_scraper_paused,
            commands::advance_influencer,
            commands::log_outreach,
            commands::update_onboarding,
            commands::complete_onboarding
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}

/// Installs the JSON file logger under `<app_data_dir>/logs`.
pub fn init_tracing(app_data_dir: &Path) -> Result<(), String> {
    let log_dir = app_data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "command-center.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
