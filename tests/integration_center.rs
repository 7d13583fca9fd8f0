use campaign_command_center_lib::models::{BriefKind, DeliverableStatus, PipelineStage, UpdateOnboardingPayload};
use campaign_command_center_lib::{AppError, CommandCenter};
use std::sync::Arc;
use tokio::time::Duration;

async fn hydrated_center(dir: &tempfile::TempDir) -> Arc<CommandCenter> {
    let center = CommandCenter::new(dir.path().to_path_buf()).expect("center");
    center
        .update_settings(serde_json::json!({
            "chatLatencyMs": 5,
            "briefLatencyMs": 5,
            "scraperLatencyMs": 5
        }))
        .await
        .expect("settings");
    center.hydrate().await.expect("hydrate");
    center
}

#[tokio::test]
async fn dashboard_reflects_deliverable_progress() {
    let dir = tempfile::tempdir().expect("tempdir");
    let center = hydrated_center(&dir).await;

    let before = center.get_dashboard().await;
    assert!(before.health_score <= 100);
    assert_eq!(before.stats.total_deliverables, 10);

    let target = center
        .list_deliverables(None)
        .await
        .into_iter()
        .find(|view| view.deliverable.status == DeliverableStatus::InReview)
        .expect("a deliverable in review");
    let response = center
        .set_deliverable_status(&target.deliverable.id, DeliverableStatus::Completed)
        .await
        .expect("status");
    assert!(response.success);

    let after = center.get_dashboard().await;
    assert_eq!(after.stats.completed, before.stats.completed + 1);
}

#[tokio::test]
async fn illegal_status_transition_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let center = hydrated_center(&dir).await;
    let response = center
        .set_deliverable_status("del-endcap-program", DeliverableStatus::Completed)
        .await
        .expect("status");
    assert!(!response.success);
}

#[tokio::test]
async fn store_events_carry_increasing_sequence_numbers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let center = hydrated_center(&dir).await;
    let mut events = center.subscribe();

    center.trigger_orchestration("paid-media").await.expect("trigger");
    center.mark_message_read("msg-paid-reco").await.expect("read");

    let first = events.recv().await.expect("first event");
    let second = events.recv().await.expect("second event");
    assert_eq!(first.r#type, "message.created");
    assert_eq!(second.r#type, "message.read");
    assert!(second.seq > first.seq);

    let status = center.get_agent_status(Some("paid-media")).await;
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].color, "#ef4444");
}

#[tokio::test]
async fn chat_and_brief_requests_are_independent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let center = hydrated_center(&dir).await;

    let (chat, brief) = tokio::join!(
        center.send_chat_message("strategy", "How is the budget?"),
        center.generate_brief(BriefKind::Eod)
    );
    let chat = chat.expect("chat").expect("known agent");
    assert!(chat.assistant_message.is_some());
    assert!(brief.expect("brief").message.is_some());

    assert!(matches!(
        center.send_chat_message("strategy", "   ").await,
        Err(AppError::Invalid(_))
    ));
    let loading = center.get_loading_state();
    assert!(loading.chats.is_empty());
    assert!(loading.briefs.is_empty());
}

#[tokio::test]
async fn crm_changes_feed_pipeline_stats_and_persist() {
    let dir = tempfile::tempdir().expect("tempdir");
    let influencer_id = {
        let center = hydrated_center(&dir).await;
        let before = center.get_pipeline_stats().await;

        let discovered = center
            .list_influencers()
            .await
            .into_iter()
            .find(|item| item.stage == PipelineStage::Discovered)
            .expect("discovered influencer");
        let attempt = center
            .log_outreach(&discovered.id, "email")
            .await
            .expect("outreach")
            .expect("attempt");
        assert!(!attempt.automated);

        let after = center.get_pipeline_stats().await;
        assert_eq!(after.contacted, before.contacted + 1);
        discovered.id
    };

    tokio::time::sleep(Duration::from_millis(5)).await;
    let center = CommandCenter::new(dir.path().to_path_buf()).expect("center");
    center.hydrate().await.expect("hydrate");
    let reloaded = center
        .list_influencers()
        .await
        .into_iter()
        .find(|item| item.id == influencer_id)
        .expect("influencer");
    assert_eq!(reloaded.stage, PipelineStage::OutreachSent);
    assert_eq!(reloaded.outreach.len(), 1);
}

#[tokio::test]
async fn onboarding_completes_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let center = hydrated_center(&dir).await;
    let state = center
        .update_onboarding(UpdateOnboardingPayload {
            step: Some(2),
            brand_name: Some("  Hearth & Home ".to_string()),
            goals: Some(vec!["awareness".to_string(), " ".to_string()]),
        })
        .await
        .expect("update");
    assert_eq!(state.brand_name.as_deref(), Some("Hearth & Home"));
    assert_eq!(state.goals, vec!["awareness".to_string()]);

    assert!(center.complete_onboarding().await.expect("complete").success);
    assert!(!center.complete_onboarding().await.expect("complete").success);
    assert!(center.get_onboarding().await.completed);
}
