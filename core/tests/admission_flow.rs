mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fail, ok_json, wait_for_terminal, ScriptedInvoker};
use redline_core::api::{
    AppConfig, AppContext, ModelConfig, RequestManager, SectionRequest, TaskStatus, ThrottleConfig,
};

fn section_request() -> SectionRequest {
    SectionRequest {
        section_name: "Background".to_string(),
        content: "The subject opened three accounts in 2024.".to_string(),
        doc_type: "Full Write-up".to_string(),
        session_id: Some("s-1".to_string()),
    }
}

fn two_model_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.models.chain = vec![
        ModelConfig {
            id: "primary".to_string(),
            name: "Primary".to_string(),
            max_tokens: 1024,
            temperature: 0.3,
        },
        ModelConfig {
            id: "fallback".to_string(),
            name: "Fallback".to_string(),
            max_tokens: 1024,
            temperature: 0.3,
        },
    ];
    cfg
}

#[tokio::test(start_paused = true)]
async fn sixth_request_waits_for_a_concurrency_slot() {
    let manager = Arc::new(RequestManager::new(&ThrottleConfig {
        max_concurrent_requests: 5,
        max_requests_per_minute: 100,
        ..ThrottleConfig::default()
    }));

    let mut handles = Vec::new();
    for _ in 0..6 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            let waited = manager
                .await_admission(0, Duration::from_secs(60))
                .await
                .expect("admitted");
            manager.record_start();
            tokio::time::sleep(Duration::from_millis(200)).await;
            manager.record_end(true, "m", Duration::from_millis(200), 0, None);
            waited
        }));
    }

    let mut waits = Vec::new();
    for handle in handles {
        waits.push(handle.await.expect("join"));
    }

    let immediate = waits.iter().filter(|w| w.is_zero()).count();
    let deferred = waits.iter().filter(|w| !w.is_zero()).count();
    assert_eq!(immediate, 5, "exactly five requests start without waiting");
    assert_eq!(deferred, 1, "the sixth waits for a slot");

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.active_requests, 0);
    assert_eq!(snapshot.total_requests, 6);
}

#[tokio::test(start_paused = true)]
async fn primary_circuit_trips_and_fallback_answers() {
    let mut cfg = two_model_config();
    // Five attempts against the primary so its circuit opens in one job.
    cfg.models.max_retries_per_request = 5;

    let analysis = serde_json::json!({
        "feedback_items": [
            {"comment": "Cite the account numbers.", "severity": "medium", "confidence": 0.9}
        ]
    });
    let invoker = Arc::new(ScriptedInvoker::new(vec![
        fail("HTTP 503: throttled"),
        fail("HTTP 503: throttled"),
        fail("HTTP 503: throttled"),
        fail("HTTP 503: throttled"),
        fail("HTTP 503: throttled"),
        ok_json(analysis),
    ]));

    let ctx = AppContext::new(cfg, invoker.clone());
    let id = ctx.submit_analysis(section_request()).expect("submit");
    let view = wait_for_terminal(ctx.registry(), id).await;

    assert_eq!(view.status, TaskStatus::Success);
    let result = view.result.expect("payload");
    assert_eq!(result["model_used"], "Fallback");
    assert_eq!(result["feedback_count"], 1);

    assert_eq!(
        invoker.models_called(),
        vec!["primary", "primary", "primary", "primary", "primary", "fallback"]
    );

    let snapshot = ctx.throttle().snapshot();
    assert_eq!(snapshot.failed_requests, 5);
    assert_eq!(snapshot.successful_requests, 1);
    assert_eq!(snapshot.throttled_requests, 5);
    assert_eq!(snapshot.circuit_breaker_trips, 1);
    assert_eq!(snapshot.fallback_used, 1);
    assert_eq!(snapshot.retried_requests, 4);

    // The primary's circuit stays open for its cooldown.
    assert!(ctx.throttle().check_model("primary").is_err());
    assert!(ctx.throttle().check_model("fallback").is_ok());
}

#[tokio::test(start_paused = true)]
async fn admission_timeout_fails_the_task() {
    let mut cfg = two_model_config();
    cfg.throttle.max_concurrent_requests = 1;
    cfg.throttle.admission_timeout_secs = 2;
    cfg.models.max_retries_per_request = 1;

    let invoker = Arc::new(ScriptedInvoker::new(vec![]));
    let ctx = AppContext::new(cfg, invoker);

    // Hold the only slot so the job can never be admitted.
    ctx.throttle().record_start();

    let id = ctx.submit_analysis(section_request()).expect("submit");
    let view = wait_for_terminal(ctx.registry(), id).await;

    assert_eq!(view.status, TaskStatus::Failure);
    let error = view.error.expect("error");
    assert_eq!(error.kind, "ADMISSION_TIMEOUT");

    ctx.throttle().record_end(true, "held", Duration::from_secs(1), 0, None);
}
