use std::io::Read;
use std::time::Duration;

use redline_core::api::{AppContext, ChatRequest, SectionRequest, TaskStatus, TaskView};
use redline_core::error::CliError;
use uuid::Uuid;

use crate::commands::cli::{AnalyzeArgs, ChatArgs};

pub async fn run_analyze(ctx: &AppContext, args: AnalyzeArgs) -> Result<i32, CliError> {
    let content = match args.file.as_deref() {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    if content.trim().is_empty() {
        return Err(CliError::Command("section content is empty".to_string()));
    }

    let id = ctx.submit_analysis(SectionRequest {
        section_name: args.section,
        content,
        doc_type: args.doc_type,
        session_id: None,
    })?;
    tracing::info!(task_id = %id, "analysis submitted");

    let view = poll_until_terminal(ctx, id, Duration::from_millis(args.poll_ms)).await?;
    render_outcome(view)
}

pub async fn run_chat(ctx: &AppContext, args: ChatArgs) -> Result<i32, CliError> {
    let context = match args.context_file.as_deref() {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)
                .map_err(|e| CliError::Command(format!("context file is not JSON: {e}")))?
        }
        None => serde_json::Value::Null,
    };

    let id = ctx.submit_chat(ChatRequest {
        query: args.query,
        context,
        session_id: None,
    })?;
    tracing::info!(task_id = %id, "chat submitted");

    let view = poll_until_terminal(ctx, id, Duration::from_millis(args.poll_ms)).await?;
    render_outcome(view)
}

pub fn run_stats(ctx: &AppContext) -> Result<i32, CliError> {
    let snapshot = ctx.health_snapshot();
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).unwrap_or_else(|_| snapshot.to_string())
    );
    Ok(0)
}

/// The terminal version of the browser-side poller: re-read task status on an
/// interval until it goes terminal.
async fn poll_until_terminal(
    ctx: &AppContext,
    id: Uuid,
    interval: Duration,
) -> Result<TaskView, CliError> {
    loop {
        let view = ctx.registry().status(id)?;
        if view.status.is_terminal() {
            return Ok(view);
        }
        tokio::time::sleep(interval).await;
    }
}

fn render_outcome(view: TaskView) -> Result<i32, CliError> {
    match view.status {
        TaskStatus::Success => {
            let result = view.result.unwrap_or(serde_json::Value::Null);
            println!(
                "{}",
                serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string())
            );
            Ok(0)
        }
        TaskStatus::Failure => {
            if let Some(error) = view.error {
                eprintln!("task failed [{}]: {}", error.kind, error.message);
            } else {
                eprintln!("task failed");
            }
            Ok(30)
        }
        TaskStatus::Cancelled => {
            eprintln!("task cancelled");
            Ok(30)
        }
        // poll_until_terminal only returns terminal views
        _ => Ok(50),
    }
}
