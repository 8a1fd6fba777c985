// Not every integration binary uses every helper.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redline_core::api::{
    Completion, InvokeError, InvokeRequest, ModelInvoker, TaskRegistry, TaskView,
};
use uuid::Uuid;

/// One scripted backend reply.
pub enum Script {
    Ok { text: String, tokens: (u64, u64) },
    Fail(String),
}

pub fn ok_text(text: &str) -> Script {
    Script::Ok {
        text: text.to_string(),
        tokens: (120, 40),
    }
}

pub fn ok_json(value: serde_json::Value) -> Script {
    ok_text(&value.to_string())
}

pub fn fail(message: &str) -> Script {
    Script::Fail(message.to_string())
}

/// Deterministic stand-in for the inference backend: pops scripted replies
/// in order and records which models were asked.
pub struct ScriptedInvoker {
    replies: Mutex<VecDeque<Script>>,
    calls: AtomicUsize,
    models_called: Mutex<Vec<String>>,
}

impl ScriptedInvoker {
    pub fn new(replies: Vec<Script>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            models_called: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn models_called(&self) -> Vec<String> {
        self.models_called.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn invoke(&self, request: &InvokeRequest) -> Result<Completion, InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.models_called
            .lock()
            .unwrap()
            .push(request.model_id.clone());

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Script::Ok {
                text,
                tokens: (input, output),
            }) => Ok(Completion {
                text,
                input_tokens: input,
                output_tokens: output,
            }),
            Some(Script::Fail(message)) => Err(InvokeError::Transport(message)),
            None => Ok(Completion {
                text: "{\"feedback_items\": []}".to_string(),
                input_tokens: 10,
                output_tokens: 10,
            }),
        }
    }
}

/// Poll a task until it reaches a terminal state.
pub async fn wait_for_terminal(registry: &TaskRegistry, id: Uuid) -> TaskView {
    loop {
        let view = registry.status(id).expect("task known");
        if view.status.is_terminal() {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
