//! Scripted generator for tests.
//!
//! Replies are fixed continuations (or failures) handed out in order, so
//! formatting and session behavior can be checked without model weights.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::GenerationError;
use crate::generator::{GenerateOptions, GeneratedText, TextGenerator};
use crate::tokenizer::EOS_TOKEN;

#[derive(Debug, Clone)]
enum Reply {
    Continue(String),
    Raw(String),
    Fail(GenerationError),
    Panic,
}

/// Returns queued replies in order; the last reply repeats once the queue
/// runs dry.
#[derive(Debug)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
    last_options: Mutex<Option<GenerateOptions>>,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        }
    }
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echoes the prompt followed by `continuation`.
    pub fn continuing(continuation: &str) -> Self {
        Self::new().then_continue(continuation)
    }

    pub fn failing(error: GenerationError) -> Self {
        Self::new().then_fail(error)
    }

    pub fn then_continue(self, continuation: &str) -> Self {
        self.push(Reply::Continue(continuation.to_string()))
    }

    /// Returns `text` as-is, without echoing the prompt.
    pub fn then_raw(self, text: &str) -> Self {
        self.push(Reply::Raw(text.to_string()))
    }

    pub fn then_fail(self, error: GenerationError) -> Self {
        self.push(Reply::Fail(error))
    }

    pub fn then_panic(self) -> Self {
        self.push(Reply::Panic)
    }

    fn push(self, reply: Reply) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<GenerateOptions> {
        self.last_options.lock().ok().and_then(|o| o.clone())
    }

    fn next_reply(&self) -> Option<Reply> {
        let mut replies = self.replies.lock().ok()?;
        if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        }
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Vec<GeneratedText>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_options.lock() {
            *last = Some(options.clone());
        }
        let generated_text = match self.next_reply() {
            Some(Reply::Continue(continuation)) => format!("{prompt}{continuation}"),
            Some(Reply::Raw(text)) => text,
            Some(Reply::Fail(error)) => return Err(error),
            Some(Reply::Panic) => panic!("scripted generator panic"),
            None => prompt.to_string(),
        };
        Ok(vec![GeneratedText { generated_text }])
    }

    fn eos_token_id(&self) -> usize {
        0
    }

    fn eos_token(&self) -> &str {
        EOS_TOKEN
    }
}
