//! Fakes shared by unit tests.

use std::collections::HashSet;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;

use crate::{
    application::services::transport::{ChatSink, MessageHandle, MessageTransport, WebhookSink},
    domain::{
        models::{BroadcastJob, MessagePayload, ReportSnapshot, ReportTargets},
        repositories::{CountEstimator, RecipientSource, StateStore},
        value_objects::{Cursor, JobId, Recipient},
    },
};

pub fn sample_job(id: &str) -> BroadcastJob {
    BroadcastJob {
        id: JobId::from(id),
        payload: MessagePayload {
            text: "Hello".to_string(),
            image_url: None,
            buttons: Vec::new(),
        },
        estimated_recipient_count: None,
        report: ReportTargets {
            chat_id: None,
            webhook_url: None,
        },
        report_interval_secs: 60,
        inter_batch_delay_secs: 0.0,
        test_recipients: None,
        scheduled_at: None,
        created_at: Utc::now(),
    }
}

/// Recipients `1..=n` whose chat id doubles as the cursor.
pub struct ScriptedRecipientSource {
    recipients: Vec<Recipient>,
    paged: bool,
    failing: AtomicBool,
    fetches: Mutex<Vec<Option<String>>>,
}

impl ScriptedRecipientSource {
    pub fn sequential(count: u64) -> Self {
        Self {
            recipients: (1..=count)
                .map(|id| Recipient::paged(id.to_string(), Cursor::new(id.to_string())))
                .collect(),
            paged: true,
            failing: AtomicBool::new(false),
            fetches: Mutex::new(Vec::new()),
        }
    }

    /// Always returns the same cursor-less page.
    pub fn stuck(chat_ids: Vec<String>) -> Self {
        Self {
            recipients: chat_ids.into_iter().map(Recipient::fixed).collect(),
            paged: false,
            failing: AtomicBool::new(false),
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> Vec<Option<String>> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecipientSource for ScriptedRecipientSource {
    async fn fetch_page(
        &self,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> anyhow::Result<Vec<Recipient>> {
        self.fetches
            .lock()
            .unwrap()
            .push(cursor.map(|cursor| cursor.to_string()));
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("recipient api unavailable");
        }
        if !self.paged {
            return Ok(self.recipients.clone());
        }

        let after: u64 = cursor.map(|c| c.as_str().parse().unwrap()).unwrap_or(0);
        Ok(self
            .recipients
            .iter()
            .filter(|r| r.chat_id.parse::<u64>().unwrap() > after)
            .take(limit)
            .cloned()
            .collect())
    }
}

type SendHook = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
pub struct RecordingTransport {
    attempted: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    hook: Mutex<Option<SendHook>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingTransport {
    pub fn fail_for<const N: usize>(&self, chat_ids: [&str; N]) {
        let mut failing = self.failing.lock().unwrap();
        failing.extend(chat_ids.iter().map(|id| id.to_string()));
    }

    pub fn on_send<F>(&self, hook: F)
    where
        F: Fn(String) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        *self.hook.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn clear_hook(&self) {
        *self.hook.lock().unwrap() = None;
    }

    pub fn attempted(&self) -> Vec<String> {
        self.attempted.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send(&self, chat_id: &str, _payload: &MessagePayload) -> anyhow::Result<()> {
        self.attempted.lock().unwrap().push(chat_id.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let hook = self.hook.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(chat_id.to_string()).await;
        }
        tokio::task::yield_now().await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(chat_id) {
            anyhow::bail!("Forbidden: bot was blocked by the user");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingChatSink {
    sent: Mutex<Vec<(String, String)>>,
    edits: Mutex<Vec<(String, MessageHandle, String)>>,
    next_id: AtomicUsize,
    fail_edits: AtomicBool,
    fail_sends: AtomicBool,
}

impl RecordingChatSink {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<(String, MessageHandle, String)> {
        self.edits.lock().unwrap().clone()
    }

    pub fn fail_edits(&self, failing: bool) {
        self.fail_edits.store(failing, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatSink for RecordingChatSink {
    async fn send_message(&self, chat_id: &str, text: &str) -> anyhow::Result<MessageHandle> {
        if self.fail_sends.load(Ordering::SeqCst) {
            anyhow::bail!("chat not found");
        }
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MessageHandle(id as i64))
    }

    async fn edit_message(
        &self,
        chat_id: &str,
        handle: MessageHandle,
        text: &str,
    ) -> anyhow::Result<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            anyhow::bail!("message to edit not found");
        }
        self.edits
            .lock()
            .unwrap()
            .push((chat_id.to_string(), handle, text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingWebhook {
    posts: Mutex<Vec<(String, ReportSnapshot)>>,
    failing: AtomicBool,
}

impl RecordingWebhook {
    pub fn posts(&self) -> Vec<(String, ReportSnapshot)> {
        self.posts.lock().unwrap().clone()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl WebhookSink for RecordingWebhook {
    async fn post(&self, url: &str, snapshot: &ReportSnapshot) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        self.posts
            .lock()
            .unwrap()
            .push((url.to_string(), snapshot.clone()));
        Ok(())
    }
}

pub struct FailingStateStore;

#[async_trait]
impl StateStore for FailingStateStore {
    async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
        anyhow::bail!("state store unreachable")
    }

    async fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
        anyhow::bail!("state store unreachable")
    }
}

pub struct FixedEstimator(pub anyhow::Result<Option<u64>>);

#[async_trait]
impl CountEstimator for FixedEstimator {
    async fn estimate_count(&self) -> anyhow::Result<Option<u64>> {
        match &self.0 {
            Ok(count) => Ok(*count),
            Err(err) => anyhow::bail!("{err}"),
        }
    }
}
