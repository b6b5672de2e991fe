//! In-memory fakes of the engine's collaborators.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc;

use herald_common::types::{Channel, Message, MessageStatus, StatusKind, UserChannel};
use herald_engine::store::{MessageStore, StoreError, Subscription, UserDirectory};
use herald_engine::Dispatcher;
use herald_notifier::{ChannelDriver, DriverRegistry, NotifierError};
use herald_templates::TemplateRegistry;

type Delivery = Result<(String, String), StoreError>;

#[derive(Default)]
struct State {
    messages: Vec<(Message, DateTime<Utc>)>,
    statuses: Vec<MessageStatus>,
    published: Vec<(String, String)>,
    create_message_calls: usize,
    create_status_calls: usize,
    status_lookup_error: Option<String>,
    in_flight_windows: Vec<(DateTime<Utc>, DateTime<Utc>)>,
}

/// Message store keeping rows in memory and delivering publishes to live
/// subscriptions.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Delivery>>>,
    subscribe_calls: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert a message row directly, as if created at `created_at`.
    pub fn seed(&self, message: Message, created_at: DateTime<Utc>) {
        self.state
            .lock()
            .unwrap()
            .messages
            .push((message, created_at));
    }

    pub fn seed_status(&self, message_id: &str, status: StatusKind) {
        let mut state = self.state.lock().unwrap();
        let id = state.statuses.len() as i64 + 1;
        state.statuses.push(MessageStatus {
            id,
            message_id: message_id.to_string(),
            status,
            description: String::new(),
            created_at: Utc::now(),
        });
    }

    pub fn fail_status_lookups(&self, reason: &str) {
        self.state.lock().unwrap().status_lookup_error = Some(reason.to_string());
    }

    /// Push a transport error into every live subscription.
    pub fn inject_receive_error(&self, err: impl Fn() -> StoreError) {
        for subscriber in self.subscribers.lock().unwrap().iter() {
            let _ = subscriber.send(Err(err()));
        }
    }

    /// Deliver a raw `(topic, payload)` pair without recording a publish.
    pub fn deliver_raw(&self, topic: &str, payload: &str) {
        for subscriber in self.subscribers.lock().unwrap().iter() {
            let _ = subscriber.send(Ok((topic.to_string(), payload.to_string())));
        }
    }

    pub fn create_message_calls(&self) -> usize {
        self.state.lock().unwrap().create_message_calls
    }

    pub fn create_status_calls(&self) -> usize {
        self.state.lock().unwrap().create_status_calls
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().published.clone()
    }

    pub fn statuses_of(&self, message_id: &str) -> Vec<StatusKind> {
        self.state
            .lock()
            .unwrap()
            .statuses
            .iter()
            .filter(|s| s.message_id == message_id)
            .map(|s| s.status)
            .collect()
    }

    pub fn in_flight_windows(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.state.lock().unwrap().in_flight_windows.clone()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn closed_subscriptions(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create_message(&self, message: &Message) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.create_message_calls += 1;
        state.messages.push((message.clone(), Utc::now()));
        Ok(())
    }

    async fn create_status(
        &self,
        message_id: &str,
        status: StatusKind,
        description: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.create_status_calls += 1;
        let id = state.statuses.len() as i64 + 1;
        state.statuses.push(MessageStatus {
            id,
            message_id: message_id.to_string(),
            status,
            description: description.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn find_message(&self, message_id: &str) -> Result<Option<Message>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .find(|(m, _)| m.id == message_id)
            .map(|(m, _)| m.clone()))
    }

    async fn find_last_status(
        &self,
        message_id: &str,
    ) -> Result<Option<MessageStatus>, StoreError> {
        let state = self.state.lock().unwrap();
        if let Some(reason) = &state.status_lookup_error {
            return Err(StoreError::Unavailable(reason.clone()));
        }

        Ok(state
            .statuses
            .iter()
            .rev()
            .find(|s| s.message_id == message_id)
            .cloned())
    }

    async fn find_duplicate(
        &self,
        message: &Message,
        window: TimeDelta,
    ) -> Result<Option<String>, StoreError> {
        let window = window.num_milliseconds();
        let state = self.state.lock().unwrap();

        Ok(state
            .messages
            .iter()
            .map(|(m, _)| m)
            .find(|m| {
                m.user_id == message.user_id
                    && m.external_id == message.external_id
                    && m.channel == message.channel
                    && m.template == message.template
                    && (m.timestamp - message.timestamp).abs() <= window
            })
            .map(|m| m.id.clone()))
    }

    async fn find_in_flight(
        &self,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Message>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.in_flight_windows.push((created_after, created_before));

        let last_status = |id: &str| {
            state
                .statuses
                .iter()
                .rev()
                .find(|s| s.message_id == id)
                .map(|s| s.status)
        };

        Ok(state
            .messages
            .iter()
            .filter(|(_, created)| *created > created_after && *created < created_before)
            .filter(|(m, _)| {
                matches!(
                    last_status(&m.id),
                    None | Some(StatusKind::New) | Some(StatusKind::Sending)
                )
            })
            .map(|(m, _)| m.clone())
            .collect())
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), StoreError> {
        self.state
            .lock()
            .unwrap()
            .published
            .push((topic.to_string(), payload.to_string()));

        for subscriber in self.subscribers.lock().unwrap().iter() {
            let _ = subscriber.send(Ok((topic.to_string(), payload.to_string())));
        }
        Ok(())
    }

    async fn subscribe(&self, _topics: &[String]) -> Result<Box<dyn Subscription>, StoreError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);

        Ok(Box::new(MemorySubscription {
            rx,
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct MemorySubscription {
    rx: mpsc::UnboundedReceiver<Delivery>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn receive(&mut self) -> Result<(String, String), StoreError> {
        self.rx
            .recv()
            .await
            .unwrap_or(Err(StoreError::SubscriptionClosed))
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// User directory backed by a fixed set of channel settings.
#[derive(Default)]
pub struct FakeUsers {
    channels: Mutex<HashMap<(i64, Channel), UserChannel>>,
}

impl FakeUsers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, user_id: i64, channel: Channel, recipient: &str, can_notify: bool) {
        let mut channels = self.channels.lock().unwrap();
        let id = channels.len() as i64 + 1;
        channels.insert(
            (user_id, channel),
            UserChannel {
                id,
                user_id,
                channel,
                recipient: recipient.to_string(),
                can_notify,
            },
        );
    }
}

#[async_trait]
impl UserDirectory for FakeUsers {
    async fn user_exists(&self, user_id: i64) -> Result<bool, StoreError> {
        Ok(self
            .channels
            .lock()
            .unwrap()
            .keys()
            .any(|(id, _)| *id == user_id))
    }

    async fn find_recipient(
        &self,
        user_id: i64,
        channel: Channel,
    ) -> Result<Option<UserChannel>, StoreError> {
        Ok(self
            .channels
            .lock()
            .unwrap()
            .get(&(user_id, channel))
            .cloned())
    }
}

/// Driver that records every send instead of calling out.
pub struct RecordingDriver {
    channel: Channel,
    delay: Duration,
    sent: Mutex<Vec<(String, String)>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingDriver {
    pub fn new(channel: Channel) -> Arc<Self> {
        Self::slow(channel, Duration::ZERO)
    }

    /// Driver whose sends take `delay` (tokio time) to complete.
    pub fn slow(channel: Channel, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            channel,
            delay,
            sent: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    /// Every send started so far, including ones still in progress.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Most sends observed running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelDriver for RecordingDriver {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, recipient: &str, content: &str) -> Result<(), NotifierError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), content.to_string()));

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn dispatcher(
    store: Arc<MemoryStore>,
    users: Arc<FakeUsers>,
    drivers: &[Arc<RecordingDriver>],
) -> Dispatcher {
    let mut registry = DriverRegistry::empty();
    for driver in drivers {
        registry.register(Arc::clone(driver) as Arc<dyn ChannelDriver>);
    }

    Dispatcher::new(store, users, registry, TemplateRegistry::new())
}

pub fn receipt_params() -> serde_json::Value {
    serde_json::json!({
        "orderId": 42,
        "commissionAmount": "1.50 USD",
        "totalAmount": "31.50 USD"
    })
}

/// Current time in millis, the timestamp unit IDs carry.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
