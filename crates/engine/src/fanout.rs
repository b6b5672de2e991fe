//! Fan-out of published message IDs to per-channel workers.
//!
//! One subscription covers every channel topic. Each received ID is routed
//! by its topic into a single-slot queue owned by that channel's worker, so
//! a channel's messages are delivered in subscription order while channels
//! proceed independently.

use std::collections::HashMap;

use herald_common::types::{Channel, StatusKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::store::{StoreError, Subscription};
use crate::topic;

type Queues = HashMap<Channel, mpsc::Sender<String>>;

impl Dispatcher {
    /// Run the fan-out loop and the channel workers until `cancel` fires.
    ///
    /// Returns an error only if the initial subscription cannot be opened.
    /// On cancellation the subscription is closed once and workers stop
    /// without draining their queues.
    pub async fn handle_messages(&self, cancel: CancellationToken) -> Result<(), DispatchError> {
        let keys = topic::all_keys();
        let mut subscription = self.store.subscribe(&keys).await?;

        let mut queues: Queues = HashMap::with_capacity(Channel::ALL.len());
        let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(Channel::ALL.len());
        for channel in Channel::ALL {
            let (tx, rx) = mpsc::channel(1);
            queues.insert(channel, tx);
            workers.push(tokio::spawn(
                self.clone().run_worker(channel, rx, cancel.clone()),
            ));
        }

        tracing::info!(channels = Channel::ALL.len(), "Message handling started");

        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = subscription.receive() => received,
            };

            match received {
                Ok((topic, message_id)) => {
                    self.route(&queues, &topic, message_id, &cancel).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to receive from message broker");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.retry_backoff) => {}
                    }

                    if matches!(e, StoreError::SubscriptionClosed) {
                        subscription = self.resubscribe(subscription, &keys).await;
                    }
                }
            }
        }

        if let Err(e) = subscription.close().await {
            tracing::error!(error = %e, "Failed to close message broker subscription");
        }

        drop(queues);
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Channel worker panicked");
            }
        }

        tracing::info!("Message handling stopped");
        Ok(())
    }

    /// Replace a closed subscription, keeping the old one if that fails.
    async fn resubscribe(
        &self,
        stale: Box<dyn Subscription>,
        keys: &[String],
    ) -> Box<dyn Subscription> {
        match self.store.subscribe(keys).await {
            Ok(fresh) => {
                if let Err(e) = stale.close().await {
                    tracing::debug!(error = %e, "Closing stale subscription failed");
                }
                tracing::info!("Resubscribed to message topics");
                fresh
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to resubscribe to message topics");
                stale
            }
        }
    }

    /// Forward a message ID to the worker of the channel its topic encodes.
    async fn route(
        &self,
        queues: &Queues,
        topic: &str,
        message_id: String,
        cancel: &CancellationToken,
    ) {
        let channel = match topic::channel_from_key(topic) {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(
                    topic,
                    message_id = %message_id,
                    error = %e,
                    "Dropping message from unknown topic"
                );
                return;
            }
        };

        let Some(queue) = queues.get(&channel) else {
            tracing::warn!(channel = %channel, message_id = %message_id, "No worker for channel");
            return;
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            sent = queue.send(message_id) => {
                if let Err(e) = sent {
                    tracing::error!(channel = %channel, message_id = %e.0, "Channel worker queue closed");
                }
            }
        }
    }

    async fn run_worker(
        self,
        channel: Channel,
        mut queue: mpsc::Receiver<String>,
        cancel: CancellationToken,
    ) {
        tracing::debug!(channel = %channel, "Channel worker started");

        loop {
            let message_id = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = queue.recv() => match next {
                    Some(message_id) => message_id,
                    None => break,
                },
            };

            self.process_queued(channel, &message_id).await;
        }

        tracing::debug!(channel = %channel, "Channel worker stopped");
    }

    /// Load and deliver one queued message. Never fails the worker.
    async fn process_queued(&self, channel: Channel, message_id: &str) {
        let message = match self.store.find_message(message_id).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::error!(message_id, channel = %channel, "Queued message not found");
                self.record_status(message_id, StatusKind::Failed, "message not found")
                    .await;
                return;
            }
            Err(e) => {
                tracing::error!(message_id, channel = %channel, error = %e, "Failed to load message");
                self.record_status(message_id, StatusKind::Failed, &e.to_string())
                    .await;
                return;
            }
        };

        if let Err(e) = self.deliver(&message).await {
            tracing::error!(
                message_id,
                channel = %channel,
                error = %e,
                "Failed to send message"
            );
        }
    }
}
