use std::collections::HashMap;
use std::sync::Arc;

use herald_common::config::AppConfig;
use herald_common::types::Channel;

use crate::discord::DiscordDriver;
use crate::email::EmailDriver;
use crate::telegram::TelegramDriver;
use crate::{ChannelDriver, NotifierError, REQUEST_TIMEOUT};

/// Maps each channel to its delivery driver. Populated once at startup and
/// read-only afterwards.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<Channel, Arc<dyn ChannelDriver>>,
}

impl DriverRegistry {
    /// Create a registry with no drivers.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the registry from configuration. Channels without credentials
    /// get no driver; messages for them fail with `DriverNotFound`.
    pub fn from_config(config: &AppConfig) -> Result<Self, NotifierError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let mut registry = Self::empty();

        match &config.telegram_bot_token {
            Some(token) => registry.register(Arc::new(TelegramDriver::new(
                client.clone(),
                config.telegram_api_host.clone(),
                token.clone(),
            ))),
            None => tracing::warn!("TELEGRAM_BOT_TOKEN not set, Telegram delivery disabled"),
        }

        match (&config.resend_api_key, &config.email_from) {
            (Some(api_key), Some(from)) => registry.register(Arc::new(EmailDriver::new(
                client.clone(),
                api_key.clone(),
                from.clone(),
                config.email_subject.clone(),
            ))),
            _ => tracing::warn!("RESEND_API_KEY or EMAIL_FROM not set, email delivery disabled"),
        }

        if config.discord_enabled {
            registry.register(Arc::new(DiscordDriver::new(client)));
        }

        tracing::info!(drivers = registry.drivers.len(), "Channel drivers registered");
        Ok(registry)
    }

    /// Add or replace the driver for `driver.channel()`.
    pub fn register(&mut self, driver: Arc<dyn ChannelDriver>) {
        self.drivers.insert(driver.channel(), driver);
    }

    pub fn get(&self, channel: Channel) -> Result<Arc<dyn ChannelDriver>, NotifierError> {
        self.drivers
            .get(&channel)
            .cloned()
            .ok_or(NotifierError::DriverNotFound(channel))
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.drivers.contains_key(&channel)
    }
}
