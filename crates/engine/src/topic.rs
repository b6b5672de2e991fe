//! Pub/sub topic names, `"<namespace>::<channel code>"`.
//!
//! Topics are both published and parsed back by the fan-out loop, so the
//! format is a cross-version contract.

use herald_common::types::Channel;

use crate::error::DispatchError;

pub const NAMESPACE: &str = "ns";

pub fn pubsub_key(channel: Channel) -> String {
    format!("{}::{}", NAMESPACE, channel.code())
}

/// Topics for every registered channel.
pub fn all_keys() -> Vec<String> {
    Channel::ALL.into_iter().map(pubsub_key).collect()
}

/// Recover the channel a topic name was built for.
pub fn channel_from_key(key: &str) -> Result<Channel, DispatchError> {
    let (namespace, code) = key.split_once("::").ok_or(DispatchError::InvalidChannel)?;
    if namespace != NAMESPACE {
        return Err(DispatchError::InvalidChannel);
    }

    let code: i64 = code.parse().map_err(|_| DispatchError::InvalidChannel)?;
    Channel::from_code(code).ok_or(DispatchError::InvalidChannel)
}
