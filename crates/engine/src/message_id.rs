//! Deterministic message IDs.
//!
//! Layout: `NS-<channel:3>-<template:3>-<user:19>-<timestamp:13>-<external:19>`.
//! Channel, template, user and external ID are left-padded with zeros; the
//! timestamp is right-padded to 13 digits so unix seconds become millis.
//! Every issued ID depends on this layout, so it must not change.

use chrono::{DateTime, Months, Utc};
use herald_common::types::{Channel, Message, Template};

use crate::error::DispatchError;

pub const PREFIX: &str = "NS";

const TIMESTAMP_DIGITS: usize = 13;

/// Oldest accepted timestamp, relative to now.
const MAX_AGE: Months = Months::new(36);
/// Furthest accepted future timestamp, relative to now.
const MAX_LEAD: Months = Months::new(12);

/// Build the ID for a message. Pure: equal inputs give equal IDs.
pub fn generate(
    channel: Channel,
    template: Template,
    user_id: i64,
    timestamp: i64,
    external_id: i64,
) -> String {
    format!(
        "{}-{:03}-{:03}-{:019}-{}-{:019}",
        PREFIX,
        channel.code(),
        template.code(),
        user_id,
        pad_timestamp(timestamp),
        external_id
    )
}

/// Right-pad `timestamp` with zeros to 13 digits.
pub fn pad_timestamp(timestamp: i64) -> String {
    format!("{:0<width$}", timestamp.to_string(), width = TIMESTAMP_DIGITS)
}

/// Split an ID into its fields and check channel and template membership.
///
/// User existence and the timestamp window need outside state and are
/// checked by the dispatcher. The returned message has null params.
pub fn decode(id: &str) -> Result<Message, DispatchError> {
    if id.is_empty() {
        return Err(DispatchError::InvalidMessageId);
    }

    let segments: Vec<&str> = id.split('-').collect();
    let [prefix, channel, template, user_id, timestamp, external_id] = segments.as_slice() else {
        return Err(DispatchError::InvalidMessageId);
    };

    if *prefix != PREFIX {
        return Err(DispatchError::InvalidMessageId);
    }

    let channel = parse_segment(channel)?;
    let template = parse_segment(template)?;
    let user_id = parse_segment(user_id)?;
    let timestamp = parse_segment(timestamp)?;
    let external_id = parse_segment(external_id)?;

    let channel = Channel::from_code(channel).ok_or(DispatchError::InvalidChannel)?;
    let template = Template::from_code(template).ok_or(DispatchError::InvalidTemplate)?;

    Ok(Message {
        id: id.to_string(),
        user_id,
        channel,
        template,
        timestamp,
        external_id,
        params: serde_json::Value::Null,
    })
}

/// Reject timestamps outside `[now - 3 years, now + 1 year]`.
pub fn check_timestamp(timestamp: i64, now: DateTime<Utc>) -> Result<(), DispatchError> {
    let at = DateTime::from_timestamp_millis(timestamp).ok_or(DispatchError::InvalidTimestamp)?;
    let earliest = now
        .checked_sub_months(MAX_AGE)
        .ok_or(DispatchError::InvalidTimestamp)?;
    let latest = now
        .checked_add_months(MAX_LEAD)
        .ok_or(DispatchError::InvalidTimestamp)?;

    if at < earliest || at > latest {
        return Err(DispatchError::InvalidTimestamp);
    }

    Ok(())
}

/// Digits only; signs, blanks and letters are rejected.
fn parse_segment(segment: &str) -> Result<i64, DispatchError> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DispatchError::InvalidMessageId);
    }
    segment
        .parse()
        .map_err(|_| DispatchError::InvalidMessageId)
}
