// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Push delivery for activity notifications.

use crate::config::PushConfig;
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub client_id: String,
    pub activity_id: String,
}

pub trait PushSender {
    /// Delivers `msg` to each device token. Returns how many were accepted.
    fn send(&self, tokens: &[String], msg: &PushMessage) -> Result<usize>;
}

/// Logs messages instead of delivering them.
#[derive(Debug, Default)]
pub struct LogPushSender;

impl PushSender for LogPushSender {
    fn send(&self, tokens: &[String], msg: &PushMessage) -> Result<usize> {
        info!(
            devices = tokens.len(),
            title = %msg.title,
            activity_id = %msg.activity_id,
            "push delivery disabled; message logged"
        );
        Ok(0)
    }
}

#[derive(Serialize)]
struct PushPayload<'a> {
    to: &'a str,
    notification: PushNotification<'a>,
    data: &'a PushMessage,
}

#[derive(Serialize)]
struct PushNotification<'a> {
    title: &'a str,
    body: &'a str,
}

pub struct HttpPushSender {
    client: reqwest::blocking::Client,
    config: PushConfig,
}

impl HttpPushSender {
    pub fn new(config: PushConfig) -> Result<Self> {
        Ok(HttpPushSender {
            client: crate::utils::http_client()?,
            config,
        })
    }
}

impl HttpPushSender {
    fn send_one(&self, token: &str, msg: &PushMessage) -> Result<()> {
        let payload = PushPayload {
            to: token,
            notification: PushNotification {
                title: &msg.title,
                body: &msg.body,
            },
            data: msg,
        };
        let mut req = self.client.post(&self.config.url).json(&payload);
        if let Some(ref key) = self.config.server_key {
            req = req.header(reqwest::header::AUTHORIZATION, format!("key={}", key));
        }
        req.send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Push to {} failed", self.config.url))?;
        Ok(())
    }
}

impl PushSender for HttpPushSender {
    /// Tries every token. Fails only when no token was accepted.
    fn send(&self, tokens: &[String], msg: &PushMessage) -> Result<usize> {
        let mut delivered = 0;
        let mut last_err = None;
        for token in tokens {
            match self.send_one(token, msg) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(token = %token, error = %err, "push delivery failed");
                    last_err = Some(err);
                }
            }
        }
        match last_err {
            Some(err) if delivered == 0 => Err(err),
            _ => Ok(delivered),
        }
    }
}

pub fn sender_for(config: Option<&PushConfig>) -> Result<Box<dyn PushSender>> {
    match config {
        Some(c) => Ok(Box::new(HttpPushSender::new(c.clone())?)),
        None => Ok(Box::new(LogPushSender)),
    }
}
