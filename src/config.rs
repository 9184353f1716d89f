// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::env;

pub const LOG_ENV: &str = "FUNDCLIP_LOG";
pub const PUSH_URL_ENV: &str = "FUNDCLIP_PUSH_URL";
pub const PUSH_KEY_ENV: &str = "FUNDCLIP_PUSH_KEY";

const DEFAULT_LOG_FILTER: &str = "fundclip=info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushConfig {
    pub url: String,
    pub server_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_filter: String,
    pub push: Option<PushConfig>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let push = non_empty(PUSH_URL_ENV).map(|url| PushConfig {
            url,
            server_key: non_empty(PUSH_KEY_ENV),
        });
        Config {
            log_filter: non_empty(LOG_ENV).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            push,
        }
    }
}

pub fn init_tracing(config: &Config) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
