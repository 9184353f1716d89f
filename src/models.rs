// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// fund -> asset type -> details
pub type AssetMap = BTreeMap<String, BTreeMap<String, AssetDetails>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDetails {
    pub amount: Decimal,
    pub display_title: String,
    pub open_date: Option<NaiveDate>,
    pub index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub company_name: Option<String>,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub dob: Option<NaiveDate>,
    pub initial_margin: Decimal,
    pub notes: Option<String>,
    pub assets: AssetMap,
    pub connected_users: Vec<String>,
    pub uid: Option<String>,
    pub uid_grants: Vec<String>,
    pub ytd: Decimal,
    pub total_ytd: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }

    /// Every string an activity recipient may legitimately carry for this client.
    pub fn recipient_names(&self) -> Vec<String> {
        let mut names = vec![self.full_name()];
        if let Some(company) = self.company_name.as_deref().filter(|c| !c.trim().is_empty()) {
            names.push(company.trim().to_string());
        }
        for asset_types in self.assets.values() {
            for details in asset_types.values() {
                if !names.contains(&details.display_title) {
                    names.push(details.display_title.clone());
                }
            }
        }
        names
    }

    pub fn asset_total(&self, fund: &str) -> Decimal {
        self.assets
            .get(fund)
            .map(|m| m.values().map(|a| a.amount).sum())
            .unwrap_or(Decimal::ZERO)
    }
}

/// Form input for creating or editing a client. Fields left as `None` are
/// untouched on edit and missing on create.
#[derive(Debug, Clone, Default)]
pub struct ClientForm {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub dob: Option<NaiveDate>,
    pub initial_margin: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityType {
    Deposit,
    Withdrawal,
    Profit,
    Income,
    ManualEntry,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Deposit => "deposit",
            ActivityType::Withdrawal => "withdrawal",
            ActivityType::Profit => "profit",
            ActivityType::Income => "income",
            ActivityType::ManualEntry => "manual-entry",
        }
    }

    /// Counts toward YTD when booked against the primary fund.
    pub fn is_ytd_qualifying(&self) -> bool {
        matches!(self, ActivityType::Profit | ActivityType::Income)
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deposit" => Ok(ActivityType::Deposit),
            "withdrawal" => Ok(ActivityType::Withdrawal),
            "profit" => Ok(ActivityType::Profit),
            "income" => Ok(ActivityType::Income),
            "manual-entry" | "manual_entry" | "manual" => Ok(ActivityType::ManualEntry),
            other => Err(anyhow::anyhow!("Unknown activity type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub client_id: String,
    pub activity_type: ActivityType,
    pub amount: Decimal,
    pub fund: String,
    pub recipient: String,
    pub time: DateTime<Utc>,
    pub send_notif: bool,
    pub is_dividend: bool,
    pub parent_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityForm {
    pub activity_type: Option<ActivityType>,
    pub amount: Option<Decimal>,
    pub fund: Option<String>,
    pub recipient: Option<String>,
    pub time: Option<DateTime<Utc>>,
    pub send_notif: Option<bool>,
    pub is_dividend: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub uid: String,
    pub client_id: String,
    pub activity_id: String,
    pub activity_type: ActivityType,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}
