// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::TriggerError;
use crate::models::{Activity, ActivityForm, ActivityType};
use crate::push::PushSender;
use crate::store::{self, ActivityFilter};
use crate::triggers::{self, TriggerEnv};
use crate::utils::{
    fmt_money, maybe_print_json, normalize_fund, parse_decimal, parse_timestamp, pretty_table,
};
use crate::validation::validate_activity;
use anyhow::{Context, Result, anyhow};
use chrono::{TimeZone, Utc};
use rusqlite::Connection;
use tracing::info;

pub fn handle(conn: &Connection, m: &clap::ArgMatches, push: &dyn PushSender) -> Result<()> {
    let env = TriggerEnv::load(conn, push)?;
    match m.subcommand() {
        Some(("add", sub)) => {
            let client = sub.get_one::<String>("client").unwrap().trim();
            let mut form = form_from_args(sub)?;
            if form.time.is_none() {
                form.time = Some(env.now);
            }
            let a = create_activity(conn, &env, client, form)?;
            println!(
                "Recorded {} of {} to {} in {} ({})",
                a.activity_type,
                fmt_money(&a.amount),
                a.recipient,
                a.fund,
                a.id
            );
        }
        Some(("list", sub)) => list(conn, sub)?,
        Some(("edit", sub)) => {
            let id = sub.get_one::<String>("id").unwrap().trim();
            let mut form = form_from_args(sub)?;
            if sub.get_flag("no-notify") {
                form.send_notif = Some(false);
            }
            if sub.get_flag("no-dividend") {
                form.is_dividend = Some(false);
            }
            let a = edit_activity(conn, &env, id, form)?;
            println!("Updated activity {}", a.id);
        }
        Some(("rm", sub)) => {
            let id = sub.get_one::<String>("id").unwrap().trim();
            let a = delete_activity(conn, &env, id)?;
            println!("Removed {} activity {}", a.activity_type, a.id);
        }
        _ => {}
    }
    Ok(())
}

pub fn form_from_args(sub: &clap::ArgMatches) -> Result<ActivityForm> {
    let text = |name: &str| {
        sub.get_one::<String>(name)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    Ok(ActivityForm {
        activity_type: text("type")
            .map(|s| s.parse::<ActivityType>())
            .transpose()?,
        amount: text("amount").map(|s| parse_decimal(&s)).transpose()?,
        fund: text("fund").map(|s| normalize_fund(&s)),
        recipient: text("recipient"),
        time: text("time").map(|s| parse_timestamp(&s)).transpose()?,
        send_notif: sub.get_flag("notify").then_some(true),
        is_dividend: sub.get_flag("dividend").then_some(true),
    })
}

/// Validates and records an activity for `client_id`, then runs the write hooks.
/// A missing recipient defaults to the client's full name.
pub fn create_activity(
    conn: &Connection,
    env: &TriggerEnv<'_>,
    client_id: &str,
    mut form: ActivityForm,
) -> Result<Activity> {
    let client = store::require_client(conn, client_id)?;
    if form.recipient.as_deref().is_none_or(|r| r.trim().is_empty()) {
        form.recipient = Some(client.full_name());
    }
    form.fund = form.fund.map(|f| normalize_fund(&f));
    validate_activity(&form, &client)?;

    let (Some(activity_type), Some(amount), Some(fund), Some(recipient), Some(time)) = (
        form.activity_type,
        form.amount,
        form.fund,
        form.recipient,
        form.time,
    ) else {
        return Err(anyhow!("Incomplete activity form"));
    };
    let activity = Activity {
        id: uuid::Uuid::new_v4().to_string(),
        client_id: client.id.clone(),
        activity_type,
        amount,
        fund,
        recipient: recipient.trim().to_string(),
        time,
        send_notif: form.send_notif.unwrap_or(false),
        is_dividend: form.is_dividend.unwrap_or(false),
        parent_name: client.full_name(),
    };
    store::insert_activity(conn, &activity)?;
    info!(activity_id = %activity.id, client_id = %client.id, kind = %activity.activity_type, "activity recorded");
    triggers::on_activity_created(conn, env, &activity);
    Ok(activity)
}

pub fn edit_activity(
    conn: &Connection,
    env: &TriggerEnv<'_>,
    id: &str,
    form: ActivityForm,
) -> Result<Activity> {
    let before = store::get_activity(conn, id)?
        .ok_or_else(|| TriggerError::NotFound(format!("activity '{}'", id)))?;
    let client = store::require_client(conn, &before.client_id)?;

    let merged = ActivityForm {
        activity_type: form.activity_type.or(Some(before.activity_type)),
        amount: form.amount.or(Some(before.amount)),
        fund: form
            .fund
            .map(|f| normalize_fund(&f))
            .or_else(|| Some(before.fund.clone())),
        recipient: form.recipient.or_else(|| Some(before.recipient.clone())),
        time: form.time.or(Some(before.time)),
        send_notif: form.send_notif.or(Some(before.send_notif)),
        is_dividend: form.is_dividend.or(Some(before.is_dividend)),
    };
    // Historical recipients may predate a rename; only re-check when changed.
    if merged.recipient.as_deref() == Some(before.recipient.as_str()) {
        let mut probe = merged.clone();
        probe.recipient = Some(client.full_name());
        validate_activity(&probe, &client)?;
    } else {
        validate_activity(&merged, &client)?;
    }

    let mut after = before.clone();
    after.activity_type = merged.activity_type.unwrap_or(before.activity_type);
    after.amount = merged.amount.unwrap_or(before.amount);
    after.fund = merged.fund.unwrap_or_else(|| before.fund.clone());
    after.recipient = merged
        .recipient
        .map(|r| r.trim().to_string())
        .unwrap_or_else(|| before.recipient.clone());
    after.time = merged.time.unwrap_or(before.time);
    after.send_notif = merged.send_notif.unwrap_or(before.send_notif);
    after.is_dividend = merged.is_dividend.unwrap_or(before.is_dividend);

    store::update_activity(conn, &after)?;
    triggers::on_activity_updated(conn, env, &before, &after);
    Ok(after)
}

pub fn delete_activity(conn: &Connection, env: &TriggerEnv<'_>, id: &str) -> Result<Activity> {
    let activity = store::get_activity(conn, id)?
        .ok_or_else(|| TriggerError::NotFound(format!("activity '{}'", id)))?;
    store::delete_activity(conn, id)?;
    info!(activity_id = id, client_id = %activity.client_id, "activity deleted");
    triggers::on_activity_deleted(conn, env, &activity);
    Ok(activity)
}

pub fn filter_from_args(sub: &clap::ArgMatches) -> Result<ActivityFilter> {
    let mut f = ActivityFilter {
        client_id: sub.get_one::<String>("client").map(|s| s.trim().to_string()),
        fund: sub.get_one::<String>("fund").map(|s| normalize_fund(s)),
        limit: sub.get_one::<usize>("limit").copied(),
        ..ActivityFilter::default()
    };
    if let Some(year) = sub.get_one::<String>("year") {
        let y: i32 = year
            .trim()
            .parse()
            .with_context(|| format!("Invalid year '{}'", year))?;
        let bound = |y: i32| {
            Utc.with_ymd_and_hms(y, 1, 1, 0, 0, 0)
                .single()
                .with_context(|| format!("Invalid year '{}'", y))
        };
        f.since = Some(bound(y)?);
        f.until = Some(bound(y + 1)?);
    }
    Ok(f)
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let data = store::list_activities(conn, &filter_from_args(sub)?)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows = data
            .iter()
            .map(|a| {
                vec![
                    a.time.format("%Y-%m-%d %H:%M").to_string(),
                    a.activity_type.to_string(),
                    a.fund.clone(),
                    a.recipient.clone(),
                    fmt_money(&a.amount),
                    if a.send_notif { "yes" } else { "" }.to_string(),
                    a.id.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Time", "Type", "Fund", "Recipient", "Amount", "Notified", "ID"],
                rows
            )
        );
    }
    Ok(())
}
