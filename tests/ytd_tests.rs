// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, TimeZone, Utc};
use fundclip::commands::{activities, clients};
use fundclip::models::{Activity, ActivityForm, ActivityType, Client, ClientForm};
use fundclip::push::LogPushSender;
use fundclip::triggers::{self, TriggerEnv};
use fundclip::{db, store, ytd};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::HashMap;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
}

fn env(push: &LogPushSender) -> TriggerEnv<'_> {
    TriggerEnv {
        primary_fund: "agq".into(),
        now: now(),
        push,
    }
}

fn client(conn: &Connection, first: &str, last: &str) -> Client {
    let form = ClientForm {
        first_name: Some(first.into()),
        last_name: Some(last.into()),
        email: Some(format!("{}@example.com", first.to_lowercase())),
        phone: Some("+1 555 010 2000".into()),
        address: Some("1 Main St".into()),
        ..ClientForm::default()
    };
    clients::create_client(conn, &form, now()).unwrap()
}

fn record(
    conn: &Connection,
    env: &TriggerEnv<'_>,
    client_id: &str,
    kind: ActivityType,
    amount: i64,
    fund: &str,
    time: DateTime<Utc>,
) -> Activity {
    let form = ActivityForm {
        activity_type: Some(kind),
        amount: Some(Decimal::from(amount)),
        fund: Some(fund.into()),
        time: Some(time),
        ..ActivityForm::default()
    };
    activities::create_activity(conn, env, client_id, form).unwrap()
}

#[test]
fn ytd_counts_only_primary_fund_profit_and_income_this_year() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let a = client(&conn, "Jane", "Doe");

    record(&conn, &env, &a.id, ActivityType::Profit, 100, "agq", at(2025, 3, 1));
    record(&conn, &env, &a.id, ActivityType::Income, 50, "agq", at(2025, 5, 1));
    record(&conn, &env, &a.id, ActivityType::Deposit, 1000, "agq", at(2025, 2, 1));
    record(&conn, &env, &a.id, ActivityType::Profit, 70, "ak1", at(2025, 4, 1));
    record(&conn, &env, &a.id, ActivityType::Profit, 30, "agq", at(2024, 12, 31));
    record(&conn, &env, &a.id, ActivityType::Profit, 5, "agq", at(2026, 1, 2));

    let fresh = ytd::client_ytd(&conn, &a.id, "agq", now()).unwrap();
    assert_eq!(fresh, Decimal::from(150));
    assert_eq!(store::get_ytd(&conn, &a.id).unwrap(), Some(Decimal::from(150)));

    let stored = store::require_client(&conn, &a.id).unwrap();
    assert_eq!(stored.total_ytd, Decimal::from(150));
}

#[test]
fn total_ytd_counts_each_client_once_around_a_cycle() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let a = client(&conn, "Ann", "A");
    let b = client(&conn, "Bob", "B");
    let c = client(&conn, "Cat", "C");
    record(&conn, &env, &a.id, ActivityType::Profit, 150, "agq", at(2025, 1, 10));
    record(&conn, &env, &b.id, ActivityType::Profit, 20, "agq", at(2025, 1, 10));
    record(&conn, &env, &c.id, ActivityType::Income, 10, "agq", at(2025, 1, 10));

    triggers::connect_users(&conn, &env, &a.id, &b.id).unwrap();
    triggers::connect_users(&conn, &env, &b.id, &c.id).unwrap();
    triggers::connect_users(&conn, &env, &c.id, &a.id).unwrap();

    for id in [&a.id, &b.id, &c.id] {
        assert_eq!(
            ytd::total_ytd(&conn, id, "agq", now()).unwrap(),
            Decimal::from(180)
        );
        assert_eq!(
            store::require_client(&conn, id).unwrap().total_ytd,
            Decimal::from(180)
        );
    }

    // A new profit on C reaches every client that can see C.
    record(&conn, &env, &c.id, ActivityType::Profit, 5, "agq", at(2025, 6, 1));
    for id in [&a.id, &b.id, &c.id] {
        assert_eq!(
            store::require_client(&conn, id).unwrap().total_ytd,
            Decimal::from(185)
        );
    }
}

#[test]
fn one_way_connection_only_feeds_the_holder() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let a = client(&conn, "Ann", "A");
    let b = client(&conn, "Bob", "B");
    record(&conn, &env, &a.id, ActivityType::Profit, 40, "agq", at(2025, 2, 2));
    record(&conn, &env, &b.id, ActivityType::Profit, 60, "agq", at(2025, 2, 2));

    triggers::connect_users(&conn, &env, &a.id, &b.id).unwrap();
    assert_eq!(store::require_client(&conn, &a.id).unwrap().total_ytd, Decimal::from(100));
    assert_eq!(store::require_client(&conn, &b.id).unwrap().total_ytd, Decimal::from(60));

    triggers::disconnect_users(&conn, &env, &a.id, &b.id).unwrap();
    assert_eq!(store::require_client(&conn, &a.id).unwrap().total_ytd, Decimal::from(40));
}

#[test]
fn deleting_an_activity_lowers_ytd() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let a = client(&conn, "Ann", "A");
    let keep = record(&conn, &env, &a.id, ActivityType::Profit, 40, "agq", at(2025, 2, 2));
    let removed = record(&conn, &env, &a.id, ActivityType::Profit, 60, "agq", at(2025, 2, 3));
    assert_eq!(store::get_ytd(&conn, &a.id).unwrap(), Some(Decimal::from(100)));

    activities::delete_activity(&conn, &env, &removed.id).unwrap();
    assert_eq!(store::get_ytd(&conn, &a.id).unwrap(), Some(Decimal::from(40)));

    let edit = ActivityForm {
        amount: Some(Decimal::from(45)),
        ..ActivityForm::default()
    };
    activities::edit_activity(&conn, &env, &keep.id, edit).unwrap();
    assert_eq!(store::get_ytd(&conn, &a.id).unwrap(), Some(Decimal::from(45)));
}

#[test]
fn recompute_all_repairs_stale_caches() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let a = client(&conn, "Ann", "A");
    let b = client(&conn, "Bob", "B");
    triggers::connect_users(&conn, &env, &a.id, &b.id).unwrap();
    record(&conn, &env, &b.id, ActivityType::Profit, 25, "agq", at(2025, 3, 3));
    store::set_total_ytd(&conn, &a.id, Decimal::from(999)).unwrap();
    store::set_ytd(&conn, &b.id, Decimal::ZERO).unwrap();

    let rows = ytd::recompute_all(&conn, "agq", now()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(store::require_client(&conn, &a.id).unwrap().total_ytd, Decimal::from(25));
    assert_eq!(store::get_ytd(&conn, &b.id).unwrap(), Some(Decimal::from(25)));
}

fn adjacency(edges: &[(&str, &[&str])]) -> ytd::Adjacency {
    edges
        .iter()
        .map(|(id, peers)| (id.to_string(), peers.iter().map(|p| p.to_string()).collect()))
        .collect::<HashMap<_, _>>()
}

#[test]
fn reachable_from_dedupes_diamonds_and_skips_dangling_ids() {
    let adj = adjacency(&[
        ("a", &["b", "c", "ghost"]),
        ("b", &["d"]),
        ("c", &["d"]),
        ("d", &[]),
    ]);
    let order = ytd::reachable_from(&adj, "a");
    assert_eq!(order.len(), 4);
    assert_eq!(order[0], "a");
    assert_eq!(order.iter().filter(|id| id.as_str() == "d").count(), 1);
    assert!(!order.iter().any(|id| id == "ghost"));

    assert!(ytd::reachable_from(&adj, "ghost").is_empty());
}

#[test]
fn clients_reaching_walks_edges_backwards() {
    let adj = adjacency(&[("a", &["b"]), ("b", &["c"]), ("c", &[]), ("x", &["c"]), ("y", &[])]);
    let mut reaching = ytd::clients_reaching(&adj, "c");
    reaching.sort();
    assert_eq!(reaching, vec!["a", "b", "c", "x"]);
}

#[test]
fn editing_a_profit_out_of_the_primary_fund_drops_it_from_ytd() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let a = client(&conn, "Ann", "A");
    let holder = client(&conn, "Hal", "H");
    triggers::connect_users(&conn, &env, &holder.id, &a.id).unwrap();
    let moved = record(&conn, &env, &a.id, ActivityType::Profit, 80, "agq", at(2025, 3, 3));
    let retyped = record(&conn, &env, &a.id, ActivityType::Income, 20, "agq", at(2025, 3, 4));
    assert_eq!(store::require_client(&conn, &holder.id).unwrap().total_ytd, Decimal::from(100));

    let to_other_fund = ActivityForm {
        fund: Some("AK1".into()),
        ..ActivityForm::default()
    };
    let edited = activities::edit_activity(&conn, &env, &moved.id, to_other_fund).unwrap();
    assert_eq!(edited.fund, "ak1");
    assert_eq!(store::get_ytd(&conn, &a.id).unwrap(), Some(Decimal::from(20)));
    assert_eq!(store::require_client(&conn, &holder.id).unwrap().total_ytd, Decimal::from(20));

    let to_deposit = ActivityForm {
        activity_type: Some(ActivityType::Deposit),
        ..ActivityForm::default()
    };
    activities::edit_activity(&conn, &env, &retyped.id, to_deposit).unwrap();
    assert_eq!(store::get_ytd(&conn, &a.id).unwrap(), Some(Decimal::ZERO));
    assert_eq!(store::require_client(&conn, &holder.id).unwrap().total_ytd, Decimal::ZERO);
}
