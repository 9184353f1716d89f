// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, value_parser};

fn json_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as pretty JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print as JSON lines"),
    )
}

fn opt(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).num_args(1).help(help)
}

fn req(name: &'static str, help: &'static str) -> Arg {
    opt(name, help).required(true)
}

fn client_form_args(cmd: Command, required: bool) -> Command {
    let field = |name: &'static str, help: &'static str| {
        if required { req(name, help) } else { opt(name, help) }
    };
    cmd.arg(field("first", "First name"))
        .arg(field("last", "Last name"))
        .arg(opt("company", "Company name"))
        .arg(field("email", "Contact email"))
        .arg(field("phone", "Contact phone"))
        .arg(field("address", "Postal address"))
        .arg(opt("dob", "Date of birth YYYY-MM-DD"))
        .arg(opt("initial-margin", "Initial margin amount"))
        .arg(opt("notes", "Free-form notes"))
}

fn activity_form_args(cmd: Command) -> Command {
    cmd.arg(opt("type", "deposit | withdrawal | profit | income | manual-entry"))
        .arg(opt("amount", "Amount (positive)"))
        .arg(opt("fund", "Fund the activity is booked against"))
        .arg(opt("recipient", "Recipient name (defaults to the client's full name)"))
        .arg(opt("time", "Timestamp, RFC 3339 or YYYY-MM-DD"))
        .arg(
            Arg::new("notify")
                .long("notify")
                .action(ArgAction::SetTrue)
                .help("Send a notification to the client's linked account"),
        )
        .arg(
            Arg::new("dividend")
                .long("dividend")
                .action(ArgAction::SetTrue)
                .help("Mark the activity as a dividend"),
        )
}

pub fn build_cli() -> Command {
    Command::new("fundclip")
        .about("Client and fund administration")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand(Command::new("init").about("Initialize the database"))
        .subcommand(
            Command::new("client")
                .about("Manage clients")
                .subcommand(client_form_args(Command::new("add"), true))
                .subcommand(json_args(Command::new("list")))
                .subcommand(json_args(Command::new("show").arg(req("id", "Client id"))))
                .subcommand(client_form_args(
                    Command::new("edit").arg(req("id", "Client id")),
                    false,
                ))
                .subcommand(
                    Command::new("rm").arg(req("id", "Client id")).arg(
                        Arg::new("purge-activities")
                            .long("purge-activities")
                            .action(ArgAction::SetTrue)
                            .help("Also delete the client's activities"),
                    ),
                )
                .subcommand(
                    Command::new("connect")
                        .arg(req("id", "Client id"))
                        .arg(req("peer", "Peer client id")),
                )
                .subcommand(
                    Command::new("disconnect")
                        .arg(req("id", "Client id"))
                        .arg(req("peer", "Peer client id")),
                )
                .subcommand(
                    Command::new("link")
                        .arg(req("id", "Client id"))
                        .arg(req("uid", "Authentication id")),
                )
                .subcommand(Command::new("unlink").arg(req("id", "Client id"))),
        )
        .subcommand(
            Command::new("asset")
                .about("Manage fund assets held by a client")
                .subcommand(
                    Command::new("set")
                        .arg(req("client", "Client id"))
                        .arg(req("fund", "Fund name"))
                        .arg(req("type", "Asset type, e.g. personal, ira, company"))
                        .arg(req("amount", "Asset amount"))
                        .arg(opt("title", "Display title"))
                        .arg(opt("date", "Open date YYYY-MM-DD"))
                        .arg(
                            Arg::new("index")
                                .long("index")
                                .num_args(1)
                                .value_parser(value_parser!(u32))
                                .help("Display order within the fund"),
                        ),
                )
                .subcommand(
                    Command::new("rename")
                        .arg(req("client", "Client id"))
                        .arg(req("fund", "Fund name"))
                        .arg(req("type", "Asset type"))
                        .arg(req("title", "New display title")),
                )
                .subcommand(
                    Command::new("rm")
                        .arg(req("client", "Client id"))
                        .arg(req("fund", "Fund name"))
                        .arg(req("type", "Asset type")),
                )
                .subcommand(json_args(
                    Command::new("list").arg(req("client", "Client id")),
                )),
        )
        .subcommand(
            Command::new("activity")
                .about("Record deposits, withdrawals and profits")
                .subcommand(activity_form_args(
                    Command::new("add").arg(req("client", "Client id")),
                ))
                .subcommand(json_args(
                    Command::new("list")
                        .arg(opt("client", "Filter by client id"))
                        .arg(opt("fund", "Filter by fund"))
                        .arg(opt("year", "Filter by calendar year"))
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .num_args(1)
                                .value_parser(value_parser!(usize)),
                        ),
                ))
                .subcommand(
                    activity_form_args(Command::new("edit").arg(req("id", "Activity id")))
                        .arg(
                            Arg::new("no-notify")
                                .long("no-notify")
                                .action(ArgAction::SetTrue)
                                .conflicts_with("notify"),
                        )
                        .arg(
                            Arg::new("no-dividend")
                                .long("no-dividend")
                                .action(ArgAction::SetTrue)
                                .conflicts_with("dividend"),
                        ),
                )
                .subcommand(Command::new("rm").arg(req("id", "Activity id"))),
        )
        .subcommand(
            Command::new("ytd")
                .about("Year-to-date profit aggregation")
                .subcommand(json_args(
                    Command::new("show").arg(opt("client", "Client id (all when omitted)")),
                ))
                .subcommand(
                    Command::new("recompute").arg(opt("client", "Client id (all when omitted)")),
                ),
        )
        .subcommand(
            Command::new("notification")
                .about("Activity notifications")
                .subcommand(json_args(
                    Command::new("list").arg(req("uid", "Account id")).arg(
                        Arg::new("unread")
                            .long("unread")
                            .action(ArgAction::SetTrue),
                    ),
                ))
                .subcommand(Command::new("read").arg(req("id", "Notification id"))),
        )
        .subcommand(
            Command::new("device")
                .about("Push delivery registrations")
                .subcommand(
                    Command::new("add")
                        .arg(req("uid", "Account id"))
                        .arg(req("token", "Device token")),
                )
                .subcommand(
                    Command::new("rm")
                        .arg(req("uid", "Account id"))
                        .arg(req("token", "Device token")),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Settings")
                .subcommand(Command::new("show"))
                .subcommand(Command::new("set-fund").arg(req("fund", "Primary fund"))),
        )
        .subcommand(Command::new("doctor").about("Check data consistency"))
}
