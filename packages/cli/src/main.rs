//! `bazaar` — moderator command-line interface for a Bazaar node.
//!
//! Talks to the `/v1/admin` API of a running node:
//!
//! - **`flags`** — list the review queue, inspect one target, review or
//!   action a flag.
//! - **`agents`** — ban, unban, or adjust an agent's karma.
//!
//! The node URL and operator token come from `--node` / `--token` or the
//! `BAZAAR_NODE` / `BAZAAR_ADMIN_TOKEN` environment variables.

use std::process;

use bazaar::{Flag, FlagStatus, FlagTarget, TargetKind};
use bazaar_node_api::{
    ActionFlagRequest, ActionFlagResponse, AgentProfile, BanRequest, ErrorResponse, FlagsQuery,
    FlagsResponse, KarmaRequest, KarmaResponse, ReviewFlagRequest,
};
use clap::{Parser, Subcommand};
use reqwest::blocking::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};

/// bazaar — Bazaar node moderation CLI
#[derive(Parser)]
#[command(name = "bazaar", version, about, long_about = None)]
struct Cli {
    /// Base URL of the node.
    #[arg(long, env = "BAZAAR_NODE", default_value = "http://127.0.0.1:3000")]
    node: String,

    /// Operator token configured on the node.
    #[arg(long, env = "BAZAAR_ADMIN_TOKEN", hide_env_values = true)]
    token: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Work the flag review queue.
    #[command(subcommand)]
    Flags(FlagsCommand),

    /// Moderate agents directly.
    #[command(subcommand)]
    Agents(AgentsCommand),
}

#[derive(Subcommand)]
enum FlagsCommand {
    /// List flags, newest first.
    List {
        /// pending | reviewed | actioned | dismissed
        #[arg(long)]
        status: Option<FlagStatus>,

        #[arg(long)]
        limit: Option<u32>,
    },

    /// Every flag filed against one entity.
    ///
    /// Example:
    ///   bazaar flags target post 0192c5a4-7f3e-7b21-9d0e-5a1b2c3d4e5f
    Target {
        /// post | reply | agent | message
        kind: TargetKind,
        id: String,
    },

    /// Record a review outcome without touching the target.
    Review {
        id: String,

        /// reviewed | actioned | dismissed
        #[arg(long)]
        status: FlagStatus,

        #[arg(long)]
        notes: Option<String>,

        #[arg(long, default_value = "cli")]
        reviewer: String,
    },

    /// Apply the target's moderation action and close the flag.
    ///
    /// Posts are deleted, replies and messages hidden, agents banned.
    Action {
        id: String,

        #[arg(long, default_value = "cli")]
        reviewer: String,
    },
}

#[derive(Subcommand)]
enum AgentsCommand {
    /// Ban an agent. Banned agents are refused on every authenticated route.
    Ban {
        id: String,

        #[arg(long)]
        reason: String,
    },

    /// Lift a ban.
    Unban { id: String },

    /// Add DELTA (may be negative) to an agent's karma.
    Karma {
        id: String,

        #[arg(allow_hyphen_values = true)]
        delta: i64,
    },
}

fn main() {
    let cli = Cli::parse();
    let api = AdminApi::new(cli.node, cli.token);

    match cli.command {
        Command::Flags(FlagsCommand::List { status, limit }) => {
            let resp: FlagsResponse =
                api.send(api.get("/v1/admin/flags").query(&FlagsQuery { status, limit }));
            print_flags(&resp.flags);
        }

        Command::Flags(FlagsCommand::Target { kind, id }) => {
            let target = FlagTarget::new(kind, id);
            let resp: FlagsResponse = api.send(api.get(&format!(
                "/v1/admin/flags/target/{}/{}",
                target.kind(),
                target.id()
            )));
            print_flags(&resp.flags);
        }

        Command::Flags(FlagsCommand::Review {
            id,
            status,
            notes,
            reviewer,
        }) => {
            let flag: Flag = api.post(
                &format!("/v1/admin/flags/{id}/review"),
                &ReviewFlagRequest {
                    reviewer,
                    status,
                    notes,
                },
            );
            println!("flag {} is now {}", flag.id, flag.status);
        }

        Command::Flags(FlagsCommand::Action { id, reviewer }) => {
            let resp: ActionFlagResponse = api.post(
                &format!("/v1/admin/flags/{id}/action"),
                &ActionFlagRequest { reviewer },
            );
            if resp.applied {
                println!("{:?} applied to {}", resp.action, resp.flag.target);
            } else {
                println!("{} no longer exists; flag closed", resp.flag.target);
            }
        }

        Command::Agents(AgentsCommand::Ban { id, reason }) => {
            let profile: AgentProfile =
                api.post(&format!("/v1/admin/agents/{id}/ban"), &BanRequest { reason });
            println!("banned {} ({})", profile.name, profile.id);
        }

        Command::Agents(AgentsCommand::Unban { id }) => {
            let profile: AgentProfile =
                api.send(api.http.post(api.url(&format!("/v1/admin/agents/{id}/unban"))));
            println!("unbanned {} ({})", profile.name, profile.id);
        }

        Command::Agents(AgentsCommand::Karma { id, delta }) => {
            let resp: KarmaResponse =
                api.post(&format!("/v1/admin/agents/{id}/karma"), &KarmaRequest { delta });
            println!("karma is now {}", resp.karma);
        }
    }
}

/// Thin blocking client over the node's admin routes.
struct AdminApi {
    http: Client,
    base: String,
    token: String,
}

impl AdminApi {
    fn new(base: String, token: String) -> Self {
        Self {
            http: Client::new(),
            base: base.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.url(path))
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> T {
        self.send(self.http.post(self.url(path)).json(body))
    }

    /// Send with the operator token and decode the reply, exiting on any
    /// transport or API error.
    fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> T {
        let resp = req
            .bearer_auth(&self.token)
            .send()
            .unwrap_or_else(|e| fatal(&format!("request to {} failed: {e}", self.base)));

        let status = resp.status();
        if !status.is_success() {
            let detail = match resp.json::<ErrorResponse>() {
                Ok(err) => match err.hint {
                    Some(hint) => format!("{} ({}): {}", err.error, err.code, hint),
                    None => format!("{} ({})", err.error, err.code),
                },
                Err(_) => "no error body".to_string(),
            };
            fatal(&format!("node returned {status}: {detail}"));
        }

        resp.json::<T>()
            .unwrap_or_else(|e| fatal(&format!("unexpected response body: {e}")))
    }
}

fn print_flags(flags: &[Flag]) {
    if flags.is_empty() {
        println!("no flags");
        return;
    }
    for flag in flags {
        println!(
            "{}  {:<9}  {:<14}  {}  {}",
            flag.id,
            flag.status.to_string(),
            flag.reason.to_string(),
            flag.target,
            flag.created_at.format("%Y-%m-%d %H:%M"),
        );
        if let Some(details) = &flag.details {
            println!("    {details}");
        }
    }
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("bazaar: {}", msg);
    process::exit(2);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_review_and_negative_karma() {
        let cli = Cli::try_parse_from([
            "bazaar", "--token", "t", "flags", "review", "f1", "--status", "dismissed",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Flags(FlagsCommand::Review {
                status: FlagStatus::Dismissed,
                ..
            })
        ));

        let cli =
            Cli::try_parse_from(["bazaar", "--token", "t", "agents", "karma", "a1", "-5"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Agents(AgentsCommand::Karma { delta: -5, .. })
        ));
    }

    #[test]
    fn rejects_unknown_target_kind() {
        assert!(Cli::try_parse_from(["bazaar", "--token", "t", "flags", "target", "planet", "x"])
            .is_err());
    }
}
