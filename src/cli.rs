//! Command line surface: options, merging with the settings file, and the
//! single line the monitoring agent reads.

use crate::config::{
    load_settings, Levels, Settings, CONNECTION_DEFAULT, REPLICATION_DEFAULT, UPTIME_DEFAULT,
};
use crate::core::*;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "check-mysql", version, about = "MySQL check plugin")]
pub struct Cli {
    /// Hostname
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,
    /// Port
    #[arg(short = 'P', long, global = true)]
    pub port: Option<u16>,
    /// Path to unix socket
    #[arg(short = 'S', long, global = true)]
    pub socket: Option<PathBuf>,
    /// Username
    #[arg(short = 'u', long, global = true)]
    pub user: Option<String>,
    /// Password
    #[arg(short = 'p', long, env = "MYSQL_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,
    /// Recorded query results to check against
    #[arg(long, global = true)]
    pub replay: Option<PathBuf>,
    /// Directory holding check-mysql.yml and its profiles
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Output::Text, global = true)]
    pub output: Output,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Alert when the server restarted recently
    Uptime(LevelArgs),
    /// Alert on the number of connected threads
    Connection(LevelArgs),
    /// Alert when replication stopped or lags behind
    Replication(LevelArgs),
    /// Alert when @@global.read_only differs from the expected value
    Readonly {
        #[arg(value_enum)]
        expect: Expect,
    },
    /// Alert on the Group Replication state of the local member
    GroupReplication(GroupArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct LevelArgs {
    #[arg(short, long, value_parser = finite)]
    pub warning: Option<f64>,
    #[arg(short, long, value_parser = finite)]
    pub critical: Option<f64>,
}

// NaN 会让所有比较都为假，直接当参数错误
fn finite(raw: &str) -> Result<f64, String> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(format!("{} is not a finite number", raw)),
        Err(err) => Err(err.to_string()),
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct GroupArgs {
    /// Local hostname as a group member (performance_schema.replication_group_members)
    #[arg(long, default_value = "")]
    pub local_hostname: String,
    /// Local port number as a group member
    #[arg(long, default_value = "3306")]
    pub local_port: String,
    /// Detect anomalies of other group members
    #[arg(short = 'g', long)]
    pub group_members: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    On,
    Off,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Output {
    #[default]
    Text,
    Json,
}

/// Command line first, then the profile, then the built-in pair.
fn levels(args: &LevelArgs, file: Levels, builtin: (f64, f64)) -> (f64, f64) {
    let merged = Levels {
        warning: args.warning,
        critical: args.critical,
    }
    .or(file);
    (
        merged.warning.unwrap_or(builtin.0),
        merged.critical.unwrap_or(builtin.1),
    )
}

impl Cli {
    /// Applies the command line on top of `settings` and picks the check.
    pub fn resolve(&self, mut settings: Settings) -> (Check, Settings) {
        let conn = &mut settings.connection;
        if let Some(host) = &self.host {
            conn.host = host.clone();
        }
        if let Some(port) = self.port {
            conn.port = port;
        }
        if self.socket.is_some() {
            conn.socket = self.socket.clone();
        }
        if let Some(user) = &self.user {
            conn.user = user.clone();
        }
        if self.password.is_some() {
            conn.password = self.password.clone();
        }
        if self.replay.is_some() {
            settings.replay = self.replay.clone();
        }

        let th = settings.thresholds;
        let check = match &self.command {
            Command::Uptime(args) => {
                let (w, c) = levels(args, th.uptime, UPTIME_DEFAULT);
                Check::Uptime(ThresholdSpec::lower(w, c))
            }
            Command::Connection(args) => {
                let (w, c) = levels(args, th.connection, CONNECTION_DEFAULT);
                Check::Connection(ThresholdSpec::upper(w, c))
            }
            Command::Replication(args) => {
                let (w, c) = levels(args, th.replication, REPLICATION_DEFAULT);
                Check::Replication(ThresholdSpec::upper(w, c))
            }
            Command::Readonly { expect } => Check::ReadOnly(match expect {
                Expect::On => ReadOnly::On,
                Expect::Off => ReadOnly::Off,
            }),
            Command::GroupReplication(args) => Check::GroupReplication {
                local_hostname: args.local_hostname.clone(),
                local_port: args.local_port.clone(),
                include_peers: args.group_members,
            },
        };
        (check, settings)
    }

    pub fn run(&self) -> Report {
        let settings = match &self.config_dir {
            Some(dir) => match load_settings(dir) {
                Ok(settings) => settings,
                Err(err) => {
                    tracing::warn!("{}", err);
                    let (check, _) = self.resolve(Settings::default());
                    return Report::new(check.name(), CheckResult::unknown(err.to_string()));
                }
            },
            None => Settings::default(),
        };
        let (check, settings) = self.resolve(settings);
        debug!(
            host = %settings.connection.host,
            port = settings.connection.port,
            user = %settings.connection.user,
            "target server"
        );

        let result = match &settings.replay {
            Some(path) => match ReplaySource::from_path(path) {
                Ok(mut source) => check.run(&Doctor::new(), &mut source),
                Err(err) => CheckResult::unknown(err.to_string()),
            },
            None => CheckResult::unknown("no metric source configured, pass --replay"),
        };
        Report::new(check.name(), result)
    }
}

/// What the plugin prints for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub name: String,
    #[serde(flatten)]
    pub result: CheckResult,
}

impl Report {
    pub fn new(check: &str, result: CheckResult) -> Report {
        Report {
            name: format!("MySQL {}", check),
            result,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.result.severity().exit_code()
    }

    pub fn render(&self, output: Output) -> String {
        let text = || {
            format!(
                "{} {}: {}",
                self.name,
                self.result.severity(),
                self.result.message()
            )
        };
        match output {
            Output::Text => text(),
            Output::Json => serde_json::to_string(self).unwrap_or_else(|_| text()),
        }
    }
}
