//! The checks the plugin can run. Each one pulls what it needs from a
//! [`MetricSource`] and returns exactly one [`CheckResult`]; a failure to get
//! the inputs becomes UNKNOWN and stops the check.

use crate::core::doctor::Doctor;
use crate::core::ent::*;
use crate::core::group;
use crate::core::source::{MetricSource, Query, Row, SourceError};
use chrono::Duration;
use thiserror::Error;

pub const UPTIME: Query = Query {
    name: "uptime",
    sql: "SHOW GLOBAL STATUS LIKE 'Uptime'",
};

pub const THREADS_CONNECTED: Query = Query {
    name: "threads_connected",
    sql: "SHOW GLOBAL STATUS LIKE 'Threads_connected'",
};

pub const REPLICA_STATUS: Query = Query {
    name: "replica_status",
    sql: "SHOW SLAVE STATUS",
};

pub const READ_ONLY: Query = Query {
    name: "read_only",
    sql: "SELECT @@global.read_only AS read_only",
};

pub const LOCAL_MEMBER_STATE: Query = Query {
    name: "local_member_state",
    sql: "SELECT MEMBER_STATE \
          FROM performance_schema.replication_group_members \
          WHERE MEMBER_HOST = ? AND MEMBER_PORT = ?",
};

pub const ANOMALOUS_MEMBERS: Query = Query {
    name: "anomalous_members",
    sql: "SELECT MEMBER_HOST, MEMBER_PORT, MEMBER_STATE \
          FROM performance_schema.replication_group_members \
          WHERE MEMBER_STATE NOT IN ('ONLINE', 'RECOVERING') \
          AND NOT (MEMBER_HOST = ? AND MEMBER_PORT = ?) \
          ORDER BY MEMBER_HOST",
};

#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("{host}:{port} is not a group member")]
    NotGroupMember { host: String, port: String },
    #[error("missing expected row for {0}")]
    MissingRow(&'static str),
}

impl From<CheckError> for CheckResult {
    fn from(err: CheckError) -> Self {
        tracing::warn!("check aborted: {}", err);
        CheckResult::unknown(err.to_string())
    }
}

/// Expected value of `@@global.read_only`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOnly {
    On,
    Off,
}

impl ReadOnly {
    fn as_str(self) -> &'static str {
        match self {
            ReadOnly::On => "ON",
            ReadOnly::Off => "OFF",
        }
    }
}

/// One invocation's worth of work.
#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    Uptime(ThresholdSpec),
    Connection(ThresholdSpec),
    Replication(ThresholdSpec),
    ReadOnly(ReadOnly),
    GroupReplication {
        local_hostname: String,
        local_port: String,
        include_peers: bool,
    },
}

impl Check {
    pub fn name(&self) -> &'static str {
        match self {
            Check::Uptime(_) => "Uptime",
            Check::Connection(_) => "Connection",
            Check::Replication(_) => "Replication",
            Check::ReadOnly(_) => "Readonly",
            Check::GroupReplication { .. } => "Group Replication",
        }
    }

    pub fn run<S: MetricSource>(&self, dc: &Doctor, source: &mut S) -> CheckResult {
        let result = match self {
            Check::Uptime(spec) => uptime(dc, source, spec),
            Check::Connection(spec) => connection(dc, source, spec),
            Check::Replication(spec) => replication(dc, source, spec),
            Check::ReadOnly(expected) => read_only(source, *expected),
            Check::GroupReplication {
                local_hostname,
                local_port,
                include_peers,
            } => group_replication(dc, source, local_hostname, local_port, *include_peers),
        };
        let result = result.unwrap_or_else(CheckResult::from);
        tracing::info!(check = self.name(), severity = %result.severity(), "check finished");
        result
    }
}

fn first_row(rows: Vec<Row>, query: &Query) -> Result<Row, CheckError> {
    rows.into_iter()
        .next()
        .ok_or(CheckError::MissingRow(query.name))
}

fn uptime<S: MetricSource>(
    dc: &Doctor,
    source: &mut S,
    spec: &ThresholdSpec,
) -> Result<CheckResult, CheckError> {
    let row = first_row(source.query(&UPTIME, &[])?, &UPTIME)?;
    let secs = row.num("Value")?;
    let severity = dc.check_value(secs, spec);
    Ok(CheckResult::new(severity, format!("up {}", format_uptime(secs))))
}

// 形如 "3 days, 04:05:06"
fn format_uptime(secs: f64) -> String {
    let d = Duration::seconds(secs.clamp(0.0, 1e12) as i64);
    format!(
        "{} days, {:02}:{:02}:{:02}",
        d.num_days(),
        d.num_hours() % 24,
        d.num_minutes() % 60,
        d.num_seconds() % 60
    )
}

fn connection<S: MetricSource>(
    dc: &Doctor,
    source: &mut S,
    spec: &ThresholdSpec,
) -> Result<CheckResult, CheckError> {
    let row = first_row(
        source.query(&THREADS_CONNECTED, &[])?,
        &THREADS_CONNECTED,
    )?;
    let current = row.num("Value")?;
    Ok(CheckResult::new(
        dc.check_value(current, spec),
        format!("{} connections", current),
    ))
}

fn replication<S: MetricSource>(
    dc: &Doctor,
    source: &mut S,
    spec: &ThresholdSpec,
) -> Result<CheckResult, CheckError> {
    let row = match source.query(&REPLICA_STATUS, &[])?.into_iter().next() {
        Some(row) => row,
        None => return Ok(CheckResult::ok("MySQL is not slave")),
    };

    let io = row.get("Slave_IO_Running")?.unwrap_or("");
    let sql = row.get("Slave_SQL_Running")?.unwrap_or("");
    if io != "Yes" || sql != "Yes" {
        return Ok(CheckResult::critical(format!(
            "MySQL replication has been stopped (io: {}, sql: {})",
            io, sql
        )));
    }

    let behind = row.num("Seconds_Behind_Master")?;
    Ok(CheckResult::new(
        dc.check_value(behind, spec),
        format!("MySQL replication behind master {} seconds", behind),
    ))
}

fn read_only<S: MetricSource>(source: &mut S, expected: ReadOnly) -> Result<CheckResult, CheckError> {
    let row = first_row(source.query(&READ_ONLY, &[])?, &READ_ONLY)?;
    let current = match row.str("read_only")?.trim() {
        "1" | "ON" | "on" => ReadOnly::On,
        _ => ReadOnly::Off,
    };
    if current == expected {
        return Ok(CheckResult::ok(format!("read_only is {}", current.as_str())));
    }
    Ok(CheckResult::critical(format!(
        "the expected value of read_only is {}, but the current value is {}",
        expected.as_str(),
        current.as_str()
    )))
}

fn local_member_state<S: MetricSource>(
    source: &mut S,
    host: &str,
    port: &str,
) -> Result<MemberState, CheckError> {
    let rows = source.query(&LOCAL_MEMBER_STATE, &[host, port])?;
    let row = rows.into_iter().next().ok_or_else(|| CheckError::NotGroupMember {
        host: host.to_string(),
        port: port.to_string(),
    })?;
    Ok(MemberState::parse(row.str("MEMBER_STATE")?))
}

fn anomalous_members<S: MetricSource>(
    source: &mut S,
    host: &str,
    port: &str,
) -> Result<Vec<GroupMember>, CheckError> {
    source
        .query(&ANOMALOUS_MEMBERS, &[host, port])?
        .into_iter()
        .map(|row| -> Result<GroupMember, CheckError> {
            Ok(GroupMember {
                host: row.str("MEMBER_HOST")?.to_string(),
                port: row.str("MEMBER_PORT")?.to_string(),
                state: MemberState::parse(row.str("MEMBER_STATE")?),
            })
        })
        .collect()
}

fn group_replication<S: MetricSource>(
    dc: &Doctor,
    source: &mut S,
    host: &str,
    port: &str,
    include_peers: bool,
) -> Result<CheckResult, CheckError> {
    let local = local_member_state(source, host, port)?;
    tracing::debug!(%local, host, port, "local member state");
    if !include_peers {
        return Ok(group::aggregate(dc, &local, false, &[]));
    }
    let peers = anomalous_members(source, host, port)?;
    Ok(group::aggregate(dc, &local, true, &peers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // 内存中的数据源，记录被调用过的查询
    #[derive(Default)]
    struct Stub {
        results: HashMap<&'static str, Result<Vec<Row>, String>>,
        calls: Vec<(&'static str, Vec<String>)>,
    }

    impl Stub {
        fn rows(mut self, query: &Query, rows: Vec<Row>) -> Self {
            self.results.insert(query.name, Ok(rows));
            self
        }

        fn fail(mut self, query: &Query, msg: &str) -> Self {
            self.results.insert(query.name, Err(msg.to_string()));
            self
        }
    }

    impl MetricSource for Stub {
        fn query(&mut self, query: &Query, params: &[&str]) -> Result<Vec<Row>, SourceError> {
            self.calls
                .push((query.name, params.iter().map(|p| p.to_string()).collect()));
            match self.results.get(query.name) {
                Some(Ok(rows)) => Ok(rows.clone()),
                Some(Err(msg)) => Err(SourceError::Query(msg.clone())),
                None => Err(SourceError::Connection("refused".to_string())),
            }
        }
    }

    fn value(v: &str) -> Row {
        Row::new().with("Value", Some(v))
    }

    fn state(s: &str) -> Row {
        Row::new().with("MEMBER_STATE", Some(s))
    }

    fn peer(host: &str, port: &str, s: &str) -> Row {
        Row::new()
            .with("MEMBER_HOST", Some(host))
            .with("MEMBER_PORT", Some(port))
            .with("MEMBER_STATE", Some(s))
    }

    fn gr(include_peers: bool) -> Check {
        Check::GroupReplication {
            local_hostname: "db1".to_string(),
            local_port: "3306".to_string(),
            include_peers,
        }
    }

    #[test]
    fn connection_over_critical() {
        let mut src = Stub::default().rows(&THREADS_CONNECTED, vec![value("260")]);
        let r = Check::Connection(ThresholdSpec::upper(200.0, 250.0)).run(&Doctor::new(), &mut src);
        assert_eq!(r, CheckResult::critical("260 connections"));
    }

    #[test]
    fn connection_missing_row_is_unknown() {
        let mut src = Stub::default().rows(&THREADS_CONNECTED, vec![]);
        let r = Check::Connection(ThresholdSpec::upper(250.0, 280.0)).run(&Doctor::new(), &mut src);
        assert_eq!(r, CheckResult::unknown("missing expected row for threads_connected"));
    }

    #[test]
    fn uptime_below_thresholds() {
        let dc = Doctor::new();
        let check = Check::Uptime(ThresholdSpec::lower(600.0, 60.0));

        let mut src = Stub::default().rows(&UPTIME, vec![value("30")]);
        assert_eq!(check.run(&dc, &mut src), CheckResult::critical("up 0 days, 00:00:30"));

        let mut src = Stub::default().rows(&UPTIME, vec![value("266706")]);
        assert_eq!(check.run(&dc, &mut src), CheckResult::ok("up 3 days, 02:05:06"));
    }

    #[test]
    fn uptime_non_numeric_is_unknown() {
        let mut src = Stub::default().rows(&UPTIME, vec![value("soon")]);
        let r = Check::Uptime(ThresholdSpec::lower(0.0, 0.0)).run(&Doctor::new(), &mut src);
        assert_eq!(r.severity(), Severity::Unknown);
    }

    #[test]
    fn source_failure_is_unknown() {
        let mut src = Stub::default();
        let r = Check::Uptime(ThresholdSpec::lower(0.0, 0.0)).run(&Doctor::new(), &mut src);
        assert_eq!(r, CheckResult::unknown("couldn't connect DB: refused"));
    }

    #[test]
    fn replication_states() {
        let dc = Doctor::new();
        let check = Check::Replication(ThresholdSpec::upper(5.0, 10.0));
        let status = |io: &str, sql: &str, lag: Option<&str>| {
            Row::new()
                .with("Slave_IO_Running", Some(io))
                .with("Slave_SQL_Running", Some(sql))
                .with("Seconds_Behind_Master", lag)
        };

        let mut src = Stub::default().rows(&REPLICA_STATUS, vec![]);
        assert_eq!(check.run(&dc, &mut src), CheckResult::ok("MySQL is not slave"));

        let mut src = Stub::default().rows(&REPLICA_STATUS, vec![status("Yes", "No", None)]);
        assert_eq!(
            check.run(&dc, &mut src),
            CheckResult::critical("MySQL replication has been stopped (io: Yes, sql: No)")
        );

        let mut src = Stub::default().rows(&REPLICA_STATUS, vec![status("Yes", "Yes", Some("7"))]);
        assert_eq!(
            check.run(&dc, &mut src),
            CheckResult::warning("MySQL replication behind master 7 seconds")
        );

        let mut src = Stub::default().rows(&REPLICA_STATUS, vec![status("Yes", "Yes", None)]);
        assert_eq!(check.run(&dc, &mut src).severity(), Severity::Unknown);
    }

    #[test]
    fn read_only_expectation() {
        let dc = Doctor::new();
        let row = |v: &str| Row::new().with("read_only", Some(v));

        let mut src = Stub::default().rows(&READ_ONLY, vec![row("1")]);
        assert_eq!(
            Check::ReadOnly(ReadOnly::On).run(&dc, &mut src),
            CheckResult::ok("read_only is ON")
        );

        let mut src = Stub::default().rows(&READ_ONLY, vec![row("0")]);
        assert_eq!(
            Check::ReadOnly(ReadOnly::On).run(&dc, &mut src),
            CheckResult::critical("the expected value of read_only is ON, but the current value is OFF")
        );
    }

    #[test]
    fn group_replication_local_only_skips_peer_query() {
        let mut src = Stub::default().rows(&LOCAL_MEMBER_STATE, vec![state("ONLINE")]);
        let r = gr(false).run(&Doctor::new(), &mut src);
        assert_eq!(r, CheckResult::ok("ONLINE"));
        assert_eq!(
            src.calls,
            vec![("local_member_state", vec!["db1".to_string(), "3306".to_string()])]
        );
    }

    #[test]
    fn group_replication_with_peer_anomaly() {
        let mut src = Stub::default()
            .rows(&LOCAL_MEMBER_STATE, vec![state("ONLINE")])
            .rows(&ANOMALOUS_MEMBERS, vec![peer("10.0.0.2", "3306", "OFFLINE")]);
        let r = gr(true).run(&Doctor::new(), &mut src);
        assert_eq!(
            r,
            CheckResult::warning(
                "ONLINE. Anomalies were detected in other group members: 10.0.0.2:3306 OFFLINE"
            )
        );
        assert_eq!(src.calls[1].0, "anomalous_members");
        assert_eq!(src.calls[1].1, vec!["db1".to_string(), "3306".to_string()]);
    }

    #[test]
    fn group_replication_not_a_member() {
        let mut src = Stub::default()
            .rows(&LOCAL_MEMBER_STATE, vec![])
            .rows(&ANOMALOUS_MEMBERS, vec![peer("10.0.0.2", "3306", "OFFLINE")]);
        let r = gr(true).run(&Doctor::new(), &mut src);
        assert_eq!(r, CheckResult::unknown("db1:3306 is not a group member"));
        // 本地查询失败后不再查询其他成员
        assert_eq!(src.calls.len(), 1);
    }

    #[test]
    fn group_replication_local_lookup_error_stops_early() {
        let mut src = Stub::default().fail(&LOCAL_MEMBER_STATE, "denied");
        let r = gr(true).run(&Doctor::new(), &mut src);
        assert_eq!(r, CheckResult::unknown("couldn't execute query: denied"));
        assert_eq!(src.calls.len(), 1);
    }

    #[test]
    fn group_replication_peer_lookup_error_discards_local_verdict() {
        let mut src = Stub::default()
            .rows(&LOCAL_MEMBER_STATE, vec![state("ERROR")])
            .fail(&ANOMALOUS_MEMBERS, "timeout");
        let r = gr(true).run(&Doctor::new(), &mut src);
        assert_eq!(r, CheckResult::unknown("couldn't execute query: timeout"));
    }

    #[test]
    fn group_replication_local_error_is_critical() {
        let mut src = Stub::default()
            .rows(&LOCAL_MEMBER_STATE, vec![state("ERROR")])
            .rows(&ANOMALOUS_MEMBERS, vec![]);
        let r = gr(true).run(&Doctor::new(), &mut src);
        assert_eq!(r, CheckResult::critical("ERROR"));
    }
}
