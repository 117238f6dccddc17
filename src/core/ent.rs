use serde::Serialize;
use std::fmt;

/// Verdict of a single check.
///
/// `Ok < Warning < Critical` form the health order. `Unknown` sits outside it
/// and is only produced when the inputs of a check could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Severity {
    pub fn exit_code(self) -> i32 {
        match self {
            Severity::Ok => 0,
            Severity::Warning => 1,
            Severity::Critical => 2,
            Severity::Unknown => 3,
        }
    }

    fn rank(self) -> Option<u8> {
        match self {
            Severity::Ok => Some(0),
            Severity::Warning => Some(1),
            Severity::Critical => Some(2),
            Severity::Unknown => None,
        }
    }

    /// Raises `self` to at least `floor`. Never lowers a verdict and leaves
    /// `Unknown` on either side untouched.
    pub fn escalate_to(self, floor: Severity) -> Severity {
        match (self.rank(), floor.rank()) {
            (Some(cur), Some(min)) if cur < min => floor,
            _ => self,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
            Severity::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Which side of a threshold is unhealthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Values below the threshold trigger it (uptime).
    LowerIsBad,
    /// Values above the threshold trigger it (connections, replication lag).
    UpperIsBad,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSpec {
    pub warning: f64,
    pub critical: f64,
    pub direction: Direction,
}

impl ThresholdSpec {
    pub fn upper(warning: f64, critical: f64) -> Self {
        ThresholdSpec {
            warning,
            critical,
            direction: Direction::UpperIsBad,
        }
    }

    pub fn lower(warning: f64, critical: f64) -> Self {
        ThresholdSpec {
            warning,
            critical,
            direction: Direction::LowerIsBad,
        }
    }
}

/// State of a Group Replication member as reported by
/// `performance_schema.replication_group_members`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberState {
    Online,
    Recovering,
    Offline,
    Error,
    Unreachable,
    /// Anything the server reports that is not one of the above.
    Unrecognized(String),
}

impl MemberState {
    pub fn parse(raw: &str) -> MemberState {
        match raw {
            "ONLINE" => MemberState::Online,
            "RECOVERING" => MemberState::Recovering,
            "OFFLINE" => MemberState::Offline,
            "ERROR" => MemberState::Error,
            "UNREACHABLE" => MemberState::Unreachable,
            other => MemberState::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MemberState::Online => "ONLINE",
            MemberState::Recovering => "RECOVERING",
            MemberState::Offline => "OFFLINE",
            MemberState::Error => "ERROR",
            MemberState::Unreachable => "UNREACHABLE",
            MemberState::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for MemberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub host: String,
    pub port: String,
    pub state: MemberState,
}

impl GroupMember {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Severity plus a single-line message. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    severity: Severity,
    message: String,
}

impl CheckResult {
    pub fn new(severity: Severity, message: impl Into<String>) -> CheckResult {
        let message: String = message.into();
        let message = message
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        CheckResult { severity, message }
    }

    pub fn ok(message: impl Into<String>) -> CheckResult {
        CheckResult::new(Severity::Ok, message)
    }

    pub fn warning(message: impl Into<String>) -> CheckResult {
        CheckResult::new(Severity::Warning, message)
    }

    pub fn critical(message: impl Into<String>) -> CheckResult {
        CheckResult::new(Severity::Critical, message)
    }

    pub fn unknown(message: impl Into<String>) -> CheckResult {
        CheckResult::new(Severity::Unknown, message)
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
