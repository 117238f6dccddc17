//! Group Replication verdict for one local member and its peers.

use crate::core::doctor::Doctor;
use crate::core::ent::*;

/// Folds the local member's state and, optionally, the anomalous peers into
/// one result.
///
/// `peers` must already exclude the local member and members that are ONLINE
/// or RECOVERING, ordered by host. Peers can raise an OK local view to
/// WARNING; only the local state can make the result CRITICAL.
pub fn aggregate(
    dc: &Doctor,
    local: &MemberState,
    include_peers: bool,
    peers: &[GroupMember],
) -> CheckResult {
    let severity = dc.check_member(local);
    if !include_peers || peers.is_empty() {
        return CheckResult::new(severity, local.as_str());
    }

    let anomalies = peers
        .iter()
        .map(|m| format!("{} {}", m.addr(), m.state))
        .collect::<Vec<_>>()
        .join(", ");
    tracing::info!(count = peers.len(), "anomalies detected in other group members");
    CheckResult::new(
        severity.escalate_to(Severity::Warning),
        format!(
            "{}. Anomalies were detected in other group members: {}",
            local, anomalies
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(host: &str, state: &str) -> GroupMember {
        GroupMember {
            host: host.to_string(),
            port: "3306".to_string(),
            state: MemberState::parse(state),
        }
    }

    #[test]
    fn local_only() {
        let r = aggregate(&Doctor::new(), &MemberState::Online, false, &[]);
        assert_eq!(r, CheckResult::ok("ONLINE"));
    }

    #[test]
    fn peers_requested_but_none_abnormal() {
        let r = aggregate(&Doctor::new(), &MemberState::Online, true, &[]);
        assert_eq!(r, CheckResult::ok("ONLINE"));
    }

    #[test]
    fn peer_anomaly_raises_ok_to_warning() {
        let peers = [member("10.0.0.2", "OFFLINE")];
        let r = aggregate(&Doctor::new(), &MemberState::Online, true, &peers);
        assert_eq!(
            r,
            CheckResult::warning(
                "ONLINE. Anomalies were detected in other group members: 10.0.0.2:3306 OFFLINE"
            )
        );
    }

    #[test]
    fn peers_are_ignored_when_not_requested() {
        let peers = [member("10.0.0.2", "ERROR")];
        let r = aggregate(&Doctor::new(), &MemberState::Online, false, &peers);
        assert_eq!(r, CheckResult::ok("ONLINE"));
    }

    #[test]
    fn local_failure_dominates() {
        let r = aggregate(&Doctor::new(), &MemberState::Error, true, &[]);
        assert_eq!(r, CheckResult::critical("ERROR"));

        let peers = [member("a", "OFFLINE")];
        let r = aggregate(&Doctor::new(), &MemberState::Error, true, &peers);
        assert_eq!(r.severity(), Severity::Critical);
        assert_eq!(
            r.message(),
            "ERROR. Anomalies were detected in other group members: a:3306 OFFLINE"
        );
    }

    #[test]
    fn peer_escalation_is_capped_at_warning() {
        let peers = [
            member("10.0.0.2", "ERROR"),
            member("10.0.0.3", "UNREACHABLE"),
            member("10.0.0.4", "OFFLINE"),
        ];
        let dc = Doctor::new();
        let r = aggregate(&dc, &MemberState::Online, true, &peers);
        assert_eq!(r.severity(), Severity::Warning);
        assert_eq!(
            r.message(),
            "ONLINE. Anomalies were detected in other group members: \
             10.0.0.2:3306 ERROR, 10.0.0.3:3306 UNREACHABLE, 10.0.0.4:3306 OFFLINE"
        );

        let r = aggregate(&dc, &MemberState::Recovering, true, &peers);
        assert_eq!(r.severity(), Severity::Warning);
    }

    #[test]
    fn peer_order_is_kept_as_given() {
        let peers = [member("b", "OFFLINE"), member("a", "ERROR")];
        let r = aggregate(&Doctor::new(), &MemberState::Online, true, &peers);
        assert!(r.message().ends_with("b:3306 OFFLINE, a:3306 ERROR"));
    }

    #[test]
    fn same_inputs_same_result() {
        let dc = Doctor::new();
        let peers = [member("x", "OFFLINE")];
        for local in ["ONLINE", "RECOVERING", "ERROR", "SOMETHING_NEW"] {
            let state = MemberState::parse(local);
            let first = aggregate(&dc, &state, true, &peers);
            assert_eq!(first, aggregate(&dc, &state, true, &peers));

            let without = aggregate(&dc, &state, false, &peers);
            assert!(first.severity().exit_code() >= without.severity().exit_code());
            if without.severity() == Severity::Ok {
                assert_eq!(first.severity(), Severity::Warning);
            }
        }
    }
}
