use crate::core::ent::*;

// 把原始指标换算成严重级别，不做任何 I/O
#[derive(Debug, Clone, Copy, Default)]
pub struct Doctor {}

impl Doctor {
    pub fn new() -> Doctor {
        Doctor {}
    }

    /// Compares `value` against the thresholds. Equality never triggers a level.
    ///
    /// The two comparisons are independent, so a spec with `warning` past
    /// `critical` is not rejected and may report WARNING where CRITICAL was meant.
    pub fn check_value(&self, value: f64, spec: &ThresholdSpec) -> Severity {
        let (crit, warn) = match spec.direction {
            Direction::UpperIsBad => (value > spec.critical, value > spec.warning),
            Direction::LowerIsBad => (value < spec.critical, value < spec.warning),
        };
        if crit {
            return Severity::Critical;
        }
        if warn {
            return Severity::Warning;
        }
        Severity::Ok
    }

    /// Anything that is neither ONLINE nor RECOVERING is CRITICAL, including
    /// states this build does not know about.
    pub fn check_member(&self, state: &MemberState) -> Severity {
        match state {
            MemberState::Online => Severity::Ok,
            MemberState::Recovering => Severity::Warning,
            MemberState::Offline
            | MemberState::Error
            | MemberState::Unreachable
            | MemberState::Unrecognized(_) => Severity::Critical,
        }
    }
}
