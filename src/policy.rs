//! Status-bit to supervisory-state policy
//!
//! The policy walks an ordered rule list and lets every matching rule
//! overwrite the result, so the last applicable rule wins. The order of the
//! list is the precedence contract; it is not a priority table.

use std::collections::BTreeSet;

use crate::config::StateRuleConfig;
use crate::error::{Result, TurbovacError};
use crate::status::{StatusFlag, SupervisoryState};

/// Sentinel reported by the warning and error views when nothing is active
pub const CLEAR: &str = "Clear";

/// A single rule: if any of `flags` is active the state becomes `state`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRule {
    pub flags: BTreeSet<StatusFlag>,
    pub state: SupervisoryState,
}

impl StateRule {
    pub fn new(flags: impl IntoIterator<Item = StatusFlag>, state: SupervisoryState) -> Self {
        Self {
            flags: flags.into_iter().collect(),
            state,
        }
    }

    fn matches(&self, active: &BTreeSet<StatusFlag>) -> bool {
        !self.flags.is_disjoint(active)
    }
}

/// Ordered rule list mapping active flags to a supervisory state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBitPolicy {
    rules: Vec<StateRule>,
}

impl Default for StatusBitPolicy {
    /// Canonical order: Init, On, Moving, Running, Alarm, Fault
    fn default() -> Self {
        Self {
            rules: vec![
                StateRule::new([StatusFlag::Initializing], SupervisoryState::Init),
                StateRule::new([StatusFlag::OperationEnabled], SupervisoryState::On),
                StateRule::new(
                    [StatusFlag::Accelerating, StatusFlag::Decelerating],
                    SupervisoryState::Moving,
                ),
                StateRule::new([StatusFlag::NormalOperation], SupervisoryState::Running),
                StateRule::new(StatusFlag::WARNINGS, SupervisoryState::Alarm),
                StateRule::new([StatusFlag::Error], SupervisoryState::Fault),
            ],
        }
    }
}

impl StatusBitPolicy {
    pub fn new(rules: Vec<StateRule>) -> Self {
        Self { rules }
    }

    /// Build from configuration; an empty list selects the canonical order
    pub fn from_config(rules: &[StateRuleConfig]) -> Result<Self> {
        if rules.is_empty() {
            return Ok(Self::default());
        }
        let mut out = Vec::with_capacity(rules.len());
        for (i, rule) in rules.iter().enumerate() {
            if rule.flags.is_empty() {
                return Err(TurbovacError::validation(
                    format!("state_rules[{}].flags", i).as_str(),
                    "must name at least one status bit",
                ));
            }
            let flags = rule
                .flags
                .iter()
                .map(|code| StatusFlag::from_code(*code))
                .collect::<Result<BTreeSet<_>>>()?;
            out.push(StateRule {
                flags,
                state: rule.state,
            });
        }
        Ok(Self { rules: out })
    }

    pub fn rules(&self) -> &[StateRule] {
        &self.rules
    }

    /// Derive the supervisory state. Later matching rules overwrite earlier ones.
    pub fn derive_state(&self, active: &BTreeSet<StatusFlag>) -> SupervisoryState {
        let mut state = SupervisoryState::Unknown;
        for rule in &self.rules {
            if rule.matches(active) {
                state = rule.state;
            }
        }
        state
    }

    /// Descriptions of every active flag in enumeration order
    pub fn describe(&self, active: &BTreeSet<StatusFlag>) -> Vec<String> {
        active.iter().map(|f| f.description().to_string()).collect()
    }

    /// Active warning descriptions, or the `Clear` sentinel
    pub fn warnings(&self, active: &BTreeSet<StatusFlag>) -> Vec<String> {
        Self::filtered_or_clear(active, |f| f.is_warning())
    }

    /// Active error description, or the `Clear` sentinel
    pub fn errors(&self, active: &BTreeSet<StatusFlag>) -> Vec<String> {
        Self::filtered_or_clear(active, |f| f.is_error())
    }

    /// Free text for the host's status display: state headline then one
    /// line per active flag
    pub fn status_text(&self, active: &BTreeSet<StatusFlag>) -> String {
        let state = self.derive_state(active);
        let mut lines = vec![state.message().to_string()];
        lines.extend(self.describe(active));
        lines.join("\n")
    }

    fn filtered_or_clear(
        active: &BTreeSet<StatusFlag>,
        keep: impl Fn(StatusFlag) -> bool,
    ) -> Vec<String> {
        let out: Vec<String> = active
            .iter()
            .copied()
            .filter(|f| keep(*f))
            .map(|f| f.description().to_string())
            .collect();
        if out.is_empty() {
            vec![CLEAR.to_string()]
        } else {
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(list: &[StatusFlag]) -> BTreeSet<StatusFlag> {
        list.iter().copied().collect()
    }

    #[test]
    fn empty_set_is_unknown() {
        let policy = StatusBitPolicy::default();
        assert_eq!(policy.derive_state(&BTreeSet::new()), SupervisoryState::Unknown);
    }

    #[test]
    fn unrelated_flags_stay_unknown() {
        let policy = StatusBitPolicy::default();
        let active = flags(&[StatusFlag::ReadyToSwitchOn, StatusFlag::RemoteControl]);
        assert_eq!(policy.derive_state(&active), SupervisoryState::Unknown);
    }

    #[test]
    fn single_flag_mapping() {
        let policy = StatusBitPolicy::default();
        let cases = [
            (StatusFlag::Initializing, SupervisoryState::Init),
            (StatusFlag::OperationEnabled, SupervisoryState::On),
            (StatusFlag::Accelerating, SupervisoryState::Moving),
            (StatusFlag::Decelerating, SupervisoryState::Moving),
            (StatusFlag::NormalOperation, SupervisoryState::Running),
            (StatusFlag::TemperatureWarning, SupervisoryState::Alarm),
            (StatusFlag::OverloadWarning, SupervisoryState::Alarm),
            (StatusFlag::CollectiveWarning, SupervisoryState::Alarm),
            (StatusFlag::Error, SupervisoryState::Fault),
        ];
        for (flag, expected) in cases {
            assert_eq!(policy.derive_state(&flags(&[flag])), expected, "{:?}", flag);
        }
    }

    #[test]
    fn later_rules_overwrite_earlier_ones() {
        let policy = StatusBitPolicy::default();
        let running_and_accel = flags(&[StatusFlag::Accelerating, StatusFlag::NormalOperation]);
        assert_eq!(policy.derive_state(&running_and_accel), SupervisoryState::Running);

        let warn_and_error = flags(&[
            StatusFlag::OperationEnabled,
            StatusFlag::OverloadWarning,
            StatusFlag::Error,
        ]);
        assert_eq!(policy.derive_state(&warn_and_error), SupervisoryState::Fault);
    }

    #[test]
    fn configured_order_changes_precedence() {
        let rules = vec![
            StateRuleConfig {
                flags: vec![11],
                state: SupervisoryState::On,
            },
            StateRuleConfig {
                flags: vec![2],
                state: SupervisoryState::Running,
            },
        ];
        let policy = StatusBitPolicy::from_config(&rules).unwrap();
        let both = flags(&[StatusFlag::OperationEnabled, StatusFlag::NormalOperation]);
        assert_eq!(policy.derive_state(&both), SupervisoryState::Running);
        assert_eq!(
            policy.derive_state(&flags(&[StatusFlag::NormalOperation])),
            SupervisoryState::On
        );
    }

    #[test]
    fn from_config_rejects_bad_rules() {
        let empty = vec![StateRuleConfig {
            flags: vec![],
            state: SupervisoryState::On,
        }];
        assert!(StatusBitPolicy::from_config(&empty).is_err());

        let unknown = vec![StateRuleConfig {
            flags: vec![42],
            state: SupervisoryState::On,
        }];
        assert!(StatusBitPolicy::from_config(&unknown).is_err());

        assert_eq!(
            StatusBitPolicy::from_config(&[]).unwrap(),
            StatusBitPolicy::default()
        );
    }

    #[test]
    fn status_text_leads_with_state_message() {
        let policy = StatusBitPolicy::default();
        let text = policy.status_text(&flags(&[StatusFlag::Error, StatusFlag::PumpTurning]));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], SupervisoryState::Fault.message());
        assert_eq!(lines[1], "Error condition");
        assert_eq!(lines[2], "Pump is turning");
    }
}
