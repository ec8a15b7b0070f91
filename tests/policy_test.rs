use std::collections::BTreeSet;
use turbovac::policy::{CLEAR, StateRule, StatusBitPolicy};
use turbovac::status::{StatusFlag, SupervisoryState};

fn flags(codes: &[u8]) -> BTreeSet<StatusFlag> {
    codes
        .iter()
        .map(|c| StatusFlag::from_code(*c).unwrap())
        .collect()
}

#[test]
fn empty_set_is_unknown() {
    let policy = StatusBitPolicy::default();
    assert_eq!(policy.derive_state(&BTreeSet::new()), SupervisoryState::Unknown);
    assert_eq!(policy.warnings(&BTreeSet::new()), vec![CLEAR.to_string()]);
    assert_eq!(policy.errors(&BTreeSet::new()), vec![CLEAR.to_string()]);
    assert!(policy.describe(&BTreeSet::new()).is_empty());
}

#[test]
fn fault_beats_alarm_and_everything_else() {
    let policy = StatusBitPolicy::default();
    assert_eq!(policy.derive_state(&flags(&[3, 7])), SupervisoryState::Fault);
    assert_eq!(
        policy.derive_state(&flags(&[2, 4, 11, 13, 3])),
        SupervisoryState::Fault
    );
    assert_eq!(policy.derive_state(&flags(&[2, 11, 14])), SupervisoryState::Alarm);
}

#[test]
fn canonical_progression() {
    let policy = StatusBitPolicy::default();
    assert_eq!(policy.derive_state(&flags(&[6])), SupervisoryState::Init);
    assert_eq!(policy.derive_state(&flags(&[0, 1, 2])), SupervisoryState::On);
    assert_eq!(policy.derive_state(&flags(&[2, 4, 12])), SupervisoryState::Moving);
    assert_eq!(policy.derive_state(&flags(&[2, 5, 12])), SupervisoryState::Moving);
    assert_eq!(
        policy.derive_state(&flags(&[2, 10, 11, 12])),
        SupervisoryState::Running
    );
}

#[test]
fn derive_state_is_pure() {
    let policy = StatusBitPolicy::default();
    let active = flags(&[2, 4, 13]);
    let first = policy.derive_state(&active);
    for _ in 0..10 {
        assert_eq!(policy.derive_state(&active), first);
    }
}

#[test]
fn error_only_scenario_views() {
    let policy = StatusBitPolicy::default();
    let active = flags(&[3]);
    assert_eq!(policy.derive_state(&active), SupervisoryState::Fault);
    assert_eq!(
        policy.errors(&active),
        vec![StatusFlag::Error.description().to_string()]
    );
    assert_eq!(policy.warnings(&active), vec![CLEAR.to_string()]);
    assert_eq!(
        policy.describe(&active),
        vec![StatusFlag::Error.description().to_string()]
    );
    let text = policy.status_text(&active);
    assert!(text.starts_with(SupervisoryState::Fault.message()));
    assert!(text.contains(StatusFlag::Error.description()));
}

#[test]
fn warnings_listed_in_enumeration_order() {
    let policy = StatusBitPolicy::default();
    let active = flags(&[14, 7, 13]);
    assert_eq!(
        policy.warnings(&active),
        vec![
            StatusFlag::TemperatureWarning.description().to_string(),
            StatusFlag::OverloadWarning.description().to_string(),
            StatusFlag::CollectiveWarning.description().to_string(),
        ]
    );
}

#[test]
fn custom_rule_order_changes_precedence() {
    let policy = StatusBitPolicy::new(vec![
        StateRule::new([StatusFlag::Error], SupervisoryState::Fault),
        StateRule::new([StatusFlag::TemperatureWarning], SupervisoryState::Alarm),
    ]);
    assert_eq!(policy.derive_state(&flags(&[3, 7])), SupervisoryState::Alarm);
}
