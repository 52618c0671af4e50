//! FSM unit tests

use minihost::deploy::fsm::{SessionEvent, SessionFsm, SessionState};

fn run_to_ready(fsm: &mut SessionFsm) {
    fsm.process(SessionEvent::Begin { literal: false }).unwrap();
    fsm.process(SessionEvent::Listed).unwrap();
    fsm.process(SessionEvent::Materialized).unwrap();
    fsm.process(SessionEvent::Started).unwrap();
}

#[test]
fn test_fsm_initial_state() {
    let fsm = SessionFsm::new();
    assert_eq!(fsm.state(), SessionState::Idle);
    assert!(fsm.error().is_none());
    assert_eq!(fsm.retry_count(), 0);
}

#[test]
fn test_fsm_success_flow() {
    let mut fsm = SessionFsm::new();

    // Idle -> Listing
    fsm.process(SessionEvent::Begin { literal: false }).unwrap();
    assert_eq!(fsm.state(), SessionState::Listing);

    // Listing -> Materializing
    fsm.process(SessionEvent::Listed).unwrap();
    assert_eq!(fsm.state(), SessionState::Materializing);

    // Materializing -> Starting
    fsm.process(SessionEvent::Materialized).unwrap();
    assert_eq!(fsm.state(), SessionState::Starting);

    // Starting -> Ready
    fsm.process(SessionEvent::Started).unwrap();
    assert_eq!(fsm.state(), SessionState::Ready);
}

#[test]
fn test_fsm_literal_skips_listing() {
    let mut fsm = SessionFsm::new();
    fsm.process(SessionEvent::Begin { literal: true }).unwrap();
    assert_eq!(fsm.state(), SessionState::Materializing);
    assert!(fsm.process(SessionEvent::Listed).is_err());
}

#[test]
fn test_fsm_failure_flow() {
    let mut fsm = SessionFsm::new();

    fsm.process(SessionEvent::Begin { literal: false }).unwrap();
    fsm.process(SessionEvent::Failed("no files".to_string())).unwrap();

    assert_eq!(fsm.state(), SessionState::Error);
    assert_eq!(fsm.error(), Some("no files"));
    assert_eq!(fsm.retry_count(), 1);
}

#[test]
fn test_fsm_retry() {
    let mut fsm = SessionFsm::new();

    fsm.process(SessionEvent::Begin { literal: false }).unwrap();
    fsm.process(SessionEvent::Listed).unwrap();
    fsm.process(SessionEvent::Failed("download failed".to_string())).unwrap();
    assert!(fsm.can_retry(2));

    // Retry restarts from listing
    fsm.process(SessionEvent::Retry { literal: false }).unwrap();
    assert_eq!(fsm.state(), SessionState::Listing);
    assert!(fsm.error().is_none());
    assert_eq!(fsm.retry_count(), 1);
}

#[test]
fn test_fsm_retry_budget() {
    let mut fsm = SessionFsm::new();
    fsm.process(SessionEvent::Begin { literal: false }).unwrap();

    for attempt in 1..=3 {
        fsm.process(SessionEvent::Failed(format!("attempt {}", attempt))).unwrap();
        if attempt < 3 {
            assert!(fsm.can_retry(2));
            fsm.process(SessionEvent::Retry { literal: false }).unwrap();
        }
    }

    assert_eq!(fsm.retry_count(), 3);
    assert!(!fsm.can_retry(2));
}

#[test]
fn test_fsm_started_resets_retries() {
    let mut fsm = SessionFsm::new();
    fsm.process(SessionEvent::Begin { literal: false }).unwrap();
    fsm.process(SessionEvent::Failed("flaky".to_string())).unwrap();
    fsm.process(SessionEvent::Retry { literal: false }).unwrap();
    fsm.process(SessionEvent::Listed).unwrap();
    fsm.process(SessionEvent::Materialized).unwrap();
    fsm.process(SessionEvent::Started).unwrap();

    assert_eq!(fsm.state(), SessionState::Ready);
    assert_eq!(fsm.retry_count(), 0);
    assert!(!fsm.can_retry(2));
}

#[test]
fn test_fsm_teardown_from_any_state() {
    let mut fsm = SessionFsm::new();
    run_to_ready(&mut fsm);
    fsm.process(SessionEvent::Teardown).unwrap();
    assert_eq!(fsm.state(), SessionState::Idle);

    let mut fsm = SessionFsm::new();
    fsm.process(SessionEvent::Begin { literal: false }).unwrap();
    fsm.process(SessionEvent::Listed).unwrap();
    fsm.process(SessionEvent::Teardown).unwrap();
    assert_eq!(fsm.state(), SessionState::Idle);

    let mut fsm = SessionFsm::new();
    fsm.process(SessionEvent::Begin { literal: false }).unwrap();
    fsm.process(SessionEvent::Failed("boom".to_string())).unwrap();
    fsm.process(SessionEvent::Teardown).unwrap();
    assert_eq!(fsm.state(), SessionState::Idle);
    assert!(fsm.error().is_none());
    assert_eq!(fsm.retry_count(), 0);
}

#[test]
fn test_fsm_idle_teardown_is_noop() {
    let mut fsm = SessionFsm::new();
    fsm.process(SessionEvent::Teardown).unwrap();
    fsm.process(SessionEvent::Teardown).unwrap();
    assert_eq!(fsm.state(), SessionState::Idle);
}

#[test]
fn test_fsm_invalid_transitions() {
    let mut fsm = SessionFsm::new();

    // Can't list from Idle
    assert!(fsm.process(SessionEvent::Listed).is_err());
    assert!(fsm.process(SessionEvent::Failed("x".to_string())).is_err());
    assert!(fsm.process(SessionEvent::Retry { literal: false }).is_err());

    // Can't begin twice
    run_to_ready(&mut fsm);
    assert!(fsm.process(SessionEvent::Begin { literal: false }).is_err());
    assert!(fsm.process(SessionEvent::Failed("late".to_string())).is_err());
    assert_eq!(fsm.state(), SessionState::Ready);
}
