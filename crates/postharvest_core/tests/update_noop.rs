use postharvest_core::{update, CollectorState, Msg, StatusSnapshot};

#[test]
fn stop_while_idle_is_a_noop() {
    let (state, effects) = update(CollectorState::new(), Msg::StopRequested);
    assert!(effects.is_empty());
    assert_eq!(state, CollectorState::new());
}

#[test]
fn stale_tick_messages_are_ignored_while_idle() {
    let (state, effects) = update(CollectorState::new(), Msg::TickDue { run: 1 });
    assert!(effects.is_empty());
    assert_eq!(
        state.view(),
        StatusSnapshot {
            message: "Ready".to_string(),
            ..StatusSnapshot::default()
        }
    );
}
