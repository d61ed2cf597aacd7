use super::*;

#[test]
fn tag_check_accepts_own_engine() {
    let state = RenderState::new("light-trace", 41);
    assert!(state.check_engine_tag("light-trace").is_ok());
    assert_eq!(state.bootstrap_seed(), 41);
}

#[test]
fn tag_check_rejects_foreign_engine() {
    let state = RenderState::new("bidir", 41);
    let err = state.check_engine_tag("light-trace").unwrap_err();
    assert!(err.to_string().contains("render state mismatch"));
    assert!(err.to_string().contains("bidir"));
}

#[test]
fn state_serializes_round_trip() {
    let state = RenderState::new("light-trace", 7);
    let json = serde_json::to_string(&state).unwrap();
    let back: RenderState = serde_json::from_str(&json).unwrap();
    assert_eq!(back, state);
}
