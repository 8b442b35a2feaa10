use super::*;

#[test]
fn stages_display_as_lowercase_words() {
    assert_eq!(Stage::MeshComputing.to_string(), "mesh computing");
    assert_eq!(Stage::ProgramsBuilding.to_string(), "programs building");
    assert_eq!(Stage::Done.to_string(), "done");
}

#[test]
fn cancel_token_is_shared_between_clones() {
    let token = CancelToken::new();
    let other = token.clone();
    assert!(!other.is_cancelled());
    token.cancel();
    assert!(other.is_cancelled());
}

#[test]
fn tracker_refuses_to_enter_after_cancellation() {
    let token = CancelToken::new();
    let mut seen = Vec::new();
    let mut observer = |s: Stage| seen.push(s);
    let mut tracker = Tracker {
        stage: Stage::Idle,
        cancel: &token,
        observer: &mut observer,
    };
    tracker.enter(Stage::ParamsWriting).unwrap();
    token.cancel();
    let err = tracker.enter(Stage::PointsComputing).unwrap_err();
    assert!(matches!(
        err,
        MeshError::Cancelled {
            stage: Stage::PointsComputing
        }
    ));
    assert_eq!(tracker.stage, Stage::ParamsWriting);
    drop(tracker);
    assert_eq!(seen, [Stage::ParamsWriting]);
}
