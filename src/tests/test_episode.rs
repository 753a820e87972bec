use crate::episode::{Aggregator, EpisodeStatus, Episodes};

#[test]
fn test_make_episodes_yields_exactly_n() {
    let episodes = Episodes::new(5, 10);
    assert_eq!(episodes.len(), 5);
    let indices: Vec<usize> = episodes.map(|e| e.index()).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_steps_stop_at_max_steps_without_done() {
    let episode = Episodes::new(1, 7).next().unwrap();
    assert_eq!(episode.status(), EpisodeStatus::Created);
    let taken = episode.steps().count();
    assert_eq!(taken, 7);
    assert_eq!(episode.status(), EpisodeStatus::Truncated);
    assert_eq!(episode.step_count(), 7);
}

#[test]
fn test_steps_stop_right_after_done() {
    let episode = Episodes::new(1, 100).next().unwrap();
    let mut seen = Vec::new();
    for step in episode.steps() {
        seen.push(step.index());
        assert_eq!(episode.status(), EpisodeStatus::Running);
        if step.index() == 2 {
            episode.done();
        }
    }
    assert_eq!(seen, vec![0, 1, 2]);
    assert_eq!(episode.status(), EpisodeStatus::Completed);
}

#[test]
fn test_done_on_the_last_allowed_step_is_completed() {
    let episode = Episodes::new(1, 3).next().unwrap();
    for step in episode.steps() {
        if step.index() == 2 {
            episode.done();
        }
    }
    assert_eq!(episode.status(), EpisodeStatus::Completed);
}

#[test]
fn test_timesteps_are_single_pass() {
    let episode = Episodes::new(1, 4).next().unwrap();
    let mut first = episode.steps();
    assert!(first.next().unwrap().is_first());
    drop(first);
    assert_eq!(episode.steps().count(), 0);
    assert_eq!(episode.step_count(), 1);
}

#[test]
fn test_zero_max_steps_truncates_immediately() {
    let episode = Episodes::new(1, 0).next().unwrap();
    assert_eq!(episode.steps().count(), 0);
    assert_eq!(episode.status(), EpisodeStatus::Truncated);
}

#[test]
fn test_log_reports_scalars_once() {
    let episode = Episodes::new(1, 3).next().unwrap();
    let score = episode.track_scalar("score", 0.0, Aggregator::Max);
    for _ in episode.steps() {
        score.inc(1.0);
    }
    let summary = episode.log();
    assert_eq!(summary.scalar("score"), Some(1.0));
    assert_eq!(summary.steps, 3);
    assert!(episode.is_logged());
    assert_eq!(episode.log(), summary);
}
