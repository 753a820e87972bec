use ndarray::array;
use std::collections::HashSet;
use crate::env::Outcome;
use crate::error::AurumError;
use crate::memory::{Event, ExperienceStore, MemoryConfig, SamplingPolicy};

fn event(i: usize) -> Event {
    Event::new(
        array![i as f32],
        i % 2,
        Outcome::new(array![(i + 1) as f32], i as f32, false),
    )
}

fn store(capacity: Option<usize>, sampling: SamplingPolicy, seed: u64) -> ExperienceStore {
    ExperienceStore::new(&MemoryConfig { capacity, sampling }, Some(seed)).unwrap()
}

#[test]
fn test_sample_with_too_few_events() {
    let mut memory = ExperienceStore::bounded(10, 0).unwrap();
    memory.remember(event(0));
    memory.remember(event(1));
    match memory.sample(3) {
        Err(AurumError::InsufficientData { requested, available }) => {
            assert_eq!(requested, 3);
            assert_eq!(available, 2);
        }
        other => panic!("expected InsufficientData, got {:?}", other.map(|s| s.indices)),
    }
}

#[test]
fn test_bounded_store_evicts_oldest_first() {
    let mut memory = ExperienceStore::bounded(3, 0).unwrap();
    for i in 0..4 {
        memory.remember(event(i));
    }
    assert_eq!(memory.len(), 3);
    assert!(memory.iter().all(|e| e.reward() != 0.0));
    assert_eq!(memory.get(0).map(|e| e.reward()), Some(1.0));
    assert_eq!(memory.get(2).map(|e| e.reward()), Some(3.0));
}

#[test]
fn test_unbounded_store_keeps_everything() {
    let mut memory = store(None, SamplingPolicy::Uniform, 0);
    for i in 0..500 {
        memory.remember(event(i));
    }
    assert_eq!(memory.len(), 500);
    assert_eq!(memory.capacity(), None);
}

#[test]
fn test_sample_draws_distinct_events() {
    let mut memory = ExperienceStore::bounded(20, 4).unwrap();
    for i in 0..20 {
        memory.remember(event(i));
    }
    let sample = memory.sample(20).unwrap();
    let unique: HashSet<usize> = sample.indices.iter().copied().collect();
    assert_eq!(unique.len(), 20);
    assert_eq!(sample.events.len(), 20);
}

#[test]
fn test_sampling_is_deterministic_under_a_seed() {
    let draw = |seed| {
        let mut memory = store(Some(50), SamplingPolicy::Uniform, seed);
        for i in 0..50 {
            memory.remember(event(i));
        }
        memory.sample(8).unwrap().indices
    };
    assert_eq!(draw(9), draw(9));
}

#[test]
fn test_prioritized_sampling_prefers_high_priority() {
    let mut memory = store(Some(10), SamplingPolicy::Prioritized { alpha: 1.0 }, 1);
    for i in 0..10 {
        memory.remember(event(i));
    }
    let all: Vec<usize> = (0..10).collect();
    let mut td = vec![0.0; 10];
    td[7] = 1000.0;
    memory.update_priorities(&all, &td);

    let hits = (0..50)
        .filter(|_| memory.sample(1).unwrap().indices[0] == 7)
        .count();
    assert!(hits > 40);
}

#[test]
fn test_sampling_does_not_change_contents() {
    let mut memory = ExperienceStore::bounded(5, 2).unwrap();
    for i in 0..5 {
        memory.remember(event(i));
    }
    let before: Vec<Event> = memory.iter().cloned().collect();
    memory.sample(3).unwrap();
    let after: Vec<Event> = memory.iter().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn test_zero_capacity_is_rejected() {
    let result = ExperienceStore::new(&MemoryConfig { capacity: Some(0), ..MemoryConfig::default() }, None);
    assert!(matches!(result, Err(AurumError::InvalidParameter { .. })));
}
