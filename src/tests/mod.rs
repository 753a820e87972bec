// In-crate tests, grouped by component
pub mod test_activations;
pub mod test_episode;
pub mod test_memory;
pub mod test_policy;
