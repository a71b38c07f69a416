pub mod experiment;

pub use experiment::{load_json, save_json_atomic, ExperimentStore, JsonExperimentStore};
