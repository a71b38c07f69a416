use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::PersistError;
use crate::train::history::History;
use crate::train::train_config::TrainConfig;

/// Writes a model together with the configuration and history that
/// produced it. Returns the path of the written model file.
pub trait ExperimentStore {
    fn save<M: Serialize>(
        &mut self,
        model: &M,
        config: &TrainConfig,
        history: &History,
        run_name: &str,
        destination: &Path,
    ) -> Result<PathBuf, PersistError>;
}

/// Stores `<run>_model.json`, `<run>_config.json` and `<run>_history.json`
/// in the destination directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonExperimentStore;

impl ExperimentStore for JsonExperimentStore {
    fn save<M: Serialize>(
        &mut self,
        model: &M,
        config: &TrainConfig,
        history: &History,
        run_name: &str,
        destination: &Path,
    ) -> Result<PathBuf, PersistError> {
        std::fs::create_dir_all(destination)
            .map_err(|source| PersistError::Io { path: destination.to_path_buf(), source })?;

        let model_path = destination.join(format!("{run_name}_model.json"));
        save_json_atomic(&model_path, model, "model")?;
        save_json_atomic(&destination.join(format!("{run_name}_config.json")), config, "config")?;
        save_json_atomic(&destination.join(format!("{run_name}_history.json")), history, "history")?;
        Ok(model_path)
    }
}

/// Serializes `value` as pretty-printed JSON next to `path`, then renames it
/// into place so readers never see a partially written file.
pub fn save_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T, what: &'static str) -> Result<(), PersistError> {
    let io_err = |source: std::io::Error| PersistError::Io { path: path.to_path_buf(), source };
    let tmp = path.with_extension("json.tmp");

    let file = File::create(&tmp).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|source| PersistError::Serialize { what, source })?;
    writer.flush().map_err(io_err)?;
    writer.get_ref().sync_all().map_err(io_err)?;
    drop(writer);

    std::fs::rename(&tmp, path).map_err(io_err)
}

/// Reads back a JSON file written by `save_json_atomic`.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> std::io::Result<T> {
    let file = File::open(path)?;
    let reader = std::io::BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
