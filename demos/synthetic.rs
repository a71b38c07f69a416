use std::sync::mpsc;
use std::thread;

use histoseg::train::{DataConfig, EpochRecord, ScoreWeights, StopCriteria, StopGate, TaskType};
use histoseg::{JsonExperimentStore, PixelNetwork, TrainConfig, TrainingOrchestrator};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = TrainConfig {
        run_name: "synthetic".into(),
        save_path: std::env::temp_dir().join("histoseg-synthetic"),
        global_batch_size: 8,
        img_dims: 16,
        input_channels: 3,
        epochs: 15,
        threshold: 0.5,
        task_type: TaskType::Binary,
        classes: 2,
        replicas: 4,
        learning_rate: 0.5,
        hidden_units: vec![8],
        seed: 1,
        min_epoch: 10,
        score_weights: ScoreWeights::default(),
        stop_criteria: StopCriteria {
            first: StopGate { epochs: 5, metric: 0.5 },
            second: StopGate { epochs: 10, metric: 0.7 },
        },
        early_stopping: false,
        log_histograms: false,
        telemetry_path: None,
        data: DataConfig::Synthetic { train_samples: 64, valid_samples: 16 },
    };

    let model = PixelNetwork::from_spec(&config.network_spec(), config.seed);
    let (mut train, mut valid) = config.loaders()?;

    let (tx, rx) = mpsc::channel::<EpochRecord>();
    let printer = thread::spawn(move || {
        for record in rx {
            println!(
                "Epoch {}: val_loss = {:.6}, val_dice = {:.4}",
                record.epoch, record.val_loss, record.val_metric
            );
        }
    });

    let outcome = TrainingOrchestrator::new(model, config, JsonExperimentStore)?
        .with_epoch_events(tx)
        .fit(train.as_mut(), valid.as_mut())?;
    printer
        .join()
        .map_err(|_| anyhow::anyhow!("epoch printer thread panicked"))?;

    if let Some(best) = outcome.best {
        println!("Best epoch {} (weighted sum {:.6}) -> {}", best.epoch, best.weighted_sum, best.location.display());
    }
    println!("Final model -> {}", outcome.final_location.display());
    Ok(())
}
