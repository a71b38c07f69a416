use histoseg::data::SyntheticTiles;
use histoseg::train::{CrossReplicaReducer, Mode, ReplicaStepExecutor};
use histoseg::{Batch, LossType, PixelNetwork, SegmentationModel, Sgd};

fn batch(samples: usize, mask_channels: usize) -> Batch {
    SyntheticTiles::new(11, 8, 3, mask_channels)
        .loader(samples, samples, false)
        .unwrap()
        .batches()[0]
        .clone()
}

fn network(outputs: usize) -> PixelNetwork {
    let spec = histoseg::NetworkSpec::segmentation(3, &[5], outputs);
    PixelNetwork::from_spec(&spec, 3)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(1.0)
}

fn reduced(replicas: usize, global: usize, batch: &Batch, loss: LossType, mode: Mode, model: &mut PixelNetwork) -> (f64, f64) {
    let exec = ReplicaStepExecutor::new(replicas, global, 8, 0.5, loss).unwrap();
    let results = exec.run_step(model, &Sgd::new(0.3), batch, mode).unwrap();
    assert_eq!(results.len(), replicas);
    let r = CrossReplicaReducer::reduce(&results);
    (r.loss, r.metric)
}

#[test]
fn eval_reduction_does_not_depend_on_replica_count() {
    let b = batch(6, 1);
    let (loss_1, metric_1) = reduced(1, 6, &b, LossType::BinaryCrossEntropy, Mode::Eval, &mut network(1));
    assert!(loss_1 > 0.0);
    assert!(metric_1 > 0.0 && metric_1 <= 1.0);
    for n in 2..=6 {
        let (loss_n, metric_n) = reduced(n, 6, &b, LossType::BinaryCrossEntropy, Mode::Eval, &mut network(1));
        assert!(close(loss_1, loss_n), "{n} replicas: loss {loss_n} vs {loss_1}");
        assert!(close(metric_1, metric_n), "{n} replicas: metric {metric_n} vs {metric_1}");
    }
}

#[test]
fn multi_class_reduction_is_replica_invariant() {
    let b = batch(4, 3);
    let (loss_1, metric_1) = reduced(1, 4, &b, LossType::CrossEntropy, Mode::Eval, &mut network(3));
    for n in [2, 3, 4] {
        let (loss_n, metric_n) = reduced(n, 4, &b, LossType::CrossEntropy, Mode::Eval, &mut network(3));
        assert!(close(loss_1, loss_n));
        assert!(close(metric_1, metric_n));
    }
}

#[test]
fn short_batch_loss_uses_global_size_and_dice_uses_present_samples() {
    // 3 samples in a step configured for 4: same value whatever the split.
    let b = batch(3, 1);
    let (loss_1, metric_1) = reduced(1, 4, &b, LossType::BinaryCrossEntropy, Mode::Eval, &mut network(1));
    let (loss_2, metric_2) = reduced(2, 4, &b, LossType::BinaryCrossEntropy, Mode::Eval, &mut network(1));
    assert!(close(loss_1, loss_2));
    assert!(close(metric_1, metric_2));

    let (full_loss, full_metric) = reduced(1, 3, &b, LossType::BinaryCrossEntropy, Mode::Eval, &mut network(1));
    assert!(close(loss_1, full_loss * 3.0 / 4.0));
    // Dice stays a mean over the samples present.
    assert!(close(metric_1, full_metric));
}

#[test]
fn training_step_applies_the_same_update_for_any_replica_count() {
    let b = batch(4, 1);
    let mut single = network(1);
    let (train_loss_1, _) = reduced(1, 4, &b, LossType::BinaryCrossEntropy, Mode::Train, &mut single);

    for n in [2, 4] {
        let mut split = network(1);
        let (train_loss_n, _) = reduced(n, 4, &b, LossType::BinaryCrossEntropy, Mode::Train, &mut split);
        assert!(close(train_loss_1, train_loss_n));
        for ((name, p), (_, q)) in single.named_parameters().into_iter().zip(split.named_parameters()) {
            for (x, y) in p.values().zip(q.values()) {
                assert!((x - y).abs() < 1e-12, "{name} diverged with {n} replicas");
            }
        }
    }
}

#[test]
fn train_and_eval_report_the_same_pre_update_loss() {
    let b = batch(4, 1);
    let (eval_loss, eval_metric) = reduced(2, 4, &b, LossType::BinaryCrossEntropy, Mode::Eval, &mut network(1));
    let (train_loss, train_metric) = reduced(2, 4, &b, LossType::BinaryCrossEntropy, Mode::Train, &mut network(1));
    assert!(close(eval_loss, train_loss));
    assert!(close(eval_metric, train_metric));
}
