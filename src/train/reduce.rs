use std::iter::Sum;
use std::ops::Add;

use crate::train::replica::ReplicaResult;

impl Add for ReplicaResult {
    type Output = ReplicaResult;

    fn add(self, rhs: Self) -> Self::Output {
        ReplicaResult {
            loss: self.loss + rhs.loss,
            metric: self.metric + rhs.metric,
        }
    }
}

impl Sum for ReplicaResult {
    fn sum<I: Iterator<Item = ReplicaResult>>(iter: I) -> Self {
        iter.fold(ReplicaResult::default(), Add::add)
    }
}

/// Combines the replica results of one step into the batch value.
///
/// The reduction is a plain sum: every replica already divided its share by
/// the replica count, so summing is what recovers the batch average.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossReplicaReducer;

impl CrossReplicaReducer {
    pub fn reduce(results: &[ReplicaResult]) -> ReplicaResult {
        results.iter().copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_elementwise() {
        let r = CrossReplicaReducer::reduce(&[
            ReplicaResult { loss: 0.25, metric: 0.5 },
            ReplicaResult { loss: 0.5, metric: 0.25 },
        ]);
        assert_eq!(r, ReplicaResult { loss: 0.75, metric: 0.75 });
    }

    #[test]
    fn single_replica_is_identity() {
        let only = ReplicaResult { loss: 0.3, metric: 0.9 };
        assert_eq!(CrossReplicaReducer::reduce(&[only]), only);
    }

    #[test]
    fn no_replicas_reduce_to_zero() {
        assert_eq!(CrossReplicaReducer::reduce(&[]), ReplicaResult::default());
    }
}
