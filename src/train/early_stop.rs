use serde::{Serialize, Deserialize};

use crate::error::ConfigError;

/// Stop once past `epochs` if the validation metric is still below `metric`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopGate {
    pub epochs: usize,
    pub metric: f64,
}

/// Two escalating gates: an early lenient one and a later strict one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopCriteria {
    pub first: StopGate,
    pub second: StopGate,
}

impl StopCriteria {
    /// The first gate must come no later and demand no more than the second.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (first, second) = (self.first, self.second);
        let ordered = first.epochs <= second.epochs && first.metric <= second.metric;
        let finite = first.metric.is_finite() && second.metric.is_finite();
        if !ordered || !finite {
            return Err(ConfigError::StopCriteriaOrder {
                first_epoch: first.epochs,
                first_metric: first.metric,
                second_epoch: second.epochs,
                second_metric: second.metric,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EarlyStopPolicy {
    criteria: StopCriteria,
    enabled: bool,
}

impl EarlyStopPolicy {
    pub fn new(criteria: StopCriteria, enabled: bool) -> Result<EarlyStopPolicy, ConfigError> {
        criteria.validate()?;
        Ok(EarlyStopPolicy { criteria, enabled })
    }

    /// Whether a positive `should_stop` ends the run.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn should_stop(&self, val_metric: f64, epoch: usize) -> bool {
        let StopCriteria { first, second } = self.criteria;
        (epoch > first.epochs && val_metric < first.metric)
            || (epoch > second.epochs && val_metric < second.metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> EarlyStopPolicy {
        EarlyStopPolicy::new(
            StopCriteria {
                first: StopGate { epochs: 5, metric: 0.5 },
                second: StopGate { epochs: 10, metric: 0.7 },
            },
            true,
        )
        .unwrap()
    }

    #[test]
    fn first_gate() {
        assert!(policy().should_stop(0.4, 6));
        assert!(!policy().should_stop(0.6, 6));
        assert!(!policy().should_stop(0.4, 5));
    }

    #[test]
    fn second_gate() {
        assert!(policy().should_stop(0.65, 11));
        assert!(!policy().should_stop(0.75, 11));
        assert!(!policy().should_stop(0.65, 10));
    }

    #[test]
    fn out_of_order_gates_are_rejected() {
        let swapped = StopCriteria {
            first: StopGate { epochs: 10, metric: 0.7 },
            second: StopGate { epochs: 5, metric: 0.5 },
        };
        assert!(matches!(EarlyStopPolicy::new(swapped, false), Err(ConfigError::StopCriteriaOrder { .. })));

        let stricter_first = StopCriteria {
            first: StopGate { epochs: 5, metric: 0.8 },
            second: StopGate { epochs: 10, metric: 0.7 },
        };
        assert!(stricter_first.validate().is_err());
    }
}
