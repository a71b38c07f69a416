use crate::data::batch::Batch;
use crate::error::Result;

/// Source of batches for one pass (training or validation).
///
/// `dataset` restarts iteration from the beginning on every call and is
/// consumed exactly once per pass. `steps` is the declared batch count used
/// for progress reporting and for averaging epoch totals; it is trusted as
/// given, even if the iterator yields a different number of batches.
pub trait DataLoader {
    fn steps(&self) -> usize;

    fn dataset(&mut self) -> Box<dyn Iterator<Item = Result<Batch>> + '_>;
}

/// Loader over batches already held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryLoader {
    batches: Vec<Batch>,
    steps: usize,
}

impl InMemoryLoader {
    pub fn new(batches: Vec<Batch>) -> InMemoryLoader {
        let steps = batches.len();
        InMemoryLoader { batches, steps }
    }

    /// Overrides the declared step count without changing the batches.
    pub fn with_declared_steps(mut self, steps: usize) -> InMemoryLoader {
        self.steps = steps;
        self
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }
}

impl DataLoader for InMemoryLoader {
    fn steps(&self) -> usize {
        self.steps
    }

    fn dataset(&mut self) -> Box<dyn Iterator<Item = Result<Batch>> + '_> {
        Box::new(self.batches.iter().cloned().map(Ok))
    }
}
