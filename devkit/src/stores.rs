/*!
Registre et sink en mémoire

- InMemoryRegistry : parc modifiable à chaud, panne simulable
- MemorySink : garde chaque lot reçu, panne simulable (rien n'est alors gardé)
*/

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use vigie_kernel::models::{MetricObservation, Target};
use vigie_kernel::registry::{RegistryError, TargetRegistry};
use vigie_kernel::sink::{MetricSink, SinkError};

#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    targets: Arc<Mutex<Vec<Target>>>,
    failing: Arc<AtomicBool>,
    reads: Arc<AtomicUsize>,
}

impl InMemoryRegistry {
    pub fn new(targets: Vec<Target>) -> Self {
        Self { targets: Arc::new(Mutex::new(targets)), ..Default::default() }
    }

    pub fn set_targets(&self, targets: Vec<Target>) {
        *self.targets.lock() = targets;
    }

    pub fn push(&self, target: Target) {
        self.targets.lock().push(target);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Nombre de lectures du registre (une par cycle attendue)
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TargetRegistry for InMemoryRegistry {
    async fn list_targets(&self) -> Result<Vec<Target>, RegistryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable("simulated registry outage".into()));
        }
        Ok(self.targets.lock().clone())
    }
}

#[derive(Clone, Default)]
pub struct MemorySink {
    batches: Arc<Mutex<Vec<Vec<MetricObservation>>>>,
    failing: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<Vec<MetricObservation>> {
        self.batches.lock().clone()
    }

    pub fn observations(&self) -> Vec<MetricObservation> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricSink for MemorySink {
    async fn append_batch(&self, batch: &[MetricObservation]) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("simulated storage outage".into()));
        }
        self.batches.lock().push(batch.to_vec());
        Ok(())
    }
}
