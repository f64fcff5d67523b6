use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Tracks consecutive UDP send failures per fixture.
///
/// A fixture that fails `threshold` sends in a row is demoted to
/// unhealthy; the target resolver then omits it from resolved spans until
/// a successful send (or an explicit reset) clears the counter.
#[derive(Clone)]
pub struct FixtureHealth {
    inner: Arc<RwLock<HashMap<String, u32>>>,
    threshold: u32,
}

impl FixtureHealth {
    pub fn new(threshold: u32) -> Self {
        FixtureHealth {
            inner: Arc::new(RwLock::new(HashMap::new())),
            threshold: threshold.max(1),
        }
    }

    pub fn record_success(&self, fixture_id: &str) {
        let mut counters = self.inner.write();
        if counters.remove(fixture_id).is_some_and(|c| c >= self.threshold) {
            log::info!("fixture '{}' recovered", fixture_id);
        }
    }

    pub fn record_failure(&self, fixture_id: &str) {
        let mut counters = self.inner.write();
        let count = counters.entry(fixture_id.to_string()).or_insert(0);
        *count += 1;
        if *count == self.threshold {
            log::warn!(
                "fixture '{}' unhealthy after {} consecutive send failures",
                fixture_id,
                count
            );
        }
    }

    pub fn is_healthy(&self, fixture_id: &str) -> bool {
        self.inner
            .read()
            .get(fixture_id)
            .is_none_or(|c| *c < self.threshold)
    }

    pub fn reset(&self, fixture_id: &str) {
        self.inner.write().remove(fixture_id);
    }

    pub fn unhealthy_fixtures(&self) -> Vec<String> {
        self.inner
            .read()
            .iter()
            .filter(|(_, c)| **c >= self.threshold)
            .map(|(id, _)| id.clone())
            .collect()
    }
}
