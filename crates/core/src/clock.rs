use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Time source for schedule evaluation. The engine never calls
/// `Utc::now()` directly so tests can drive evaluation deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Arc<parking_lot::RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn at(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: Arc::new(parking_lot::RwLock::new(start)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.write();
        *now += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}
