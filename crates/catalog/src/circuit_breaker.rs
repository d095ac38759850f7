use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,   // calls flow
    Open,     // failing fast
    HalfOpen, // probing recovery
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u64,
    success_count: u64,
    opened_at: Option<Instant>,
    failure_threshold: u64,
    recovery_timeout: Duration,
    half_open_max_calls: u64,
}

impl BreakerState {
    fn new(failure_threshold: u64, recovery_timeout: Duration, half_open_max_calls: u64) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            half_open_max_calls: half_open_max_calls.max(1),
        }
    }

    fn can_execute(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => match self.opened_at {
                Some(opened) if opened.elapsed() >= self.recovery_timeout => {
                    info!("category/tags circuit half-open; probing");
                    self.state = CircuitState::HalfOpen;
                    self.success_count = 0;
                    true
                }
                _ => false,
            },
            CircuitState::HalfOpen => self.success_count < self.half_open_max_calls,
        }
    }

    fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed => self.failure_count = 0,
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.half_open_max_calls {
                    info!("category/tags circuit closed after recovery");
                    self.reset();
                }
            }
            CircuitState::Open => self.reset(),
        }
    }

    fn record_failure(&mut self) {
        self.failure_count += 1;
        match self.state {
            CircuitState::Closed if self.failure_count >= self.failure_threshold => {
                warn!(failures = self.failure_count, "category/tags circuit opened");
                self.open();
            }
            CircuitState::Closed => {}
            CircuitState::HalfOpen => {
                warn!("category/tags circuit re-opened after failed trial call");
                self.open();
            }
            CircuitState::Open => self.opened_at = Some(Instant::now()),
        }
        debug!(state = ?self.state, failures = self.failure_count, "circuit recorded failure");
    }

    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.success_count = 0;
    }

    fn reset(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.success_count = 0;
        self.opened_at = None;
    }
}

/// Shared breaker guarding calls to the category/tags service.
/// A disabled breaker always admits calls and records nothing.
#[derive(Clone, Debug)]
pub struct CircuitBreaker {
    inner: Arc<Mutex<BreakerState>>,
    enabled: bool,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u64, recovery_timeout: Duration, half_open_max_calls: u64, enabled: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BreakerState::new(
                failure_threshold,
                recovery_timeout,
                half_open_max_calls,
            ))),
            enabled,
        }
    }

    pub fn disabled() -> Self {
        Self::new(1, Duration::ZERO, 1, false)
    }

    pub fn from_config(cfg: &configs::ReferenceServiceConfig) -> Self {
        let cb = &cfg.circuit_breaker;
        Self::new(cb.failure_threshold, cfg.recovery_timeout(), cb.half_open_max_calls, cb.enabled)
    }

    pub async fn can_execute(&self) -> bool {
        if !self.enabled {
            return true;
        }
        self.inner.lock().await.can_execute()
    }

    pub async fn record_success(&self) {
        if self.enabled {
            self.inner.lock().await.record_success();
        }
    }

    pub async fn record_failure(&self) {
        if self.enabled {
            self.inner.lock().await.record_failure();
        }
    }

    pub async fn state(&self) -> CircuitState {
        if !self.enabled {
            return CircuitState::Closed;
        }
        self.inner.lock().await.state
    }
}
