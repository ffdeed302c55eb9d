use crate::{Error, Result};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RateLimiterSnapshot {
    pub rps: f64,
    pub burst: f64,
    pub tokens: f64,
    /// Estimated wait time until a token is available (ms), if currently empty.
    pub estimated_wait_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Tokens per second.
    pub rps: f64,
    /// Maximum burst size (tokens).
    pub burst: f64,
    /// Longest time `acquire` may block before giving up.
    pub timeout: Option<Duration>,
}

impl RateLimiterConfig {
    pub fn from_rps(rps: f64) -> Option<Self> {
        if !rps.is_finite() || rps < 0.0 {
            return None;
        }
        Some(Self {
            rps,
            burst: rps.max(1.0), // default burst: 1 second worth, at least 1
            timeout: None,
        })
    }

    /// `limit` permits every `period`, all available as a burst at start.
    pub fn per_period(limit: u32, period: Duration) -> Option<Self> {
        let secs = period.as_secs_f64();
        if limit == 0 || secs <= 0.0 {
            return None;
        }
        Some(Self {
            rps: limit as f64 / secs,
            burst: limit as f64,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug)]
struct State {
    tokens: f64,
    last: Instant,
    /// Absolute time until which the destination asked us to back off
    blocked_until: Option<Instant>,
}

/// Token-bucket rate limiter, safe for concurrent acquisition.
///
/// - `rps == 0` disables local limiting (only external blocks apply)
/// - Best-effort fairness for async tasks
pub struct RateLimiter {
    label: String,
    cfg: RateLimiterConfig,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Self {
        Self::with_label("default", cfg)
    }

    /// `label` names the destination in errors and logs (usually the host).
    pub fn with_label(label: impl Into<String>, cfg: RateLimiterConfig) -> Self {
        let burst = cfg.burst;
        let state = Mutex::new(State {
            tokens: burst,
            last: Instant::now(),
            blocked_until: None,
        });
        Self {
            label: label.into(),
            cfg,
            state,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.cfg
    }

    fn refill_locked(cfg: &RateLimiterConfig, st: &mut State) {
        let now = Instant::now();
        let elapsed = now.duration_since(st.last).as_secs_f64();
        if elapsed > 0.0 {
            st.tokens = (st.tokens + elapsed * cfg.rps).min(cfg.burst);
            st.last = now;
        }
    }

    /// Acquire one permit, sleeping as needed.
    ///
    /// Fails with [`Error::RateLimitExceeded`] as soon as the expected wait
    /// would run past the configured timeout.
    pub async fn acquire(&self) -> Result<()> {
        let cfg = &self.cfg;
        let deadline = cfg.timeout.map(|t| Instant::now() + t);

        loop {
            let wait_duration = {
                let mut st = self.state.lock().await;
                let now = Instant::now();

                match st.blocked_until {
                    Some(until) if until > now => until.duration_since(now),
                    _ => {
                        st.blocked_until = None;
                        if cfg.rps <= 0.0 {
                            return Ok(());
                        }

                        Self::refill_locked(cfg, &mut st);
                        if st.tokens >= 1.0 {
                            st.tokens -= 1.0;
                            return Ok(());
                        }

                        let missing = 1.0 - st.tokens;
                        Duration::from_secs_f64(missing / cfg.rps)
                    }
                }
            };

            if let (Some(deadline), Some(timeout)) = (deadline, cfg.timeout) {
                if Instant::now() + wait_duration > deadline {
                    return Err(Error::RateLimitExceeded {
                        host: self.label.clone(),
                        waited: timeout,
                    });
                }
            }

            if !wait_duration.is_zero() {
                tokio::time::sleep(wait_duration).await;
            }
        }
    }

    /// Try to acquire a token without waiting, returns true if successful
    pub async fn try_acquire(&self) -> bool {
        let cfg = &self.cfg;
        let mut st = self.state.lock().await;
        if let Some(until) = st.blocked_until {
            if until > Instant::now() {
                return false;
            }
            st.blocked_until = None;
        }
        if cfg.rps <= 0.0 {
            return true;
        }

        Self::refill_locked(cfg, &mut st);
        if st.tokens >= 1.0 {
            st.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Stop handing out permits for `duration` (e.g. after a 429 with Retry-After).
    pub async fn pause_for(&self, duration: Duration) {
        let mut st = self.state.lock().await;
        let until = Instant::now() + duration;
        st.blocked_until = Some(st.blocked_until.map_or(until, |cur| cur.max(until)));
    }

    pub async fn snapshot(&self) -> RateLimiterSnapshot {
        let cfg = &self.cfg;
        let mut st = self.state.lock().await;
        let now = Instant::now();

        let mut wait_ms = None;
        if let Some(until) = st.blocked_until {
            if until > now {
                wait_ms = Some(until.duration_since(now).as_millis() as u64);
            }
        }

        if cfg.rps > 0.0 {
            Self::refill_locked(cfg, &mut st);
            if st.tokens < 1.0 {
                let missing = 1.0 - st.tokens;
                let local_wait_ms = (missing / cfg.rps * 1000.0) as u64;
                wait_ms = Some(wait_ms.unwrap_or(0).max(local_wait_ms));
            }
        }

        RateLimiterSnapshot {
            rps: cfg.rps,
            burst: cfg.burst,
            tokens: st.tokens,
            estimated_wait_ms: wait_ms,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self {
            rps: 10.0,
            burst: 10.0,
            timeout: None,
        }
    }

    /// Set the maximum tokens (burst size)
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.burst = tokens as f64;
        self
    }

    /// Set the refill rate (tokens per second)
    pub fn with_refill_rate(mut self, rate: f64) -> Self {
        self.rps = rate;
        self
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_config_from_rps() {
        let config = RateLimiterConfig::from_rps(0.5).unwrap();
        assert_eq!(config.rps, 0.5);
        // burst should be at least 1.0
        assert_eq!(config.burst, 1.0);
        assert!(RateLimiterConfig::from_rps(-1.0).is_none());
        assert!(RateLimiterConfig::from_rps(f64::NAN).is_none());
    }

    #[test]
    fn test_per_period() {
        let config = RateLimiterConfig::per_period(4, Duration::from_secs(2)).unwrap();
        assert_eq!(config.rps, 2.0);
        assert_eq!(config.burst, 4.0);
        assert!(RateLimiterConfig::per_period(0, Duration::from_secs(1)).is_none());
        assert!(RateLimiterConfig::per_period(1, Duration::ZERO).is_none());
    }

    #[tokio::test]
    async fn test_rate_limiter_try_acquire() {
        let config = RateLimiterConfig::new()
            .with_max_tokens(3)
            .with_refill_rate(1.0);
        let limiter = RateLimiter::new(config);

        assert!(limiter.try_acquire().await);
        assert!(limiter.try_acquire().await);
        assert!(limiter.try_acquire().await);

        // Fourth should fail (no tokens left)
        assert!(!limiter.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_refill() {
        let config = RateLimiterConfig::per_period(1, Duration::from_secs(1)).unwrap();
        let limiter = RateLimiter::new(config);

        let start = Instant::now();
        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(990));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out() {
        let config = RateLimiterConfig::per_period(1, Duration::from_secs(10))
            .unwrap()
            .with_timeout(Duration::from_secs(1));
        let limiter = RateLimiter::with_label("slow.example.org", config);

        limiter.acquire().await.unwrap();
        match limiter.acquire().await {
            Err(Error::RateLimitExceeded { host, waited }) => {
                assert_eq!(host, "slow.example.org");
                assert_eq!(waited, Duration::from_secs(1));
            }
            other => panic!("expected rate limit error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limiter_zero_rps() {
        let limiter = RateLimiter::new(RateLimiterConfig::from_rps(0.0).unwrap());
        // Zero RPS means unlimited
        for _ in 0..100 {
            assert!(limiter.acquire().await.is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_for_blocks_permits() {
        let limiter = RateLimiter::new(RateLimiterConfig::from_rps(100.0).unwrap());
        limiter.pause_for(Duration::from_millis(500)).await;
        assert!(!limiter.try_acquire().await);
        assert!(limiter.snapshot().await.estimated_wait_ms.is_some());

        let start = Instant::now();
        limiter.acquire().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_rate_limiter_snapshot() {
        let config = RateLimiterConfig::new()
            .with_max_tokens(10)
            .with_refill_rate(5.0);
        let limiter = RateLimiter::new(config);

        let snapshot = limiter.snapshot().await;
        assert_eq!(snapshot.rps, 5.0);
        assert_eq!(snapshot.burst, 10.0);
        assert!(snapshot.tokens > 0.0);
        assert!(snapshot.estimated_wait_ms.is_none());
    }
}
