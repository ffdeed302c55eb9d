//! Per-destination rate limiting for outbound requests.

use super::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Named rate-limit profile assigned to a destination host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitTier {
    Standard,
    Conservative,
    /// Applied to every host missing from the table.
    UltraSafe,
}

impl RateLimitTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Conservative => "conservative",
            Self::UltraSafe => "ultra_safe",
        }
    }
}

impl fmt::Display for RateLimitTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    pub limit_for_period: u32,
    pub refresh_period_secs: u64,
    /// How long a caller may block waiting for a permit.
    pub timeout_secs: u64,
}

impl TierConfig {
    pub fn new(limit_for_period: u32, refresh_period_secs: u64, timeout_secs: u64) -> Self {
        Self {
            limit_for_period,
            refresh_period_secs,
            timeout_secs,
        }
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_period_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig::per_period(self.limit_for_period, self.refresh_period())
            .unwrap_or_else(|| RateLimiterConfig::new().with_max_tokens(1).with_refill_rate(1.0))
            .with_timeout(self.timeout())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub standard: TierConfig,
    pub conservative: TierConfig,
    pub ultra_safe: TierConfig,
    /// Host (without `www.`) to tier.
    pub hosts: HashMap<String, RateLimitTier>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        let hosts = [
            ("medium.com", RateLimitTier::Conservative),
            ("substack.com", RateLimitTier::Conservative),
            ("dev.to", RateLimitTier::Standard),
            ("github.blog", RateLimitTier::Standard),
        ]
        .into_iter()
        .map(|(h, t)| (h.to_string(), t))
        .collect();
        Self {
            standard: TierConfig::new(10, 1, 30),
            conservative: TierConfig::new(2, 1, 30),
            ultra_safe: TierConfig::new(1, 2, 60),
            hosts,
        }
    }
}

impl RateLimitSettings {
    pub fn tier_config(&self, tier: RateLimitTier) -> &TierConfig {
        match tier {
            RateLimitTier::Standard => &self.standard,
            RateLimitTier::Conservative => &self.conservative,
            RateLimitTier::UltraSafe => &self.ultra_safe,
        }
    }

    pub fn tier_for_host(&self, host: &str) -> RateLimitTier {
        self.hosts
            .get(host)
            .copied()
            .unwrap_or(RateLimitTier::UltraSafe)
    }

    pub fn with_host(mut self, host: impl Into<String>, tier: RateLimitTier) -> Self {
        self.hosts.insert(host.into(), tier);
        self
    }
}

/// Randomized pre-fetch delay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterConfig {
    pub enabled: bool,
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_ms: 500,
            max_ms: 2_000,
        }
    }
}

impl JitterConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// A uniformly random delay in `[min_ms, max_ms]`, or `None` when disabled.
    pub fn sample(&self) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        let (lo, hi) = if self.min_ms <= self.max_ms {
            (self.min_ms, self.max_ms)
        } else {
            (self.max_ms, self.min_ms)
        };
        let span = hi - lo;
        let offset = (rand::random::<f64>() * (span as f64 + 1.0)).floor() as u64;
        Some(Duration::from_millis(lo + offset.min(span)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimiterKey {
    pub host: String,
    pub tier: RateLimitTier,
}

/// Host of `raw` without scheme, port, path or a leading `www.`, lowercased.
pub fn extract_host(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("https://{}", trimmed)).ok());

    let host = parsed
        .as_ref()
        .and_then(|u| u.host_str())
        .map(|h| h.to_ascii_lowercase())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| {
            Error::validation_with_context(
                "cannot extract host",
                ErrorContext::new()
                    .with_details(trimmed.to_string())
                    .with_source("domain_rate_limiter"),
            )
        })?;

    Ok(host
        .strip_prefix("www.")
        .map(str::to_string)
        .unwrap_or(host))
}

/// Registry of shared limiters, one per `(host, tier)`.
///
/// Construct once per process and share through `Arc`; every caller targeting
/// the same host then draws from the same bucket.
pub struct DomainRateLimiterManager {
    settings: RateLimitSettings,
    jitter: JitterConfig,
    limiters: RwLock<HashMap<RateLimiterKey, Arc<RateLimiter>>>,
}

impl DomainRateLimiterManager {
    pub fn new(settings: RateLimitSettings, jitter: JitterConfig) -> Self {
        Self {
            settings,
            jitter,
            limiters: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    pub fn key_for(&self, url: &str) -> Result<RateLimiterKey> {
        let host = extract_host(url)?;
        let tier = self.settings.tier_for_host(&host);
        Ok(RateLimiterKey { host, tier })
    }

    /// Shared limiter for the destination of `url`, created on first use.
    pub fn limiter_for(&self, url: &str) -> Result<Arc<RateLimiter>> {
        let key = self.key_for(url)?;
        {
            let limiters = self.limiters.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(l) = limiters.get(&key) {
                return Ok(l.clone());
            }
        }

        let mut limiters = self.limiters.write().unwrap_or_else(PoisonError::into_inner);
        let limiter = limiters.entry(key.clone()).or_insert_with(|| {
            let tier = self.settings.tier_config(key.tier);
            debug!(
                host = %key.host,
                tier = %key.tier,
                limit_for_period = tier.limit_for_period,
                refresh_period_secs = tier.refresh_period_secs,
                "rate limiter created"
            );
            Arc::new(RateLimiter::with_label(key.host.clone(), tier.limiter_config()))
        });
        Ok(limiter.clone())
    }

    pub fn limiter_count(&self) -> usize {
        self.limiters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Sleep for a random jitter delay, if enabled.
    pub async fn apply_jitter(&self) {
        if let Some(delay) = self.jitter.sample() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Jitter, then wait for a permit on the destination's limiter.
    /// Call before every outbound fetch.
    pub async fn throttle(&self, url: &str) -> Result<()> {
        let limiter = self.limiter_for(url)?;
        self.apply_jitter().await;
        limiter.acquire().await
    }
}

impl Default for DomainRateLimiterManager {
    fn default() -> Self {
        Self::new(RateLimitSettings::default(), JitterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_host() {
        assert_eq!(extract_host("https://www.Example.com:8443/a/b?q=1").unwrap(), "example.com");
        assert_eq!(extract_host("blog.example.org/posts/1").unwrap(), "blog.example.org");
        assert_eq!(extract_host("example.net:8080/feed").unwrap(), "example.net");
        assert_eq!(extract_host("http://www.medium.com").unwrap(), "medium.com");
        assert!(extract_host("").is_err());
        assert!(extract_host("   ").is_err());
    }

    #[test]
    fn test_unknown_host_is_ultra_safe() {
        let m = DomainRateLimiterManager::new(RateLimitSettings::default(), JitterConfig::disabled());
        let key = m.key_for("https://foo.example.com/x").unwrap();
        assert_eq!(key.host, "foo.example.com");
        assert_eq!(key.tier, RateLimitTier::UltraSafe);
        assert_eq!(
            m.key_for("https://www.medium.com/@someone").unwrap().tier,
            RateLimitTier::Conservative
        );
    }

    #[test]
    fn test_shared_instances() {
        let m = DomainRateLimiterManager::new(RateLimitSettings::default(), JitterConfig::disabled());
        let a = m.limiter_for("https://foo.example.com/1").unwrap();
        let b = m.limiter_for("http://foo.example.com:81/2").unwrap();
        let c = m.limiter_for("https://medium.com/3").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(m.limiter_count(), 2);
        assert_eq!(a.label(), "foo.example.com");
    }

    #[test]
    fn test_limiter_uses_tier_config() {
        let settings = RateLimitSettings::default()
            .with_host("fast.example.com", RateLimitTier::Standard);
        let m = DomainRateLimiterManager::new(settings, JitterConfig::disabled());
        let l = m.limiter_for("fast.example.com").unwrap();
        assert_eq!(l.config().burst, 10.0);
        assert_eq!(l.config().rps, 10.0);
        assert_eq!(l.config().timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_jitter_bounds() {
        let j = JitterConfig {
            enabled: true,
            min_ms: 10,
            max_ms: 20,
        };
        for _ in 0..200 {
            let d = j.sample().unwrap();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
        assert!(JitterConfig::disabled().sample().is_none());
        let fixed = JitterConfig {
            enabled: true,
            min_ms: 7,
            max_ms: 7,
        };
        assert_eq!(fixed.sample(), Some(Duration::from_millis(7)));
    }

    #[test]
    fn test_tier_names_in_yaml() {
        let settings: RateLimitSettings =
            serde_yaml::from_str("hosts:\n  news.example.com: conservative\n").unwrap();
        assert_eq!(settings.tier_for_host("news.example.com"), RateLimitTier::Conservative);
        // unspecified tiers keep their defaults
        assert_eq!(settings.ultra_safe, RateLimitSettings::default().ultra_safe);
    }
}
