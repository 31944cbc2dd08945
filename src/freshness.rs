// Freshness policy.
// Classifies a cache entry's age against the refetch and invalid thresholds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default refetch threshold: 5 minutes.
pub const DEFAULT_REFETCH_AFTER: Duration = Duration::from_secs(5 * 60);

/// Default invalid threshold: 3 days.
pub const DEFAULT_INVALID_AFTER: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// How a cached entry may be used, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Freshness {
    /// Serve the cached payload, no refresh.
    Fresh,
    /// Serve the cached payload and refresh in the background.
    Stale,
    /// Do not serve; fetch before producing data.
    Expired,
}

impl Freshness {
    /// Whether the cached payload may be shown.
    pub fn is_servable(self) -> bool {
        !matches!(self, Freshness::Expired)
    }
}

/// Refetch and invalid thresholds for one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Age at which cached data triggers a background refresh.
    #[serde(rename = "refetch_secs", with = "secs")]
    pub refetch_after: Duration,
    /// Age at which cached data must no longer be served.
    #[serde(rename = "invalid_secs", with = "secs")]
    pub invalid_after: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            refetch_after: DEFAULT_REFETCH_AFTER,
            invalid_after: DEFAULT_INVALID_AFTER,
        }
    }
}

impl Thresholds {
    pub fn new(refetch_after: Duration, invalid_after: Duration) -> Self {
        Self {
            refetch_after,
            invalid_after,
        }
    }

    /// Classify an entry age. `None` means no entry.
    ///
    /// A forced refetch treats the refetch threshold as zero, so any
    /// servable entry is stale.
    pub fn classify(&self, age: Option<Duration>, force: bool) -> Freshness {
        let Some(age) = age else {
            return Freshness::Expired;
        };

        if age >= self.invalid_after {
            return Freshness::Expired;
        }

        let refetch_after = if force {
            Duration::ZERO
        } else {
            self.refetch_after
        };

        if age >= refetch_after {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Option<Duration> {
        Some(Duration::from_secs(n))
    }

    #[test]
    fn test_missing_entry_is_expired() {
        let t = Thresholds::default();
        assert_eq!(t.classify(None, false), Freshness::Expired);
        assert_eq!(t.classify(None, true), Freshness::Expired);
    }

    #[test]
    fn test_boundaries() {
        let t = Thresholds::default();
        assert_eq!(t.classify(secs(0), false), Freshness::Fresh);
        assert_eq!(t.classify(secs(299), false), Freshness::Fresh);
        assert_eq!(t.classify(secs(300), false), Freshness::Stale);
        assert_eq!(t.classify(secs(259_199), false), Freshness::Stale);
        assert_eq!(t.classify(secs(259_200), false), Freshness::Expired);
        assert_eq!(t.classify(secs(300_000), false), Freshness::Expired);
    }

    #[test]
    fn test_force_makes_servable_entries_stale() {
        let t = Thresholds::default();
        assert_eq!(t.classify(secs(0), true), Freshness::Stale);
        assert_eq!(t.classify(secs(10), true), Freshness::Stale);
        assert_eq!(t.classify(secs(300_000), true), Freshness::Expired);
    }

    #[test]
    fn test_monotonic_in_age() {
        let thresholds = [
            Thresholds::default(),
            Thresholds::new(Duration::from_secs(5), Duration::from_secs(60)),
            Thresholds::new(Duration::from_secs(60), Duration::from_secs(5)),
            Thresholds::new(Duration::ZERO, Duration::ZERO),
        ];

        for t in thresholds {
            for force in [false, true] {
                let mut prev = Freshness::Fresh;
                for age in (0..400_000).step_by(97) {
                    let current = t.classify(secs(age), force);
                    assert!(current >= prev, "{t:?} regressed at age {age}");
                    prev = current;
                }
            }
        }
    }

    #[test]
    fn test_thresholds_serialize_as_seconds() {
        let json = serde_json::to_value(Thresholds::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "refetch_secs": 300, "invalid_secs": 259200 })
        );
    }
}
