use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Linear weight of the content-similarity component
    #[serde(default = "default_weight_content")]
    pub weight_content: f64,

    /// Linear weight of the collaborative-affinity component
    #[serde(default = "default_weight_collaborative")]
    pub weight_collaborative: f64,

    /// Linear weight of the popularity component
    #[serde(default = "default_weight_popularity")]
    pub weight_popularity: f64,

    /// Linear weight of the distance-decay component
    #[serde(default = "default_weight_proximity")]
    pub weight_proximity: f64,

    /// Expanding geofilter radius ladder, in kilometers (comma-separated)
    #[serde(default = "default_radius_ladder_km")]
    pub radius_ladder_km: Vec<f64>,

    /// Stop expanding the radius once this many candidates are found
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,

    /// Hard cap on the candidate set size
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Days during which a visited item stays excluded from candidates
    #[serde(default = "default_exclusion_window_days")]
    pub exclusion_window_days: i64,

    /// Half-life of interaction affinity decay, in days
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,

    /// Distance beyond which the proximity component floors at zero
    #[serde(default = "default_distance_cutoff_km")]
    pub distance_cutoff_km: f64,

    /// Sliding-window cap on consecutive same-category results
    #[serde(default = "default_max_per_category")]
    pub max_per_category: usize,

    /// Recommendation cache time-to-live, in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// How far back interactions are fetched for affinity, in days. The
    /// fetch is widened to the exclusion window when that is longer, so
    /// visit exclusion never misses a qualifying visit.
    #[serde(default = "default_interaction_lookback_days")]
    pub interaction_lookback_days: i64,

    /// Bounded retries for transient read-only store failures
    #[serde(default = "default_store_read_retries")]
    pub store_read_retries: u32,

    /// Base backoff between store read retries, in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_weight_content() -> f64 {
    0.35
}

fn default_weight_collaborative() -> f64 {
    0.35
}

fn default_weight_popularity() -> f64 {
    0.15
}

fn default_weight_proximity() -> f64 {
    0.15
}

fn default_radius_ladder_km() -> Vec<f64> {
    vec![5.0, 15.0, 50.0]
}

fn default_min_candidates() -> usize {
    20
}

fn default_max_candidates() -> usize {
    500
}

fn default_exclusion_window_days() -> i64 {
    30
}

fn default_half_life_days() -> f64 {
    30.0
}

fn default_distance_cutoff_km() -> f64 {
    75.0
}

fn default_max_per_category() -> usize {
    3
}

fn default_cache_ttl_secs() -> u64 {
    600
}

fn default_interaction_lookback_days() -> i64 {
    180
}

fn default_store_read_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    50
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Validates engine settings eagerly and freezes them into an immutable
    /// `EngineConfig`. Called once at startup; a bad configuration fails the
    /// process before any request is served.
    pub fn engine(&self) -> AppResult<EngineConfig> {
        let weights = ScoringWeights {
            content: self.weight_content,
            collaborative: self.weight_collaborative,
            popularity: self.weight_popularity,
            proximity: self.weight_proximity,
        };
        weights.validate()?;

        if self.radius_ladder_km.is_empty() {
            return Err(AppError::InvalidConfig(
                "radius ladder must not be empty".to_string(),
            ));
        }
        for window in self.radius_ladder_km.windows(2) {
            if window[1] <= window[0] {
                return Err(AppError::InvalidConfig(format!(
                    "radius ladder must be strictly ascending, got {:?}",
                    self.radius_ladder_km
                )));
            }
        }
        if self.radius_ladder_km[0] <= 0.0 || !self.radius_ladder_km.iter().all(|r| r.is_finite()) {
            return Err(AppError::InvalidConfig(format!(
                "radius ladder entries must be positive and finite, got {:?}",
                self.radius_ladder_km
            )));
        }

        if self.min_candidates == 0 || self.min_candidates > self.max_candidates {
            return Err(AppError::InvalidConfig(format!(
                "candidate bounds invalid: min {} max {}",
                self.min_candidates, self.max_candidates
            )));
        }
        if self.max_per_category == 0 {
            return Err(AppError::InvalidConfig(
                "max_per_category must be at least 1".to_string(),
            ));
        }
        if !(self.half_life_days > 0.0) {
            return Err(AppError::InvalidConfig(format!(
                "half-life must be positive, got {}",
                self.half_life_days
            )));
        }
        if !(self.distance_cutoff_km > 0.0) {
            return Err(AppError::InvalidConfig(format!(
                "distance cutoff must be positive, got {}",
                self.distance_cutoff_km
            )));
        }
        if self.exclusion_window_days < 0 || self.interaction_lookback_days < 0 {
            return Err(AppError::InvalidConfig(
                "time windows must not be negative".to_string(),
            ));
        }

        Ok(EngineConfig {
            weights,
            radius_ladder_km: self.radius_ladder_km.clone(),
            min_candidates: self.min_candidates,
            max_candidates: self.max_candidates,
            exclusion_window: chrono::Duration::days(self.exclusion_window_days),
            half_life_days: self.half_life_days,
            distance_cutoff_km: self.distance_cutoff_km,
            max_per_category: self.max_per_category,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            interaction_lookback: chrono::Duration::days(self.interaction_lookback_days),
            store_read_retries: self.store_read_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        })
    }
}

/// Linear weights of the four scoring components; must sum to 1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub content: f64,
    pub collaborative: f64,
    pub popularity: f64,
    pub proximity: f64,
}

impl ScoringWeights {
    const SUM_TOLERANCE: f64 = 1e-6;

    pub fn validate(&self) -> AppResult<()> {
        let all = [
            self.content,
            self.collaborative,
            self.popularity,
            self.proximity,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0 || *w > 1.0) {
            return Err(AppError::InvalidWeightConfig {
                reason: format!("each weight must be within [0, 1], got {:?}", all),
            });
        }
        let sum: f64 = all.iter().sum();
        if (sum - 1.0).abs() > Self::SUM_TOLERANCE {
            return Err(AppError::InvalidWeightConfig {
                reason: format!("weights must sum to 1.0, got {}", sum),
            });
        }
        Ok(())
    }
}

/// Immutable engine settings, constructed once at startup and passed
/// explicitly into each pipeline component
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub weights: ScoringWeights,
    pub radius_ladder_km: Vec<f64>,
    pub min_candidates: usize,
    pub max_candidates: usize,
    pub exclusion_window: chrono::Duration,
    pub half_life_days: f64,
    pub distance_cutoff_km: f64,
    pub max_per_category: usize,
    pub cache_ttl: Duration,
    pub interaction_lookback: chrono::Duration,
    pub store_read_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights {
                content: default_weight_content(),
                collaborative: default_weight_collaborative(),
                popularity: default_weight_popularity(),
                proximity: default_weight_proximity(),
            },
            radius_ladder_km: default_radius_ladder_km(),
            min_candidates: default_min_candidates(),
            max_candidates: default_max_candidates(),
            exclusion_window: chrono::Duration::days(default_exclusion_window_days()),
            half_life_days: default_half_life_days(),
            distance_cutoff_km: default_distance_cutoff_km(),
            max_per_category: default_max_per_category(),
            cache_ttl: Duration::from_secs(default_cache_ttl_secs()),
            interaction_lookback: chrono::Duration::days(default_interaction_lookback_days()),
            store_read_retries: default_store_read_retries(),
            retry_backoff: Duration::from_millis(default_retry_backoff_ms()),
        }
    }
}
