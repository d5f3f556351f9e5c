//! Configuration resolution for civic-intake
//!
//! Runtime tuning comes from the database `settings` table; secrets are
//! resolved with Database → ENV → TOML priority.

use crate::db::settings;
use civic_common::config::TomlConfig;
use civic_common::Result;
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

/// Environment variable holding the captioner API key
pub const CAPTIONER_API_KEY_ENV: &str = "CIVIC_CAPTIONER_API_KEY";

/// Duplicate-detection tuning loaded from the settings table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntakeSettings {
    /// Minimum visual similarity for a duplicate candidate at submission
    pub duplicate_similarity_threshold: f32,
    /// Spatial duplicate radius
    pub duplicate_radius_meters: f64,
    /// Visual candidates fetched per submission
    pub duplicate_search_k: usize,
    /// Default threshold for "similar issues" lookups
    pub similar_default_threshold: f32,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            duplicate_similarity_threshold: 0.92,
            duplicate_radius_meters: 50.0,
            duplicate_search_k: 5,
            similar_default_threshold: 0.85,
        }
    }
}

impl IntakeSettings {
    /// Load from the settings table
    ///
    /// Missing, unparsable or out-of-range values fall back to the built-in
    /// default with a warning.
    pub async fn load(db: &Pool<Sqlite>) -> Result<Self> {
        let defaults = Self::default();

        let settings = Self {
            duplicate_similarity_threshold: load_or_default(
                db,
                "duplicate_similarity_threshold",
                defaults.duplicate_similarity_threshold,
                |v: &f32| (-1.0..=1.0).contains(v),
            )
            .await?,
            duplicate_radius_meters: load_or_default(
                db,
                "duplicate_radius_meters",
                defaults.duplicate_radius_meters,
                |v: &f64| v.is_finite() && *v >= 0.0,
            )
            .await?,
            duplicate_search_k: load_or_default(
                db,
                "duplicate_search_k",
                defaults.duplicate_search_k,
                |v: &usize| *v >= 1,
            )
            .await?,
            similar_default_threshold: load_or_default(
                db,
                "similar_default_threshold",
                defaults.similar_default_threshold,
                |v: &f32| (-1.0..=1.0).contains(v),
            )
            .await?,
        };

        info!(
            threshold = settings.duplicate_similarity_threshold,
            radius_meters = settings.duplicate_radius_meters,
            k = settings.duplicate_search_k,
            "Duplicate detection settings loaded"
        );
        Ok(settings)
    }
}

async fn load_or_default<T>(
    db: &Pool<Sqlite>,
    key: &str,
    default: T,
    valid: fn(&T) -> bool,
) -> Result<T>
where
    T: std::str::FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    match settings::get_setting::<T>(db, key).await {
        Ok(Some(value)) if valid(&value) => Ok(value),
        Ok(Some(value)) => {
            warn!("Setting '{}' out of range ({}), using default {}", key, value, default);
            Ok(default)
        }
        Ok(None) => {
            warn!("Setting '{}' missing, using default {}", key, default);
            Ok(default)
        }
        Err(civic_common::Error::Config(message)) => {
            warn!("{}; using default {}", message, default);
            Ok(default)
        }
        Err(e) => Err(e),
    }
}

/// Resolve the captioner API key from 3-tier configuration
///
/// **Priority:** Database → ENV → TOML
///
/// A missing key is not an error: captioning then degrades to the
/// "unavailable" default.
pub async fn resolve_captioner_api_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let db_key = settings::get_captioner_api_key(db).await?;
    let env_key = std::env::var(CAPTIONER_API_KEY_ENV).ok();
    let toml_key = toml_config.captioner.api_key.clone();

    let candidates = [
        ("database", db_key),
        ("environment", env_key),
        ("TOML", toml_key),
    ];

    let sources: Vec<&str> = candidates
        .iter()
        .filter(|(_, key)| key.as_deref().is_some_and(is_valid_key))
        .map(|(source, _)| *source)
        .collect();

    if sources.len() > 1 {
        warn!(
            "Captioner API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    for (source, key) in candidates {
        if let Some(key) = key.filter(|k| is_valid_key(k)) {
            info!("Captioner API key loaded from {}", source);
            return Ok(Some(key));
        }
    }

    warn!(
        "Captioner API key not configured (set it in the database, {} or the TOML [captioner] section)",
        CAPTIONER_API_KEY_ENV
    );
    Ok(None)
}

/// Non-empty, non-whitespace
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
