use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::provider::Provider;

const DEFAULT_SAMPLE_MAX_CHARS: usize = 15_000;
const DEFAULT_SAMPLE_SEGMENTS: usize = 10;
const DEFAULT_CACHE_MAX_ENTRIES: usize = 100;
const DEFAULT_CACHE_TTL_SECONDS: u64 = 600;
const DEFAULT_MEMORY_CAPACITY_PAIRS: usize = 5;
const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_CHAT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be a valid integer")]
    ParseInt(String),
    #[error("{0} must be a valid number")]
    ParseFloat(String),
    #[error("{0} is not a known provider")]
    ParseProvider(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingConfig {
    pub max_chars: usize,
    pub segments: usize,
    pub max_lines_per_segment: Option<usize>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_SAMPLE_MAX_CHARS,
            segments: DEFAULT_SAMPLE_SEGMENTS,
            max_lines_per_segment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    pub capacity_pairs: usize,
    pub idle_ttl_seconds: Option<u64>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity_pairs: DEFAULT_MEMORY_CAPACITY_PAIRS,
            idle_ttl_seconds: None,
        }
    }
}

impl MemoryConfig {
    pub fn idle_ttl(&self) -> Option<Duration> {
        self.idle_ttl_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub provider: Provider,
    pub model: Option<String>,
    pub temperature: f32,
    pub chat_temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            chat_temperature: DEFAULT_CHAT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageonConfig {
    pub sampling: SamplingConfig,
    pub cache: CacheConfig,
    pub memory: MemoryConfig,
    pub generation: GenerationConfig,
}

impl PageonConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        config.sampling.max_chars =
            parse_usize_env("PAGEON_SAMPLE_MAX_CHARS", config.sampling.max_chars)?;
        config.sampling.segments =
            parse_usize_env("PAGEON_SAMPLE_SEGMENTS", config.sampling.segments)?;
        config.sampling.max_lines_per_segment =
            parse_optional_usize_env("PAGEON_SAMPLE_MAX_LINES_PER_SEGMENT")?;

        config.cache.max_entries =
            parse_usize_env("PAGEON_CACHE_MAX_ENTRIES", config.cache.max_entries)?;
        config.cache.ttl_seconds =
            parse_u64_env("PAGEON_CACHE_TTL_SECONDS", config.cache.ttl_seconds)?;

        config.memory.capacity_pairs =
            parse_usize_env("PAGEON_MEMORY_CAPACITY", config.memory.capacity_pairs)?;
        config.memory.idle_ttl_seconds = parse_optional_usize_env("PAGEON_MEMORY_IDLE_TTL_SECONDS")?
            .map(|secs| secs as u64);

        if let Some(raw) = optional_trimmed_env("PAGEON_PROVIDER") {
            config.generation.provider = raw
                .parse()
                .map_err(|_| ConfigError::ParseProvider("PAGEON_PROVIDER".to_string()))?;
        }
        config.generation.model = optional_trimmed_env("PAGEON_MODEL");
        config.generation.temperature =
            parse_f32_env("PAGEON_TEMPERATURE", config.generation.temperature)?;
        config.generation.chat_temperature =
            parse_f32_env("PAGEON_CHAT_TEMPERATURE", config.generation.chat_temperature)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling.max_chars == 0 {
            return Err(ConfigError::Invalid(
                "sampling max_chars must be greater than 0".to_string(),
            ));
        }
        if self.sampling.segments == 0 {
            return Err(ConfigError::Invalid(
                "sampling segments must be greater than 0".to_string(),
            ));
        }
        if self.sampling.max_lines_per_segment == Some(0) {
            return Err(ConfigError::Invalid(
                "sampling max_lines_per_segment must be greater than 0".to_string(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "cache max_entries must be greater than 0".to_string(),
            ));
        }
        if self.memory.capacity_pairs == 0 {
            return Err(ConfigError::Invalid(
                "memory capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn optional_trimmed_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_usize_env(key: &str, default: usize) -> Result<usize, ConfigError> {
    match optional_trimmed_env(key) {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| ConfigError::ParseInt(key.to_string())),
        None => Ok(default),
    }
}

fn parse_u64_env(key: &str, default: u64) -> Result<u64, ConfigError> {
    match optional_trimmed_env(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| ConfigError::ParseInt(key.to_string())),
        None => Ok(default),
    }
}

fn parse_optional_usize_env(key: &str) -> Result<Option<usize>, ConfigError> {
    optional_trimmed_env(key)
        .map(|raw| {
            raw.parse::<usize>()
                .map_err(|_| ConfigError::ParseInt(key.to_string()))
        })
        .transpose()
}

fn parse_f32_env(key: &str, default: f32) -> Result<f32, ConfigError> {
    match optional_trimmed_env(key) {
        Some(raw) => raw
            .parse::<f32>()
            .map_err(|_| ConfigError::ParseFloat(key.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PageonConfig::default();
        assert_eq!(config.sampling.max_chars, 15_000);
        assert_eq!(config.sampling.segments, 10);
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.cache.ttl(), Duration::from_secs(600));
        assert_eq!(config.memory.capacity_pairs, 5);
        assert!(config.memory.idle_ttl().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_capacities() {
        let mut config = PageonConfig::default();
        config.cache.max_entries = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PageonConfig::default();
        config.sampling.segments = 0;
        assert!(config.validate().is_err());

        let mut config = PageonConfig::default();
        config.sampling.max_lines_per_segment = Some(0);
        assert!(config.validate().is_err());
    }
}
