//! YouTube search through SerpAPI, cached per parameter set.

use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    cache::{CacheStats, ResponseCache, cache_key},
    config::CacheConfig,
    error::SearchError,
};

const SERP_API_URL: &str = "https://serpapi.com/search";
const SERP_API_KEY_ENV: &str = "SERP_API_KEY";
const DEFAULT_LIMIT: usize = 50;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationFilter {
    #[default]
    Any,
    /// Under 20 minutes.
    Short,
    /// 20 minutes up to an hour.
    Medium,
    /// An hour or longer.
    Long,
}

impl DurationFilter {
    /// Half-open `[min, max)` range in seconds, `None` for `Any`.
    pub fn range(self) -> Option<(u64, u64)> {
        match self {
            Self::Any => None,
            Self::Short => Some((0, 1200)),
            Self::Medium => Some((1200, 3600)),
            Self::Long => Some((3600, u64::MAX)),
        }
    }

    pub fn matches(self, seconds: u64) -> bool {
        self.range()
            .is_none_or(|(min, max)| min <= seconds && seconds < max)
    }
}

impl FromStr for DurationFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            _ => Err(format!("Unknown duration: {s}. Use: any, short, medium, long")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub search_query: String,
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp: Option<String>,
    /// Filtered locally, not forwarded to the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<DurationFilter>,
    /// Applied locally, not forwarded to the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

fn default_engine() -> String {
    "youtube".to_string()
}

impl SearchParams {
    pub fn new(search_query: impl Into<String>) -> Self {
        Self {
            search_query: search_query.into(),
            engine: default_engine(),
            gl: None,
            hl: None,
            sp: None,
            duration: None,
            limit: None,
        }
    }

    fn api_query(&self) -> Vec<(&'static str, &str)> {
        let mut query = vec![
            ("search_query", self.search_query.as_str()),
            ("engine", self.engine.as_str()),
        ];
        for (name, value) in [("gl", &self.gl), ("hl", &self.hl), ("sp", &self.sp)] {
            if let Some(value) = value {
                query.push((name, value.as_str()));
            }
        }
        query
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub video_results: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_parameters: Option<serde_json::Value>,
}

/// Parses `H:M:S`, `M:S`, or `S` into seconds; anything else is 0.
pub fn parse_duration_to_seconds(duration: &str) -> u64 {
    let parts: Option<Vec<u64>> = duration
        .trim()
        .split(':')
        .map(|part| part.trim().parse::<u64>().ok())
        .collect();
    let seconds = match parts.as_deref() {
        Some([h, m, s]) => h
            .checked_mul(3600)
            .zip(m.checked_mul(60))
            .and_then(|(h, m)| h.checked_add(m))
            .and_then(|total| total.checked_add(*s)),
        Some([m, s]) => m.checked_mul(60).and_then(|m| m.checked_add(*s)),
        Some([s]) => Some(*s),
        _ => None,
    };
    seconds.unwrap_or(0)
}

/// Keeps results whose `length` falls in the duration bucket, then
/// truncates to `limit`.
pub fn filter_results(
    results: Vec<serde_json::Value>,
    duration: DurationFilter,
    limit: usize,
) -> Vec<serde_json::Value> {
    results
        .into_iter()
        .filter(|video| {
            duration.matches(parse_duration_to_seconds(
                video["length"].as_str().unwrap_or_default(),
            ))
        })
        .take(limit)
        .collect()
}

pub struct YoutubeSearchService {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    cache: ResponseCache<SearchResponse>,
}

impl YoutubeSearchService {
    /// Reads the API key from `SERP_API_KEY`. Without one, every search
    /// fails with [`SearchError::MissingApiKey`].
    pub fn from_env(cache: CacheConfig) -> Self {
        let api_key = std::env::var(SERP_API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!("{SERP_API_KEY_ENV} is not set; searches will fail");
        }
        Self::new(api_key, SERP_API_URL, cache)
    }

    pub fn new(api_key: Option<String>, endpoint: impl Into<String>, cache: CacheConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key,
            endpoint: endpoint.into(),
            cache: ResponseCache::new(cache),
        }
    }

    pub async fn search(&self, params: &SearchParams) -> Result<SearchResponse, SearchError> {
        let key = cache_key(params);
        self.cache
            .get_or_try_insert_with(&key, None, || self.fetch(params))
            .await
    }

    async fn fetch(&self, params: &SearchParams) -> Result<SearchResponse, SearchError> {
        info!(query = %params.search_query, "search cache miss, querying SerpAPI");
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SearchError::MissingApiKey {
                env_var: SERP_API_KEY_ENV.to_string(),
            })?;

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params.api_query())
            .query(&[("api_key", api_key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Api {
                reason: format!("{status}: {body}"),
            });
        }

        let body = response.json::<serde_json::Value>().await?;
        if let Some(error) = body["error"].as_str() {
            return Err(SearchError::Api {
                reason: error.to_string(),
            });
        }
        let mut result: SearchResponse =
            serde_json::from_value(body).map_err(|err| SearchError::Api {
                reason: format!("unexpected response shape: {err}"),
            })?;

        let total = result.video_results.len();
        result.video_results = filter_results(
            result.video_results,
            params.duration.unwrap_or_default(),
            params.limit.unwrap_or(DEFAULT_LIMIT),
        );
        debug!(
            query = %params.search_query,
            total,
            kept = result.video_results.len(),
            "filtered search results"
        );
        Ok(result)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_duration_formats() {
        assert_eq!(parse_duration_to_seconds("1:30:45"), 5445);
        assert_eq!(parse_duration_to_seconds("25:30"), 1530);
        assert_eq!(parse_duration_to_seconds("45"), 45);
        assert_eq!(parse_duration_to_seconds(""), 0);
        assert_eq!(parse_duration_to_seconds("live"), 0);
        assert_eq!(parse_duration_to_seconds("1:2:3:4"), 0);
    }

    #[test]
    fn overflowing_duration_parses_to_zero() {
        let max = u64::MAX.to_string();
        assert_eq!(parse_duration_to_seconds(&format!("{max}:00:00")), 0);
        assert_eq!(parse_duration_to_seconds(&format!("{max}:00")), 0);
        assert_eq!(parse_duration_to_seconds(&format!("1:{max}")), 0);
        assert_eq!(parse_duration_to_seconds(&max), u64::MAX);
    }

    #[test]
    fn filters_by_duration_bucket_and_limit() {
        let results = vec![
            json!({"title": "a", "length": "5:00"}),
            json!({"title": "b", "length": "20:00"}),
            json!({"title": "c", "length": "59:59"}),
            json!({"title": "d", "length": "1:00:00"}),
            json!({"title": "e"}),
        ];

        let titles = |videos: Vec<serde_json::Value>| -> Vec<String> {
            videos
                .iter()
                .map(|v| v["title"].as_str().unwrap().to_string())
                .collect()
        };

        assert_eq!(
            titles(filter_results(results.clone(), DurationFilter::Short, 50)),
            vec!["a", "e"]
        );
        assert_eq!(
            titles(filter_results(results.clone(), DurationFilter::Medium, 50)),
            vec!["b", "c"]
        );
        assert_eq!(
            titles(filter_results(results.clone(), DurationFilter::Long, 50)),
            vec!["d"]
        );
        assert_eq!(
            titles(filter_results(results, DurationFilter::Any, 2)),
            vec!["a", "b"]
        );
    }

    #[test]
    fn local_filters_are_not_forwarded() {
        let mut params = SearchParams::new("rust async");
        params.gl = Some("us".to_string());
        params.duration = Some(DurationFilter::Long);
        params.limit = Some(5);
        let query = params.api_query();
        assert_eq!(
            query,
            vec![
                ("search_query", "rust async"),
                ("engine", "youtube"),
                ("gl", "us")
            ]
        );
    }

    #[test]
    fn equivalent_params_share_a_cache_key() {
        let a: SearchParams =
            serde_json::from_value(json!({"search_query": "rust", "gl": "us"})).unwrap();
        let mut b = SearchParams::new("rust");
        b.gl = Some("us".to_string());
        assert_eq!(cache_key(&a), cache_key(&b));

        b.duration = Some(DurationFilter::Short);
        assert_ne!(cache_key(&a), cache_key(&b));
    }

    #[tokio::test]
    async fn missing_api_key_is_an_error_and_not_cached() {
        let service = YoutubeSearchService::new(None, SERP_API_URL, CacheConfig::default());
        let err = service.search(&SearchParams::new("rust")).await.unwrap_err();
        assert!(matches!(err, SearchError::MissingApiKey { .. }));
        assert_eq!(service.cache_stats().size, 0);
    }

    #[test]
    fn duration_filter_from_str() {
        assert_eq!("LONG".parse::<DurationFilter>(), Ok(DurationFilter::Long));
        assert!("forever".parse::<DurationFilter>().is_err());
    }
}
