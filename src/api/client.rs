//! Stats API operations with caching and pagination
//!
//! `StatsClient` turns logical operations (player lookup, search, match
//! details, match history, history refresh) into requests. Reads go through
//! the retrying transport; the refresh flow and its token fetch go through the
//! single-attempt transport. Search results and match details are cached.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use super::models::MatchPage;
use super::transport::{ApiRequest, HttpTransport, Transport};
use super::xsrf::{self, XSRF_HEADER};
use super::ApiError;
use crate::cache::ExpiringCache;
use crate::config::Settings;

/// Search results are kept for 7 days from the time they were fetched
pub const SEARCH_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Match details are kept for 15 days after they were last read
pub const MATCH_TTL: Duration = Duration::from_secs(15 * 24 * 3600);

/// Default number of history pages fetched by multi-page requests
pub const DEFAULT_PAGE_BUDGET: u32 = 20;

/// Strips separators from a player id
///
/// Player ids are accepted with or without hyphens; the API only knows the
/// bare form. Match ids are never normalized.
pub fn normalize_player_id(player_id: &str) -> String {
    player_id.replace('-', "")
}

/// Path of a player's match history
pub fn player_matches_path(platform: &str, player_id: &str) -> String {
    format!(
        "api/players/{}-{}/matches",
        platform,
        normalize_player_id(player_id)
    )
}

fn search_key(query: &str) -> String {
    format!("search:{}", query)
}

fn match_key(platform: &str, match_id: &str) -> String {
    format!("match:{}:{}", platform, match_id)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Client for the stats API
pub struct StatsClient {
    resilient: Arc<dyn Transport>,
    direct: Arc<dyn Transport>,
    cache: ExpiringCache,
}

impl std::fmt::Debug for StatsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsClient")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl StatsClient {
    /// Creates a client from explicit transports and a cache
    ///
    /// `resilient` serves reads; `direct` serves the refresh flow.
    pub fn new(
        resilient: Arc<dyn Transport>,
        direct: Arc<dyn Transport>,
        cache: ExpiringCache,
    ) -> Self {
        Self {
            resilient,
            direct,
            cache,
        }
    }

    /// Builds both HTTP transports and opens the cache described by `settings`
    pub fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        let resilient = HttpTransport::new(
            settings.base_url.clone(),
            &settings.user_agent,
            settings.read_policy.clone(),
        )?;
        let direct = HttpTransport::new(
            settings.base_url.clone(),
            &settings.user_agent,
            settings.write_policy.clone(),
        )?;

        Ok(Self::new(
            Arc::new(resilient),
            Arc::new(direct),
            settings.open_cache(),
        ))
    }

    /// The response cache
    pub fn cache(&self) -> &ExpiringCache {
        &self.cache
    }

    /// Checks whether a player with this display name exists on `platform`
    ///
    /// The flag is read by truthiness, so `1` or `"true"` count as present.
    /// Fails with [`ApiError::MissingField`] when the response carries neither
    /// `exists` nor `Exists`, or only `null` for both.
    pub async fn player_exists(
        &self,
        platform: &str,
        display_name: &str,
    ) -> Result<bool, ApiError> {
        let request = ApiRequest::get("api/players/check")
            .query("platform", platform)
            .query("uniqueDisplayName", display_name);

        let payload = self
            .resilient
            .execute(&request)
            .await?
            .error_for_status()?
            .json_value()?;

        ["exists", "Exists"]
            .iter()
            .filter_map(|key| payload.get(*key))
            .find(|flag| !flag.is_null())
            .map(is_truthy)
            .ok_or_else(|| ApiError::MissingField("exists".to_string()))
    }

    /// Searches players by free text, serving repeated queries from the cache
    pub async fn search_players(&mut self, query: &str) -> Result<Vec<Value>, ApiError> {
        let key = search_key(query);
        if let Some(cached) = self.cache.get_as::<Vec<Value>>(&key)? {
            debug!(query, "Search served from cache");
            return Ok(cached);
        }
        self.fetch_search(&key, query).await
    }

    /// Searches players without reading the cache
    ///
    /// The fresh result still replaces whatever was cached for `query`.
    pub async fn search_players_uncached(&mut self, query: &str) -> Result<Vec<Value>, ApiError> {
        self.fetch_search(&search_key(query), query).await
    }

    async fn fetch_search(&mut self, key: &str, query: &str) -> Result<Vec<Value>, ApiError> {
        let request = ApiRequest::get("api/players/search").query("query", query);
        let players: Vec<Value> = self
            .resilient
            .execute(&request)
            .await?
            .error_for_status()?
            .json()?;

        self.cache.set_absolute(key, &players, SEARCH_TTL)?;
        Ok(players)
    }

    /// Fetches every player's record for one match
    pub async fn get_match(
        &mut self,
        platform: &str,
        match_id: &str,
    ) -> Result<Vec<Value>, ApiError> {
        let key = match_key(platform, match_id);
        if let Some(cached) = self.cache.get_as::<Vec<Value>>(&key)? {
            debug!(platform, match_id, "Match served from cache");
            return Ok(cached);
        }

        let request = ApiRequest::get(format!("api/matches/{}-{}", platform, match_id));
        let records: Vec<Value> = self
            .resilient
            .execute(&request)
            .await?
            .error_for_status()?
            .json()?;

        self.cache.set_sliding(&key, &records, MATCH_TTL)?;
        Ok(records)
    }

    /// Fetches one page of a player's match history, bypassing the cache
    pub async fn player_matches_page(
        &self,
        platform: &str,
        player_id: &str,
        page: u32,
    ) -> Result<MatchPage, ApiError> {
        let request = ApiRequest::get(player_matches_path(platform, player_id))
            .query("page", page.to_string());

        let payload = self
            .resilient
            .execute(&request)
            .await?
            .error_for_status()?
            .json_value()?;

        MatchPage::from_payload(&payload)
    }

    /// Fetches up to `max_pages` pages of match history, oldest page last
    ///
    /// Stops early once the page metadata says the last page was reached, or
    /// when a page comes back empty. Any failing page fails the whole call.
    ///
    /// # Arguments
    ///
    /// * `platform` - Platform slug, e.g. `steam`
    /// * `player_id` - Player id, with or without hyphens
    /// * `max_pages` - Upper bound on the pages requested, starting at page 1
    ///
    /// # Returns
    ///
    /// The match records of every fetched page concatenated in page order,
    /// including the records of the page that stopped the loop.
    pub async fn player_matches_pages(
        &self,
        platform: &str,
        player_id: &str,
        max_pages: u32,
    ) -> Result<Vec<Value>, ApiError> {
        let mut items = Vec::new();

        for page in 1..=max_pages {
            let batch = self.player_matches_page(platform, player_id, page).await?;
            let reached_last = batch.meta.is_some_and(|meta| meta.is_last(page));
            let empty = batch.is_empty();
            items.extend(batch.data);

            if reached_last {
                debug!(page, "Reached last page reported by metadata");
                break;
            }
            if empty {
                debug!(page, "Empty page, no more history");
                break;
            }
        }

        info!(
            player_id = %normalize_player_id(player_id),
            matches = items.len(),
            "Fetched match history"
        );
        Ok(items)
    }

    /// Reads the anti-forgery token the refresh endpoint requires
    ///
    /// Issues a single-attempt history request only for its `Set-Cookie`
    /// headers.
    pub async fn xsrf_token(&self, platform: &str, player_id: &str) -> Result<String, ApiError> {
        let request = ApiRequest::get(player_matches_path(platform, player_id)).query("page", "1");
        let response = self.direct.execute(&request).await?;

        xsrf::find_token(response.header_values("Set-Cookie")).ok_or(ApiError::TokenNotFound)
    }

    /// Asks the server to pull a player's newest matches
    ///
    /// An HTML answer, or one without a content type, means the server
    /// redirected to a login page instead of accepting the token.
    pub async fn refresh_player_matches(
        &self,
        platform: &str,
        player_id: &str,
    ) -> Result<Value, ApiError> {
        let token = self.xsrf_token(platform, player_id).await?;
        let path = format!("{}/fetch", player_matches_path(platform, player_id));
        let request = ApiRequest::post(path).header(XSRF_HEADER, token);

        let response = self.direct.execute(&request).await?;
        match response.content_type() {
            Some(content_type) if !content_type.contains("text/html") => {}
            _ => return Err(ApiError::InvalidToken),
        }

        let payload = response.error_for_status()?.json_value()?;
        if payload.is_null() {
            return Err(ApiError::NullPayload);
        }
        info!(platform, player_id = %normalize_player_id(player_id), "Requested match refresh");
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness_of_existence_flags() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("true")));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&Value::Null));
    }

    #[test]
    fn test_normalize_strips_every_hyphen() {
        assert_eq!(normalize_player_id("AB-12-CD"), "AB12CD");
        assert_eq!(normalize_player_id("AB12CD"), "AB12CD");
        assert_eq!(normalize_player_id("--"), "");
    }

    #[test]
    fn test_player_matches_path_is_normalized() {
        assert_eq!(
            player_matches_path("steam", "AB-12-CD"),
            player_matches_path("steam", "AB12CD")
        );
        assert_eq!(
            player_matches_path("steam", "AB-12-CD"),
            "api/players/steam-AB12CD/matches"
        );
    }

    #[test]
    fn test_cache_keys() {
        assert_eq!(search_key("ace"), "search:ace");
        assert_eq!(match_key("steam", "a-b-c"), "match:steam:a-b-c");
    }

    #[test]
    fn test_ttls() {
        assert_eq!(SEARCH_TTL.as_secs(), 604_800);
        assert_eq!(MATCH_TTL.as_secs(), 1_296_000);
    }
}
