//! PostgREST-style client for the hosted store
//!
//! Every call sends the service key both as `apikey` and as a bearer token.
//! No retries: a failed call is returned to the caller as is.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use url::Url;

use super::types::{DAILY_TABLE, INCREMENT_DAILY_FN, PROGRESS_TABLE};
use super::{DailyDelta, DailyPatch, DailyRecord, ProgressPatch, ProgressRecord, StateStore, StoreError, StoreResult};
use crate::core::config::StoreConfig;

/// Header asking the store to merge on key conflict and echo the stored row
const UPSERT_PREFER: &str = "resolution=merge-duplicates,return=representation";

pub struct RestStore {
    client: Client,
    rest_base: Url,
    service_key: SecretString,
}

impl RestStore {
    /// Creates a client for `{url}/rest/v1/`.
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        let mut base = config.url;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let rest_base = base.join("rest/v1/")?;

        let client = Client::builder()
            .user_agent(concat!("flashcore/", env!("CARGO_PKG_VERSION")))
            .build()?;

        log::debug!("Store REST endpoint: {}", rest_base);

        Ok(Self {
            client,
            rest_base,
            service_key: config.service_key,
        })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let key = self.service_key.expose_secret();
        self.client
            .request(method, url)
            .header("apikey", key)
            .bearer_auth(key)
            .header(ACCEPT, "application/json")
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> StoreResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            log::warn!("Store call failed with {}: {}", status, body);
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// `GET /{table}?select=*&col=eq.val&limit=1`
    async fn select_one<T: DeserializeOwned>(&self, table: &str, filters: &[(&str, String)]) -> StoreResult<Option<T>> {
        let mut url = self.rest_base.join(table)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*");
            for (column, value) in filters {
                query.append_pair(column, &format!("eq.{}", value));
            }
            query.append_pair("limit", "1");
        }

        let rows: Vec<T> = Self::send(self.request(Method::GET, url)).await?;
        Ok(rows.into_iter().next())
    }

    /// `POST /{table}?on_conflict=...` with merge-duplicates resolution
    async fn upsert<B, T>(&self, table: &str, on_conflict: &str, body: &B) -> StoreResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let mut url = self.rest_base.join(table)?;
        url.query_pairs_mut().append_pair("on_conflict", on_conflict);

        let request = self
            .request(Method::POST, url)
            .header("Prefer", UPSERT_PREFER)
            .json(body);

        let rows: Vec<T> = Self::send(request).await?;
        rows.into_iter().next().ok_or(StoreError::EmptyResponse)
    }

    /// `POST /rpc/{function}`; accepts a single object or a one-row array.
    async fn rpc<T: DeserializeOwned>(&self, function: &str, args: &Value) -> StoreResult<T> {
        let url = self.rest_base.join(&format!("rpc/{}", function))?;
        let value: Value = Self::send(self.request(Method::POST, url).json(args)).await?;

        let row = match value {
            Value::Array(rows) => rows.into_iter().next().ok_or(StoreError::EmptyResponse)?,
            Value::Null => return Err(StoreError::EmptyResponse),
            row => row,
        };
        Ok(serde_json::from_value(row)?)
    }
}

#[async_trait]
impl StateStore for RestStore {
    async fn fetch_progress(&self, user_id: i64) -> StoreResult<Option<ProgressRecord>> {
        self.select_one(PROGRESS_TABLE, &[("user_id", user_id.to_string())])
            .await
    }

    async fn upsert_progress(&self, patch: &ProgressPatch) -> StoreResult<ProgressRecord> {
        self.upsert(PROGRESS_TABLE, "user_id", patch).await
    }

    async fn fetch_daily(&self, user_id: i64, day: NaiveDate) -> StoreResult<Option<DailyRecord>> {
        self.select_one(
            DAILY_TABLE,
            &[("user_id", user_id.to_string()), ("day", day.to_string())],
        )
        .await
    }

    async fn upsert_daily(&self, patch: &DailyPatch) -> StoreResult<DailyRecord> {
        self.upsert(DAILY_TABLE, "user_id,day", patch).await
    }

    async fn increment_daily(&self, user_id: i64, day: NaiveDate, delta: &DailyDelta) -> StoreResult<DailyRecord> {
        let args = json!({
            "p_user_id": user_id,
            "p_day": day,
            "p_cards": delta.cards,
            "p_quiz": delta.quiz,
            "p_cheese": delta.cheese,
            "p_accent": delta.accent,
        });
        self.rpc(INCREMENT_DAILY_FN, &args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: &str) -> RestStore {
        RestStore::new(StoreConfig {
            url: Url::parse(url).unwrap(),
            service_key: SecretString::from("key".to_string()),
        })
        .unwrap()
    }

    #[test]
    fn test_rest_base_without_path() {
        assert_eq!(store("https://x.supabase.co").rest_base.as_str(), "https://x.supabase.co/rest/v1/");
    }

    #[test]
    fn test_rest_base_keeps_prefix() {
        assert_eq!(
            store("http://localhost:54321/proxy").rest_base.as_str(),
            "http://localhost:54321/proxy/rest/v1/"
        );
    }
}
