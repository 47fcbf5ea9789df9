//! HTTP client for the remote settlement store.
//!
//! Every collaborator (identities, daily records, summaries, notifications)
//! lives behind the same base URL and speaks JSON.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{DailyRecord, Identity, InitRecordsRequest, SettlementMode, SettlementSummaryRecord};
use std::time::Duration;

use super::error::{StoreError, StoreResult};
use super::traits::{DailyRecordSource, IdentitySource, NotificationSink, SettlementSummaryStore};

#[derive(Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(base_url: &str, timeout: Duration) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| StoreError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[inline]
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-success response into `StoreError::Status`
    async fn check(response: Response) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!("Store request failed with {}: {}", status, body);
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> StoreResult<T> {
        debug!("GET {} {:?}", path, query);
        let response = self.client.get(self.url(path)).query(query).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl IdentitySource for HttpStore {
    async fn list_identities(&self) -> StoreResult<Vec<Identity>> {
        self.get_json("/identities", &[]).await
    }
}

#[async_trait]
impl DailyRecordSource for HttpStore {
    async fn list_records(&self, date: &str) -> StoreResult<Vec<DailyRecord>> {
        self.get_json("/daily-records", &[("date", date)]).await
    }

    async fn init_records(&self, date: &str) -> StoreResult<()> {
        debug!("POST /daily-records/init {}", date);
        let request = InitRecordsRequest {
            date: date.to_string(),
        };
        let response = self
            .client
            .post(self.url("/daily-records/init"))
            .json(&request)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl SettlementSummaryStore for HttpStore {
    async fn get_summary(
        &self,
        date: &str,
        mode: SettlementMode,
    ) -> StoreResult<Option<SettlementSummaryRecord>> {
        debug!("GET /settlement-summaries {} {}", date, mode);
        let response = self
            .client
            .get(self.url("/settlement-summaries"))
            .query(&[("date", date), ("mode", mode.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        Ok(Some(response.json::<SettlementSummaryRecord>().await?))
    }

    async fn put_summary(&self, record: &SettlementSummaryRecord) -> StoreResult<()> {
        debug!("PUT /settlement-summaries {} {:?}", record.date, record.mode);
        let response = self
            .client
            .put(self.url("/settlement-summaries"))
            .json(record)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for HttpStore {
    async fn send_summary(&self, record: &SettlementSummaryRecord) -> StoreResult<()> {
        debug!("POST /notifications/settlement {}", record.date);
        let response = self
            .client
            .post(self.url("/notifications/settlement"))
            .json(record)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
