//! HTTP adapter for the remote plan stores

use std::collections::HashMap;
use std::time::Duration;

use devplan_core::{Activity, Assignment, ExecutionEntry, GoalCode, NewExecution};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::store::{ActivityStore, AssignmentStore, ExecutionLog, ExecutionStore};

/// Connection settings for a plan server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server root, without trailing slash
    pub base_url: String,
    /// Plan instance the assignments belong to
    pub plan_id: String,
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            plan_id: "default".to_string(),
            api_token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Serialize)]
struct BulkRequest<'a> {
    goal_codes: &'a [GoalCode],
}

#[derive(Deserialize)]
struct BulkResponse {
    activities: HashMap<GoalCode, Vec<Activity>>,
}

/// Plan stores reached over REST
///
/// # Example
///
/// ```rust,no_run
/// use devplan_sync::{AssignmentStore, ClientConfig, HttpPlanStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = HttpPlanStore::new(ClientConfig {
///     base_url: "https://planes.example.org/api".into(),
///     plan_id: "pdt-2024".into(),
///     ..Default::default()
/// })?;
/// let assignments = store.list_assignments().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HttpPlanStore {
    config: ClientConfig,
    client: Client,
}

impl HttpPlanStore {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = config.api_token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| StoreError::Config(format!("invalid API token: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn activity_url(&self, id: &str) -> String {
        self.url(&format!("/activities/{}", urlencoding::encode(id)))
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let response = ensure_success(response).await?;
        let body = response.json().await?;
        Ok(body)
    }

    /// Like `handle_response` for endpoints without a body
    async fn handle_empty(&self, response: reqwest::Response) -> Result<()> {
        ensure_success(response).await.map(|_| ())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status() == StatusCode::NOT_FOUND {
        return Err(StoreError::NotFound(response.url().path().to_string()));
    }

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(StoreError::Server {
            status,
            message: body,
        });
    }
    Ok(response)
}

// ==================== Assignments ====================

#[async_trait::async_trait]
impl AssignmentStore for HttpPlanStore {
    async fn list_assignments(&self) -> Result<Vec<Assignment>> {
        let url = self.url(&format!(
            "/plans/{}/assignments",
            urlencoding::encode(&self.config.plan_id)
        ));
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    async fn put_assignment(&self, assignment: &Assignment) -> Result<()> {
        let url = self.url(&format!(
            "/plans/{}/assignments/{}",
            urlencoding::encode(&self.config.plan_id),
            urlencoding::encode(&assignment.goal_code)
        ));
        let response = self.client.put(&url).json(assignment).send().await?;
        self.handle_empty(response).await
    }
}

// ==================== Activities ====================

#[async_trait::async_trait]
impl ActivityStore for HttpPlanStore {
    async fn activities_for_goal(&self, code: &str) -> Result<Vec<Activity>> {
        let url = self.url(&format!("/goals/{}/activities", urlencoding::encode(code)));
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    async fn activities_bulk(
        &self,
        codes: &[GoalCode],
    ) -> Result<HashMap<GoalCode, Vec<Activity>>> {
        let url = self.url("/activities/bulk");
        let response = self
            .client
            .post(&url)
            .json(&BulkRequest { goal_codes: codes })
            .send()
            .await?;
        let body: BulkResponse = self.handle_response(response).await?;
        Ok(body.activities)
    }

    async fn create_activity(&self, activity: &Activity) -> Result<Activity> {
        let url = self.url("/activities");
        let response = self.client.post(&url).json(activity).send().await?;
        self.handle_response(response).await
    }

    async fn update_activity(&self, activity: &Activity) -> Result<Activity> {
        let id = activity
            .id
            .as_deref()
            .ok_or_else(|| StoreError::NotFound("activity without id".to_string()))?;
        let response = self
            .client
            .put(self.activity_url(id))
            .json(activity)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn delete_activity(&self, id: &str) -> Result<()> {
        let response = self.client.delete(self.activity_url(id)).send().await?;
        self.handle_empty(response).await
    }
}

// ==================== Executions ====================

#[async_trait::async_trait]
impl ExecutionStore for HttpPlanStore {
    async fn record_execution(
        &self,
        activity_id: &str,
        execution: &NewExecution,
    ) -> Result<ExecutionEntry> {
        let url = format!("{}/executions", self.activity_url(activity_id));
        let response = self.client.post(&url).json(execution).send().await?;
        self.handle_response(response).await
    }

    async fn executions(&self, activity_id: &str) -> Result<ExecutionLog> {
        let url = format!("{}/executions", self.activity_url(activity_id));
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }
}
