use async_trait::async_trait;
use reqwest::{StatusCode, header};
use std::time::Duration;

use crate::{
    commit::{CommitError, CommitService, ItemSource},
    config::AppConfig,
    gate::RouteTable,
    models::{CommitReceipt, CommitRequest, ErrorBody, ListableItem},
};

/// OnboardingClient
///
/// HTTP implementation of the Commit Service and the item source, for a wizard running outside
/// the server process. Redirects are not followed: a gate redirect is itself an answer (the
/// account was onboarded meanwhile, or the session lapsed).
#[derive(Clone)]
pub struct OnboardingClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    routes: RouteTable,
}

impl OnboardingClient {
    /// new
    ///
    /// `base_url` has no trailing slash (e.g. `http://127.0.0.1:3000`); `token` is the bearer
    /// token of the onboarding session; `routes` must match the server's gate configuration.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        routes: RouteTable,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
            routes,
        })
    }

    /// Client for a server running with `config`: same route table, `commit_timeout` per request.
    pub fn from_config(
        base_url: impl Into<String>,
        token: impl Into<String>,
        config: &AppConfig,
    ) -> Result<Self, reqwest::Error> {
        Self::new(base_url, token, config.routes.clone(), config.commit_timeout)
    }

    fn url(&self, suffix: &str) -> String {
        format!(
            "{}{}{}",
            self.base_url,
            self.routes.onboarding_path.trim_end_matches('/'),
            suffix
        )
    }

    /// Translates a gate redirect into the commit taxonomy.
    fn redirect_error(&self, response: &reqwest::Response) -> CommitError {
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if location == self.routes.sign_in_path {
            CommitError::Transient("session is no longer valid, sign in again".to_string())
        } else {
            CommitError::Conflict
        }
    }
}

fn network_error(e: reqwest::Error) -> CommitError {
    if e.is_timeout() {
        CommitError::Transient("request timed out".to_string())
    } else {
        CommitError::Transient(e.to_string())
    }
}

#[async_trait]
impl CommitService for OnboardingClient {
    async fn commit(&self, request: CommitRequest) -> Result<CommitReceipt, CommitError> {
        let tenant_selection = match &request {
            CommitRequest::Tenant { tenant_selection } => Some(*tenant_selection),
            CommitRequest::Owner { .. } => None,
        };

        let response = self
            .http
            .post(self.url("/commit"))
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<CommitReceipt>()
                .await
                .map_err(network_error);
        }
        if status.is_redirection() {
            return Err(self.redirect_error(&response));
        }

        match status {
            StatusCode::CONFLICT => Err(CommitError::Conflict),
            StatusCode::NOT_FOUND => Err(CommitError::NotFound(tenant_selection.unwrap_or_default())),
            StatusCode::BAD_REQUEST => {
                let body = response.json::<ErrorBody>().await.map_err(network_error)?;
                Err(CommitError::Validation {
                    field: body.field.unwrap_or_default(),
                    message: body.message,
                })
            }
            other => Err(CommitError::Transient(format!(
                "commit service answered {other}"
            ))),
        }
    }
}

#[async_trait]
impl ItemSource for OnboardingClient {
    async fn listable_items(&self) -> Result<Vec<ListableItem>, CommitError> {
        let response = self
            .http
            .get(self.url("/items"))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(network_error)?;

        if response.status().is_redirection() {
            return Err(self.redirect_error(&response));
        }
        if !response.status().is_success() {
            return Err(CommitError::Transient(format!(
                "item source answered {}",
                response.status()
            )));
        }

        response
            .json::<Vec<ListableItem>>()
            .await
            .map_err(network_error)
    }
}
