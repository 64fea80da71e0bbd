//! API client for the membership directory service.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::Credentials;
use crate::models::UnitNumber;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Identity provider endpoint exchanging a username/password for a one-time
/// session token.
const AUTHN_URL: &str = "https://id.churchofjesuschrist.org/api/v1/authn";

/// Redeems the session token for the directory session cookie.
const SESSION_URL: &str = "https://id.churchofjesuschrist.org/login/sessionCookieRedirect";

/// Landing page the session redirect returns to.
const SESSION_REDIRECT: &str = "https://www.churchofjesuschrist.org/my-home";

/// Base URL for directory data endpoints.
const API_BASE_URL: &str = "https://directory.churchofjesuschrist.org/api/v4";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct AuthnResponse {
    status: String,
    #[serde(rename = "sessionToken")]
    session_token: Option<String>,
}

/// The fields of the signed-in user's profile needed to address the unit
/// and directory queries. The full profile is cached verbatim.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "homeUnits", default)]
    pub home_units: Vec<UnitNumber>,
    #[serde(rename = "parentUnits", default)]
    pub parent_units: Vec<UnitNumber>,
}

impl UserProfile {
    pub fn home_unit(&self) -> Result<UnitNumber> {
        self.home_units
            .first()
            .copied()
            .ok_or_else(|| ApiError::InvalidResponse("profile lists no home unit".to_string()).into())
    }

    pub fn parent_unit(&self) -> Result<UnitNumber> {
        self.parent_units
            .first()
            .copied()
            .ok_or_else(|| ApiError::InvalidResponse("profile lists no parent unit".to_string()).into())
    }
}

/// Authenticated client for the directory service.
pub struct DirectoryClient {
    client: Client,
    authenticated: bool,
}

impl DirectoryClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            authenticated: false,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Sign in and establish the session cookie used by later requests.
    pub async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        let response = self
            .client
            .post(AUTHN_URL)
            .header(header::ACCEPT, "application/json")
            .json(&serde_json::json!({
                "username": credentials.username,
                "password": credentials.password,
            }))
            .send()
            .await
            .context("Failed to send authentication request")?;

        let response = Self::check_response(response).await?;
        let authn: AuthnResponse = response
            .json()
            .await
            .context("Failed to parse authentication response")?;

        let token = match (authn.status.as_str(), authn.session_token) {
            ("SUCCESS", Some(token)) => token,
            (status, _) => return Err(ApiError::AuthenticationFailed(status.to_string()).into()),
        };

        let response = self
            .client
            .get(SESSION_URL)
            .query(&[("token", token.as_str()), ("redirectUrl", SESSION_REDIRECT)])
            .send()
            .await
            .context("Failed to establish directory session")?;
        Self::check_response(response).await?;

        self.authenticated = true;
        info!(username = %credentials.username, "Signed in to directory service");
        Ok(())
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn get(&self, url: &str) -> Result<Value> {
        if !self.authenticated {
            return Err(ApiError::NotAuthenticated.into());
        }

        debug!(url = url, "GET");
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send GET request to {}", url))?;

        let response = Self::check_response(response).await?;
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;

        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    // ===== Data Fetching Methods =====

    /// Fetch the signed-in user's profile
    pub async fn fetch_user_details(&self) -> Result<Value> {
        self.get(&format!("{}/user", API_BASE_URL)).await
    }

    /// Fetch the household directory of a unit
    pub async fn fetch_directory(&self, unit: UnitNumber) -> Result<Value> {
        let households = self
            .get(&format!("{}/households?unit={}", API_BASE_URL, unit))
            .await?;
        match households.as_array() {
            Some(list) => debug!(count = list.len(), "Fetched households"),
            None => warn!("Household directory response is not a list"),
        }
        Ok(households)
    }

    /// Fetch a parent unit together with its child units
    pub async fn fetch_units(&self, parent_unit: UnitNumber) -> Result<Value> {
        self.get(&format!("{}/units/{}", API_BASE_URL, parent_unit))
            .await
    }

    /// Fetch the flat member list of a unit
    pub async fn fetch_member_list(&self, unit: UnitNumber) -> Result<Value> {
        self.get(&format!("{}/member-list?unit={}", API_BASE_URL, unit))
            .await
    }

    /// Fetch and decode the addressing fields of the user's profile
    pub async fn fetch_profile(&self) -> Result<UserProfile> {
        let details = self.fetch_user_details().await?;
        serde_json::from_value(details).context("Failed to parse user profile")
    }
}
