// src/auth.rs
use crate::api::{decode, error_message, ApiClient};
use crate::cancel::CancelToken;
use crate::error::ApiError;
use crate::models::{AuthResponse, RegisterRequest};
use log::{error, info, warn};
use reqwest::header::AUTHORIZATION;
use reqwest::Method;

/// Owns the bearer token lifecycle: written on registration, checked against
/// `/auth/validate`, dropped on rejection or logout.
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        AuthService { client }
    }

    /// Registers a new account. A token in the reply is stored right away.
    pub async fn register(
        &self,
        request: &RegisterRequest,
        cancel: &CancelToken,
    ) -> Result<AuthResponse, ApiError> {
        let http = self.client.request(Method::POST, "/auth/register").json(request);
        let response = self.client.send(http, cancel).await?;
        let status = response.status();
        if !status.is_success() {
            let message = error_message(response, "register", cancel).await;
            warn!("Registration for {} failed: {}", request.email, message);
            return Err(ApiError::Http { status, message });
        }

        let body: AuthResponse = decode(response, cancel).await?;
        if let Some(token) = body.token.as_deref() {
            self.client.credentials().set_token(token)?;
        }
        info!("Registered {}", request.email);
        Ok(body)
    }

    /// Checks the stored token with the backend.
    ///
    /// Returns `false` without a request when no token is stored, and clears
    /// the token when the backend rejects it. Transport failures are errors
    /// and leave the token in place.
    pub async fn validate(&self, cancel: &CancelToken) -> Result<bool, ApiError> {
        let auth = match self.client.bearer() {
            Ok(auth) => auth,
            Err(ApiError::AuthRequired) => return Ok(false),
            Err(e) => return Err(e),
        };

        let http = self
            .client
            .request(Method::GET, "/auth/validate")
            .header(AUTHORIZATION, auth);
        let response = self.client.send(http, cancel).await?;
        if response.status().is_success() {
            return Ok(true);
        }

        warn!("Token rejected by backend ({}); clearing it", response.status());
        if let Err(e) = self.client.credentials().clear_token() {
            error!("Failed to clear rejected token: {}", e);
        }
        Ok(false)
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        self.client.credentials().clear_token()?;
        info!("Logged out");
        Ok(())
    }

    pub fn is_logged_in(&self) -> Result<bool, ApiError> {
        Ok(self.client.credentials().get_token()?.is_some())
    }
}
