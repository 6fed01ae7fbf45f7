//! Thin client for the studio REST API.
//!
//! Public calls go out bare. Authenticated calls carry the configured
//! `Authorization` header, and a 401 answer ends the admin session.

use log::{debug, warn};
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ApiConfig;
use crate::errors::ApiError;
use crate::session::{Session, SessionContext};

/// How authenticated requests prove who they are.
#[derive(Debug, Clone)]
pub enum Auth {
    None,
    /// Fixed bearer token from deployment configuration.
    Static(String),
    /// Token of the signed-in admin session.
    Session(SessionContext),
}

impl Auth {
    /// Picks the mode named by `api.auth_mode`; `session` uses `session`.
    pub fn from_config(config: &ApiConfig, session: SessionContext) -> Self {
        match (config.auth_mode.as_str(), &config.static_token) {
            ("static", Some(token)) => Auth::Static(token.clone()),
            ("session", _) => Auth::Session(session),
            _ => Auth::None,
        }
    }

    pub fn header_value(&self) -> Option<String> {
        let token = match self {
            Auth::None => None,
            Auth::Static(token) => Some(token.clone()),
            Auth::Session(ctx) => ctx.bearer_token(),
        }?;
        Some(format!("Bearer {}", token))
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(rename = "expiresIn")]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    auth: Auth,
    session_ttl: Duration,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, auth: Auth) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth,
            session_ttl: config.session_ttl(),
        })
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn public_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    fn auth_request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match self.auth.header_value() {
            Some(value) => builder.header(AUTHORIZATION, value),
            None => {
                debug!("No credentials for authenticated request to {}", path);
                builder
            }
        }
    }

    pub async fn public_get<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let response = self.public_request(Method::GET, path).query(query).send().await?;
        read_json(response).await
    }

    pub async fn public_post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.public_request(Method::POST, path).json(body).send().await?;
        read_json(response).await
    }

    pub async fn auth_get<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send_authenticated(self.auth_request(Method::GET, path).query(query))
            .await
    }

    pub async fn auth_post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_authenticated(self.auth_request(Method::POST, path).json(body))
            .await
    }

    pub async fn auth_put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_authenticated(self.auth_request(Method::PUT, path).json(body))
            .await
    }

    pub async fn auth_delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_authenticated(self.auth_request(Method::DELETE, path))
            .await
    }

    pub async fn auth_post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, ApiError> {
        self.send_authenticated(self.auth_request(Method::POST, path).multipart(form))
            .await
    }

    async fn send_authenticated<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("API rejected credentials for {}", response.url().path());
            if let Auth::Session(ctx) = &self.auth {
                ctx.sign_out();
            }
            return Err(ApiError::Unauthorized);
        }
        read_json(response).await
    }

    /// Exchanges admin credentials for a session token.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        let body = serde_json::json!({ "username": username, "password": password });
        let response = self.public_request(Method::POST, "/auth/login").json(&body).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }

        let login: LoginResponse = read_json(response).await?;
        let ttl = login
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(self.session_ttl);
        let session = Session::with_ttl(login.token, ttl);

        if let Auth::Session(ctx) = &self.auth {
            ctx.sign_in(session.clone());
        }
        Ok(session)
    }

    pub fn logout(&self) {
        if let Auth::Session(ctx) = &self.auth {
            ctx.sign_out();
        }
    }
}

/// Decodes a JSON body, or turns a failed response into
/// [`ApiError::Server`] carrying the body's `message` when it has one.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        return Err(ApiError::Server {
            status: status.as_u16(),
            message,
        });
    }

    let body: &[u8] = if body.is_empty() { b"null" } else { &body };
    serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
}
