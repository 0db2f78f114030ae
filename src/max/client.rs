use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::max::error::{ApiError, AuthError};
use crate::max::types::{
    BotInfo, Destination, Message, NewMessageBody, SendMessageResult, UpdateList, UpdatesQuery,
};

/// Thin typed client over the MAX Bot API.
pub struct MaxClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl MaxClient {
    /// Build a client. Fails on an empty token or a malformed base URL;
    /// no request is made until [`MaxClient::authenticate`].
    pub fn new(token: impl Into<String>, base_url: &str) -> Result<Self, AuthError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(AuthError::MissingToken);
        }

        let parsed = Url::parse(base_url).map_err(|e| AuthError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AuthError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(AuthError::Client)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Liveness check: fetch the bot identity with the configured token.
    pub async fn authenticate(&self) -> Result<BotInfo, AuthError> {
        self.get_me().await.map_err(AuthError::Liveness)
    }

    pub async fn get_me(&self) -> Result<BotInfo, ApiError> {
        self.execute(self.http.get(self.url("me"))).await
    }

    /// One long-poll request for updates.
    pub async fn get_updates(&self, query: &UpdatesQuery) -> Result<UpdateList, ApiError> {
        self.execute(self.http.get(self.url("updates")).query(query))
            .await
    }

    pub async fn send_message(
        &self,
        to: &Destination,
        body: &NewMessageBody,
    ) -> Result<Message, ApiError> {
        let (param, value) = to.query_param();
        let result: SendMessageResult = self
            .execute(
                self.http
                    .post(self.url("messages"))
                    .query(&[(param, value)])
                    .json(body),
            )
            .await?;
        Ok(result.message)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let request = request.header("Authorization", &self.token).build()?;
        debug!("MAX API request: {} {}", request.method(), request.url().path());

        let response = self.http.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(ApiError::from_response(status, &body));
        }

        Ok(serde_json::from_slice(&body)?)
    }
}
