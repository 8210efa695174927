use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use nyboard_types::api::{
    EntryOrder, ErrorBody, PostMessageRequest, SessionResponse, SubmitRequest, SubmitResponse,
};
use nyboard_types::models::{Entry, Message};

use crate::error::ClientError;

/// Thin typed wrapper over the board's HTTP API.
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// WebSocket URL of the event gateway.
    pub fn gateway_url(&self) -> String {
        let base = if let Some(rest) = self.base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base.clone()
        };
        format!("{base}/gateway")
    }

    pub async fn submit(&self, name: &str) -> Result<SubmitResponse, ClientError> {
        let req = self.http.post(self.url("/entries")).json(&SubmitRequest {
            name: name.to_string(),
        });
        send(req).await
    }

    pub async fn top(&self, limit: u32, order: EntryOrder) -> Result<Vec<Entry>, ClientError> {
        let order = match order {
            EntryOrder::Rank => "rank",
            EntryOrder::Created => "created",
        };
        let req = self
            .http
            .get(self.url("/entries"))
            .query(&[("limit", limit.to_string()), ("order", order.to_string())]);
        send(req).await
    }

    pub async fn session(&self, token: &str) -> Result<SessionResponse, ClientError> {
        send(self.http.get(self.url("/session")).bearer_auth(token)).await
    }

    pub async fn post(&self, token: &str, message: &str) -> Result<Message, ClientError> {
        let req = self
            .http
            .post(self.url("/messages"))
            .bearer_auth(token)
            .json(&PostMessageRequest {
                message: message.to_string(),
            });
        send(req).await
    }

    pub async fn messages(&self, limit: u32) -> Result<Vec<Message>, ClientError> {
        let req = self
            .http
            .get(self.url("/messages"))
            .query(&[("limit", limit)]);
        send(req).await
    }
}

async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ClientError> {
    let resp = req.send().await?;
    if resp.status().is_success() {
        return Ok(resp.json().await?);
    }
    Err(api_error(resp).await)
}

async fn api_error(resp: Response) -> ClientError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();

    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => ClientError::Api {
            status: status.as_u16(),
            code: body.error,
            message: body.message,
        },
        // Not one of ours: a proxy page or an extractor rejection.
        Err(_) => ClientError::Api {
            status: status.as_u16(),
            code: fallback_code(status).to_string(),
            message: if text.is_empty() {
                status.to_string()
            } else {
                text
            },
        },
    }
}

fn fallback_code(status: StatusCode) -> &'static str {
    if status == StatusCode::GATEWAY_TIMEOUT {
        "timeout"
    } else {
        "request_failed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_url_swaps_scheme() {
        let client = ApiClient::new("http://localhost:3000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.gateway_url(), "ws://localhost:3000/gateway");

        let client = ApiClient::new("https://board.example", Duration::from_secs(1)).unwrap();
        assert_eq!(client.gateway_url(), "wss://board.example/gateway");
    }
}
