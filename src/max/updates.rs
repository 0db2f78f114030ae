use std::collections::VecDeque;
use std::sync::Arc;

use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::MaxConfig;
use crate::max::client::MaxClient;
use crate::max::types::{Update, UpdatesQuery};

/// Long-poll parameters for `GET /updates`
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub limit: u32,
    pub timeout_secs: u32,
    pub types: Vec<String>,
}

impl From<&MaxConfig> for PollOptions {
    fn from(config: &MaxConfig) -> Self {
        Self {
            limit: config.poll_limit,
            timeout_secs: config.poll_timeout_secs,
            types: config.update_types.clone(),
        }
    }
}

/// Long-polling source of updates.
///
/// Yields each update of a batch in order before polling again, and echoes
/// the marker of the last batch so nothing is delivered twice. Ends when the
/// token is cancelled or a poll fails.
pub struct UpdateStream {
    client: Arc<MaxClient>,
    options: PollOptions,
    cancel: CancellationToken,
    marker: Option<i64>,
    pending: VecDeque<Update>,
    done: bool,
}

impl UpdateStream {
    pub fn new(client: Arc<MaxClient>, options: PollOptions, cancel: CancellationToken) -> Self {
        Self {
            client,
            options,
            cancel,
            marker: None,
            pending: VecDeque::new(),
            done: false,
        }
    }

    fn query(&self) -> UpdatesQuery {
        UpdatesQuery {
            limit: Some(self.options.limit),
            timeout: Some(self.options.timeout_secs),
            marker: self.marker,
            types: if self.options.types.is_empty() {
                None
            } else {
                Some(self.options.types.join(","))
            },
        }
    }

    pub async fn next_update(&mut self) -> Option<Update> {
        loop {
            if let Some(update) = self.pending.pop_front() {
                return Some(update);
            }
            if self.done {
                return None;
            }

            let query = self.query();
            let polled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                result = self.client.get_updates(&query) => Some(result),
            };

            match polled {
                None => {
                    debug!("Update polling cancelled");
                    self.done = true;
                }
                Some(Ok(list)) => {
                    debug!(
                        "Polled {} update(s), marker {:?}",
                        list.updates.len(),
                        list.marker
                    );
                    if list.marker.is_some() {
                        self.marker = list.marker;
                    }
                    for value in list.updates {
                        match Update::from_value(value) {
                            Ok(update) => self.pending.push_back(update),
                            Err(e) => warn!("Skipping undecodable update: {}", e),
                        }
                    }
                }
                Some(Err(e)) => {
                    error!("Failed to poll updates: {}", e);
                    self.done = true;
                }
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Update> {
        futures::stream::unfold(self, |mut updates| async move {
            updates.next_update().await.map(|update| (update, updates))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options() -> PollOptions {
        PollOptions {
            limit: 100,
            timeout_secs: 0,
            types: Vec::new(),
        }
    }

    fn message_created(chat_id: i64) -> serde_json::Value {
        json!({
            "update_type": "message_created",
            "timestamp": 1,
            "message": { "recipient": { "chat_id": chat_id } }
        })
    }

    #[test]
    fn test_query_joins_types() {
        let client = Arc::new(MaxClient::new("abc123", "http://localhost").unwrap());
        let mut opts = options();
        opts.types = vec!["message_created".to_string(), "bot_added".to_string()];
        let stream = UpdateStream::new(client, opts, CancellationToken::new());

        let query = stream.query();
        assert_eq!(query.types.as_deref(), Some("message_created,bot_added"));
        assert_eq!(query.marker, None);
        assert_eq!(query.limit, Some(100));
    }

    #[tokio::test]
    async fn test_yields_batch_in_order_and_echoes_marker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/updates"))
            .and(query_param("marker", "11"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/updates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "updates": [
                    message_created(1),
                    { "update_type": "bot_added", "timestamp": 2 },
                    message_created(3)
                ],
                "marker": 11
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let client = Arc::new(MaxClient::new("abc123", &server.uri()).unwrap());
        let stream = UpdateStream::new(client, options(), CancellationToken::new()).into_stream();
        let kinds: Vec<String> = stream.map(|u| u.kind().to_string()).collect().await;

        // The second poll carries marker 11, fails, and ends the stream.
        assert_eq!(kinds, vec!["message_created", "bot_added", "message_created"]);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].url.query().unwrap_or("").contains("marker=11"));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/updates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "updates": [
                    { "update_type": "message_created" },
                    message_created(5)
                ],
                "marker": 1
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/updates"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = Arc::new(MaxClient::new("abc123", &server.uri()).unwrap());
        let updates: Vec<Update> = UpdateStream::new(client, options(), CancellationToken::new())
            .into_stream()
            .collect()
            .await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].kind(), "message_created");
    }

    #[tokio::test]
    async fn test_poll_failure_ends_stream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/updates"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;

        let client = Arc::new(MaxClient::new("abc123", &server.uri()).unwrap());
        let mut updates = UpdateStream::new(client, options(), CancellationToken::new());
        assert!(updates.next_update().await.is_none());
        assert!(updates.next_update().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_poll() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/updates"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "updates": [] }))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let client = Arc::new(MaxClient::new("abc123", &server.uri()).unwrap());
        let cancel = CancellationToken::new();
        let mut updates = UpdateStream::new(client, options(), cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let next = tokio::time::timeout(Duration::from_secs(5), updates.next_update())
            .await
            .expect("cancellation should end the poll");
        assert!(next.is_none());
    }
}
