//! HTTP/JSON adapter for the remote task collection.
//!
//! # Protocol
//! - `GET <base>/` returns a JSON array of tasks. Entries that do not decode
//!   are skipped, not fatal.
//! - `POST <base>` with a task body creates it; `410 Gone` means the id was
//!   deleted upstream.
//! - `DELETE <base>/<id>` removes it; `404` counts as success, `410` is
//!   surfaced as `Gone`.

use crate::model::task::{Task, TaskId};
use crate::remote::{RemoteError, RemoteResult, RemoteService};
use async_trait::async_trait;
use log::warn;
use reqwest::{Client, Response, StatusCode, Url};
use std::time::Duration;

/// Public demo endpoint the task list talks to by default.
pub const DEFAULT_API_URL: &str = "https://offline-todo-api.herokuapp.com/todos";

/// `reqwest`-backed remote service.
pub struct HttpRemoteService {
    base: Url,
    client: Client,
}

impl HttpRemoteService {
    /// Builds an adapter for the collection at `base_url`.
    ///
    /// `timeout` bounds each whole request; an expired request is reported as
    /// `RemoteError::Unreachable`.
    pub fn new(base_url: &str, timeout: Duration) -> RemoteResult<Self> {
        let mut base = Url::parse(base_url.trim())
            .map_err(|err| RemoteError::InvalidEndpoint(format!("{base_url}: {err}")))?;
        if base.cannot_be_a_base() {
            return Err(RemoteError::InvalidEndpoint(format!(
                "{base_url}: url cannot carry a path"
            )));
        }
        let trimmed_path = base.path().trim_end_matches('/').to_string();
        base.set_path(&trimmed_path);

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RemoteError::InvalidEndpoint(err.to_string()))?;

        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn collection_url(&self) -> Url {
        let mut url = self.base.clone();
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url
    }

    fn item_url(&self, id: &TaskId) -> RemoteResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidEndpoint(self.base.to_string()))?
            .pop_if_empty()
            .push(id.as_str());
        Ok(url)
    }
}

#[async_trait]
impl RemoteService for HttpRemoteService {
    async fn list(&self) -> RemoteResult<Vec<Task>> {
        let response = self
            .client
            .get(self.collection_url())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(unreachable)?;

        let response = ensure_success(response).await?;
        let body = response.text().await.map_err(unreachable)?;
        let entries: Vec<serde_json::Value> =
            serde_json::from_str(&body).map_err(|err| RemoteError::Decode(err.to_string()))?;

        let mut live = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let task = match decode_entry(entry) {
                Ok(task) => task,
                Err(reason) => {
                    warn!(
                        "event=remote_list module=remote status=warn error_code=remote_entry_skipped index={} reason={}",
                        index, reason
                    );
                    continue;
                }
            };
            if task.deleted {
                // The remote should delete physically; treat a stray tombstone as absent.
                warn!(
                    "event=remote_list module=remote status=warn error_code=remote_tombstone_listed task_id={}",
                    task.id
                );
                continue;
            }
            live.push(task);
        }

        Ok(live)
    }

    async fn create(&self, task: &Task) -> RemoteResult<()> {
        let response = self
            .client
            .post(self.base.clone())
            .header("Accept", "application/json")
            .json(task)
            .send()
            .await
            .map_err(unreachable)?;

        if response.status() == StatusCode::GONE {
            return Err(RemoteError::Gone(task.id.clone()));
        }
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> RemoteResult<()> {
        let response = self
            .client
            .delete(self.item_url(id)?)
            .send()
            .await
            .map_err(unreachable)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            StatusCode::GONE => Err(RemoteError::Gone(id.clone())),
            _ => ensure_success(response).await.map(|_| ()),
        }
    }
}

/// Decodes one listing entry; the error is a log-safe reason code.
fn decode_entry(entry: serde_json::Value) -> Result<Task, &'static str> {
    let task: Task = serde_json::from_value(entry).map_err(|_| "malformed")?;
    task.validate().map_err(|_| "invalid_id")?;
    Ok(task)
}

async fn ensure_success(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

fn unreachable(err: reqwest::Error) -> RemoteError {
    RemoteError::Unreachable(err.to_string())
}
