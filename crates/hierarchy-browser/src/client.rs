use std::time::Duration;

use hierarchy_model::{PartSummary, SearchState, WPObject};
use log::debug;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderIcon {
    pub filename: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderInfo {
    #[serde(rename = "RootName")]
    pub root_name: String,
    #[serde(default)]
    pub icons: Vec<ProviderIcon>,
}

/// Handle of a search that runs on the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchHandle {
    pub id: String,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub started: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchStart {
    /// Complete results; an unsupported search is an empty list.
    Results(Vec<WPObject>),
    Handle(SearchHandle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchProgress {
    pub results: Vec<WPObject>,
    pub state: SearchState,
}

#[derive(Deserialize)]
struct ObjectsResponse {
    objects: Vec<WPObject>,
}

#[derive(Deserialize)]
struct PartsResponse {
    parts: Vec<PartSummary>,
}

#[derive(Deserialize)]
struct Progress {
    state: SearchState,
}

#[derive(Deserialize)]
struct PollResponse {
    #[serde(default)]
    objects: Vec<WPObject>,
    progress: Progress,
}

/// One connection to a provider. Requests are strictly sequential.
pub struct ProviderClient {
    addr: String,
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl ProviderClient {
    /// # Errors
    /// Returns an error when the provider cannot be reached.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        debug!("Connected to provider at {addr}");
        Ok(Self {
            addr: addr.to_string(),
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send one request and read its response line.
    ///
    /// # Errors
    /// Transport failures, unparsable responses, and `{"error": ...}`
    /// answers, which become `ClientError::Provider`.
    pub async fn request(&mut self, request: &Value) -> Result<Value, ClientError> {
        let mut payload = request.to_string();
        payload.push('\n');
        self.writer.write_all(payload.as_bytes()).await?;
        self.writer.flush().await?;

        let line = self.lines.next_line().await?.ok_or(ClientError::Closed)?;
        let response: Value = serde_json::from_str(&line)?;
        if let Some(message) = response.get("error") {
            let message = message
                .as_str()
                .map_or_else(|| message.to_string(), str::to_string);
            return Err(ClientError::Provider(message));
        }
        Ok(response)
    }

    async fn call<T: DeserializeOwned>(&mut self, request: Value) -> Result<T, ClientError> {
        let response = self.request(&request).await?;
        Ok(serde_json::from_value(response)?)
    }

    /// # Errors
    /// See [`ProviderClient::request`].
    pub async fn get_info(&mut self) -> Result<ProviderInfo, ClientError> {
        self.call(json!({ "method": "GetInfo" })).await
    }

    /// # Errors
    /// See [`ProviderClient::request`].
    pub async fn root_objects(&mut self) -> Result<Vec<WPObject>, ClientError> {
        let response: ObjectsResponse = self.call(json!({ "method": "GetRootObjects" })).await?;
        Ok(response.objects)
    }

    /// # Errors
    /// See [`ProviderClient::request`].
    pub async fn objects(&mut self, id: &str) -> Result<Vec<WPObject>, ClientError> {
        let response: ObjectsResponse = self
            .call(json!({ "method": "GetObjects", "id": id }))
            .await?;
        Ok(response.objects)
    }

    /// # Errors
    /// See [`ProviderClient::request`].
    pub async fn parts(&mut self) -> Result<Vec<PartSummary>, ClientError> {
        let response: PartsResponse = self.call(json!({ "method": "GetParts" })).await?;
        Ok(response.parts)
    }

    /// # Errors
    /// See [`ProviderClient::request`].
    pub async fn part(&mut self, unique_id: &str) -> Result<String, ClientError> {
        let response = self
            .request(&json!({ "method": "GetPart", "id": unique_id }))
            .await?;
        response
            .get("script")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(ClientError::UnexpectedResponse {
                method: "GetPart",
                field: "script",
            })
    }

    /// # Errors
    /// See [`ProviderClient::request`].
    pub async fn search(
        &mut self,
        id: &str,
        term: &str,
        recursive: bool,
    ) -> Result<SearchStart, ClientError> {
        let mut response = self
            .request(&json!({
                "method": "Search",
                "id": id,
                "search": term,
                "recursive": recursive,
            }))
            .await?;
        if let Some(handle) = response.get_mut("handle") {
            return Ok(SearchStart::Handle(serde_json::from_value(handle.take())?));
        }
        let response: ObjectsResponse = serde_json::from_value(response)?;
        Ok(SearchStart::Results(response.objects))
    }

    /// # Errors
    /// See [`ProviderClient::request`].
    pub async fn poll(&mut self, handle: &SearchHandle) -> Result<SearchProgress, ClientError> {
        let response: PollResponse = self
            .call(json!({ "method": "Search", "handle": handle.id }))
            .await?;
        Ok(SearchProgress {
            results: response.objects,
            state: response.progress.state,
        })
    }

    /// Run a search to completion, polling every `interval` when the provider
    /// answers with a handle.
    ///
    /// # Errors
    /// See [`ProviderClient::request`].
    pub async fn search_until_done(
        &mut self,
        id: &str,
        term: &str,
        recursive: bool,
        interval: Duration,
    ) -> Result<Vec<WPObject>, ClientError> {
        let handle = match self.search(id, term, recursive).await? {
            SearchStart::Results(results) => return Ok(results),
            SearchStart::Handle(handle) => handle,
        };
        loop {
            let progress = self.poll(&handle).await?;
            if progress.state.is_done() {
                return Ok(progress.results);
            }
            tokio::time::sleep(interval).await;
        }
    }
}
