use std::{future::Future, time::Duration};

use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    Client, Url,
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{error::Error, request::Request, state::NetworkClient};

const TOKEN_HEADER: &str = "X-Practicum-Mobile-Token";

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    token: Option<String>,
    http: Client,
}

impl HttpClient {
    pub fn try_new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        debug!(client = "http", "configure with base url: {}", base_url);

        let mut base = Url::parse(base_url)?;
        // request paths are relative to the whole base, prefix included
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self { base, token, http })
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }
}

impl NetworkClient for HttpClient {
    async fn send<T>(&self, request: Request) -> Result<T, Error>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.url(&request.path)?;

        debug!(client = "http", method = %request.method, %url, "send request");

        let mut builder = self
            .http
            .request(request.method, url)
            .header(ACCEPT, "application/json");

        if let Some(token) = &self.token {
            builder = builder.header(TOKEN_HEADER, token);
        }

        if let Some(form) = request.form {
            trace!(client = "http", form, "attach form body");
            builder = builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(form);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::status(&request.path, status));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Runs `future` unless `cancel` fires first.
pub async fn cancellable<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = future => result,
    }
}
