use std::io::Read;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, ClientBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::Credentials;
use crate::error::FetchError;

pub const EARTHDATA_LOGIN_HOST: &str = "urs.earthdata.nasa.gov";

/// Transport seam between the pipeline and the archive.
pub trait ArchiveClient: Send + Sync {
    fn get_text(&self, url: &str) -> Result<String, FetchError>;
    /// Opens a streaming body. Implementations must not buffer the whole response.
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, FetchError>;
}

impl<T: ArchiveClient + ?Sized> ArchiveClient for std::sync::Arc<T> {
    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        (**self).get_text(url)
    }

    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, FetchError> {
        (**self).open(url)
    }
}

/// Blocking HTTP client holding one Earthdata Login session.
///
/// The cookie store lives as long as the client, so only the first request
/// that is bounced to the login host pays for authentication.
#[derive(Clone)]
pub struct EarthdataHttpClient {
    client: Client,
    credentials: Option<Credentials>,
    login_host: String,
}

impl EarthdataHttpClient {
    pub fn new(credentials: Option<Credentials>, timeout: Duration) -> Result<Self, FetchError> {
        Self::from_builder(Client::builder(), credentials, timeout)
    }

    /// Finishes `builder` with the session settings every archive request needs.
    pub fn from_builder(
        builder: ClientBuilder,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ecostress-fetch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| FetchError::Transport(err.to_string()))?,
        );
        let client = builder
            .default_headers(headers)
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            credentials,
            login_host: EARTHDATA_LOGIN_HOST.to_string(),
        })
    }

    pub fn with_login_host(mut self, host: impl Into<String>) -> Self {
        self.login_host = host.into();
        self
    }

    fn send(&self, url: &str) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let response = match (&self.credentials, self.login_challenge(&response)) {
            (Some(credentials), true) => {
                tracing::debug!("authenticating with {}", self.login_host);
                let login_url = response.url().clone();
                self.client
                    .get(login_url)
                    .basic_auth(&credentials.username, Some(&credentials.password))
                    .send()
                    .map_err(|err| FetchError::Transport(err.to_string()))?
            }
            _ => response,
        };

        Self::handle_status(url, response)
    }

    fn login_challenge(&self, response: &Response) -> bool {
        response.status() == StatusCode::UNAUTHORIZED
            && response.url().host_str() == Some(self.login_host.as_str())
    }

    fn handle_status(url: &str, response: Response) -> Result<Response, FetchError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(FetchError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        })
    }
}

impl ArchiveClient for EarthdataHttpClient {
    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.send(url)?
            .text()
            .map_err(|err| FetchError::Transport(err.to_string()))
    }

    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, FetchError> {
        Ok(Box::new(self.send(url)?))
    }
}
