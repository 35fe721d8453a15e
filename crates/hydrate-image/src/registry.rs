//! Docker Registry v2 API client.
//!
//! Supports Docker Hub and compatible registries with Bearer token
//! authentication. A 401 challenge is answered by fetching a token from the
//! advertised realm and retrying the original request exactly once; tokens
//! are not cached across requests.

use std::fs::File;
use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::digest::Digest;
use crate::error::{ImageError, Result};
use crate::manifest::{self, Descriptor, ImageConfig, Manifest};
use crate::verify::{self, DigestWriter};

/// Docker Hub registry URL.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.hub.docker.com";

/// Docker Hub token server URL.
pub const DEFAULT_AUTH_URL: &str = "https://auth.docker.io";

/// Service name expected by the Docker Hub token server.
pub const DEFAULT_AUTH_SERVICE: &str = "registry.docker.io";

/// Accept header value for manifest requests.
const ACCEPT_MANIFEST: &str = concat!(
    "application/vnd.docker.distribution.manifest.v2+json, ",
    "application/vnd.docker.distribution.manifest.list.v2+json"
);

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default connect timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Registry endpoint configuration.
///
/// The defaults target Docker Hub's hosted registry and token service, for
/// users without their own registry or authorization server.
#[derive(Debug, Clone)]
pub struct RegistryParams {
    /// Registry base URL.
    pub registry_url: String,
    /// Token server base URL.
    pub auth_url: String,
    /// Service name passed to the token server.
    pub auth_service: String,
}

impl Default for RegistryParams {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            auth_service: DEFAULT_AUTH_SERVICE.to_string(),
        }
    }
}

impl RegistryParams {
    /// Applies overrides on top of the Docker Hub defaults; absent or empty
    /// values keep the default.
    #[must_use]
    pub fn new(
        registry_url: Option<String>,
        auth_url: Option<String>,
        auth_service: Option<String>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            registry_url: registry_url
                .filter(|url| !url.is_empty())
                .unwrap_or(defaults.registry_url),
            auth_url: auth_url
                .filter(|url| !url.is_empty())
                .unwrap_or(defaults.auth_url),
            auth_service: auth_service
                .filter(|service| !service.is_empty())
                .unwrap_or(defaults.auth_service),
        }
    }
}

/// Operations the downloader needs from a registry.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Fetches the image manifest.
    async fn manifest(&self) -> Result<Manifest>;

    /// Fetches and parses the image config named by `descriptor`.
    async fn config(&self, descriptor: &Descriptor) -> Result<ImageConfig>;

    /// Downloads the layer named by `descriptor` into `dir`, verifying its
    /// digest.
    async fn download_layer(&self, descriptor: &Descriptor, dir: &Path) -> Result<()>;
}

/// Token response from the auth service.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// WWW-Authenticate challenge parsed from a 401 response.
#[derive(Debug, Default, PartialEq, Eq)]
struct AuthChallenge {
    realm: String,
    service: String,
    scope: String,
}

/// Registry client for the Docker Registry v2 API, scoped to one
/// repository and reference.
pub struct RegistryClient {
    /// HTTP client.
    client: Client,
    /// Endpoint configuration.
    params: RegistryParams,
    /// Repository, e.g. "pivotalgreenhouse/windows2016fs-hydrate".
    repository: String,
    /// Tag or digest reference.
    reference: String,
}

impl RegistryClient {
    /// Creates a client for one repository and reference.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// practice).
    #[must_use]
    pub fn new(
        params: RegistryParams,
        repository: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .user_agent(concat!("hydrate/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            params,
            repository: repository.into(),
            reference: reference.into(),
        }
    }

    fn manifest_url(&self) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            self.params.registry_url, self.repository, self.reference
        )
    }

    fn blob_url(&self, digest: &Digest) -> String {
        format!(
            "{}/v2/{}/blobs/{}",
            self.params.registry_url, self.repository, digest
        )
    }

    /// Performs a GET, answering a Bearer challenge with exactly one
    /// authorized retry.
    async fn get_with_auth(&self, url: &str, accept: Option<&str>) -> Result<Response> {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(header::ACCEPT, accept);
        }
        let response = request.send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let Some(challenge) = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .map(|header| self.parse_challenge(header))
        else {
            // A 401 with no usable challenge is reported as-is.
            return Ok(response);
        };

        let token = self.fetch_token(&challenge).await?;
        debug!(url = %url, "retrying with bearer token");

        let mut request = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, format!("Bearer {token}"));
        if let Some(accept) = accept {
            request = request.header(header::ACCEPT, accept);
        }
        Ok(request.send().await?)
    }

    /// Parses `Bearer realm="...",service="...",scope="..."`, falling back
    /// to the configured token endpoint and service name for absent fields.
    fn parse_challenge(&self, header: &str) -> AuthChallenge {
        let mut challenge = AuthChallenge::default();

        for part in header.trim_start_matches("Bearer ").split(',') {
            let part = part.trim();
            if let Some(value) = part.strip_prefix("realm=") {
                challenge.realm = value.trim_matches('"').to_string();
            } else if let Some(value) = part.strip_prefix("service=") {
                challenge.service = value.trim_matches('"').to_string();
            } else if let Some(value) = part.strip_prefix("scope=") {
                challenge.scope = value.trim_matches('"').to_string();
            }
        }

        if challenge.realm.is_empty() {
            challenge.realm = format!("{}/token", self.params.auth_url);
        }
        if challenge.service.is_empty() {
            challenge.service = self.params.auth_service.clone();
        }
        challenge
    }

    /// Fetches a bearer token from the auth service.
    async fn fetch_token(&self, challenge: &AuthChallenge) -> Result<String> {
        let url = format!(
            "{}?service={}&scope={}",
            challenge.realm, challenge.service, challenge.scope
        );
        trace!(url = %url, "requesting token");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ImageError::HttpNotOk {
                status: response.status().as_u16(),
                url,
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.token)
    }
}

#[async_trait]
impl Registry for RegistryClient {
    async fn manifest(&self) -> Result<Manifest> {
        let url = self.manifest_url();
        debug!(url = %url, "fetching manifest");

        let response = self.get_with_auth(&url, Some(ACCEPT_MANIFEST)).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::HttpNotOk {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.json().await?)
    }

    async fn config(&self, descriptor: &Descriptor) -> Result<ImageConfig> {
        descriptor.digest.require_sha256()?;
        if !manifest::is_config_media_type(&descriptor.media_type) {
            return Err(ImageError::InvalidMediaType {
                media_type: descriptor.media_type.clone(),
            });
        }

        let url = self.blob_url(&descriptor.digest);
        debug!(url = %url, "fetching image config");

        let response = self.get_with_auth(&url, None).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::HttpNotOk {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.bytes().await?;
        let found = verify::sha256_hex(&body);
        if found != descriptor.digest.encoded() {
            return Err(ImageError::ShaMismatch {
                expected: descriptor.digest.encoded().to_string(),
                found,
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }

    async fn download_layer(&self, descriptor: &Descriptor, dir: &Path) -> Result<()> {
        descriptor.digest.require_sha256()?;
        if !manifest::is_layer_media_type(&descriptor.media_type) {
            return Err(ImageError::InvalidMediaType {
                media_type: descriptor.media_type.clone(),
            });
        }

        let response = if manifest::is_foreign_layer_media_type(&descriptor.media_type) {
            let url = descriptor
                .urls
                .as_deref()
                .and_then(|urls| urls.first())
                .cloned()
                .ok_or_else(|| ImageError::MissingForeignUrls {
                    sha256: descriptor.digest.encoded().to_string(),
                })?;
            debug!(url = %url, "fetching foreign layer");

            // Foreign layers are served outside the registry, with no auth.
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(ImageError::HttpNotOk {
                    status: response.status().as_u16(),
                    url,
                });
            }
            response
        } else {
            let url = self.blob_url(&descriptor.digest);
            debug!(url = %url, "fetching layer");

            let response = self.get_with_auth(&url, None).await?;
            if !response.status().is_success() {
                return Err(ImageError::HttpNotOk {
                    status: response.status().as_u16(),
                    url,
                });
            }
            response
        };

        let target = dir.join(descriptor.digest.encoded());
        let mut writer = DigestWriter::new(File::create(&target)?);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            writer.write_all(&chunk?)?;
        }
        let (mut file, found) = writer.finalize();
        file.flush()?;
        drop(file);

        if found != descriptor.digest.encoded() {
            let _ = std::fs::remove_file(&target);
            return Err(ImageError::ShaMismatch {
                expected: descriptor.digest.encoded().to_string(),
                found,
            });
        }

        trace!(digest = %descriptor.digest, "layer verified");
        Ok(())
    }
}
