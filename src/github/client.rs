//! GitHub API client.

use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{OrgError, Result};

const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Upper bound on pages fetched by a single listing call.
const MAX_PAGES: u32 = 100;

/// Client for interacting with the GitHub REST API.
#[derive(Clone)]
pub struct GitHubClient {
    pub(crate) token: String,
    pub(crate) base_url: String,
    pub(crate) client: Client,
}

impl GitHubClient {
    /// Create a new GitHub client with the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: DEFAULT_BASE_URL.into(),
            client: Client::new(),
        }
    }

    /// Create a client for GitHub Enterprise with a custom base URL.
    pub fn with_enterprise(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let mut url = base_url.into();
        while url.ends_with('/') {
            url.pop();
        }
        Self {
            token: token.into(),
            base_url: url,
            client: Client::new(),
        }
    }

    /// Create a client using the GITHUB_TOKEN and optional GITHUB_API_URL variables.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN").map_err(|_| OrgError::GitHub {
            status: None,
            message: "GITHUB_TOKEN environment variable not set".into(),
        })?;
        Ok(match std::env::var("GITHUB_API_URL") {
            Ok(url) if !url.is_empty() => Self::with_enterprise(token, url),
            _ => Self::new(token),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.token)).map_err(|_| {
            OrgError::GitHub {
                status: None,
                message: "token contains characters not allowed in a header".into(),
            }
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("orgops"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = format!("{}{}", self.base_url, endpoint);
        Ok(self.client.request(method, &url).headers(self.headers()?))
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        Err(OrgError::github(
            status.as_u16(),
            format!("API request failed ({}): {}", status, body),
        ))
    }

    fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        response.json().map_err(|e| OrgError::GitHub {
            status: None,
            message: format!("Failed to parse response: {}", e),
        })
    }

    /// Make a GET request to the GitHub API.
    pub(crate) fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, endpoint)?)?;
        Self::parse(response)
    }

    /// GET that maps a 404 to `None`.
    pub(crate) fn get_optional<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Option<T>> {
        match self.get(endpoint) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// GET whose only signal is the status: 2xx is `true`, 404 is `false`.
    pub(crate) fn status_ok(&self, endpoint: &str) -> Result<bool> {
        match self.send(self.request(Method::GET, endpoint)?) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// GET the raw body of a resource (used for repository file contents).
    pub(crate) fn get_raw(&self, endpoint: &str) -> Result<String> {
        let builder = self
            .request(Method::GET, endpoint)?
            .header(ACCEPT, "application/vnd.github.raw+json");
        Ok(self.send(builder)?.text()?)
    }

    /// GET every page of a list endpoint.
    pub(crate) fn get_paginated<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>> {
        let separator = if endpoint.contains('?') { '&' } else { '?' };
        let mut all = Vec::new();
        let mut page = 1;

        loop {
            let paged = format!("{}{}per_page=100&page={}", endpoint, separator, page);
            let items: Vec<T> = self.get(&paged)?;
            let count = items.len();
            all.extend(items);

            if count < 100 || page >= MAX_PAGES {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    /// Make a POST request to the GitHub API.
    pub(crate) fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send(self.request(Method::POST, endpoint)?.json(body))?;
        Self::parse(response)
    }

    /// POST whose response body is ignored.
    pub(crate) fn post_unit<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<()> {
        self.send(self.request(Method::POST, endpoint)?.json(body))?;
        Ok(())
    }

    /// Make a PATCH request to the GitHub API.
    pub(crate) fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send(self.request(Method::PATCH, endpoint)?.json(body))?;
        Self::parse(response)
    }

    /// PUT whose response body is ignored.
    pub(crate) fn put_unit<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<()> {
        self.send(self.request(Method::PUT, endpoint)?.json(body))?;
        Ok(())
    }

    /// Make a DELETE request to the GitHub API.
    pub(crate) fn delete(&self, endpoint: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, endpoint)?)?;
        Ok(())
    }
}

/// Split an `owner/name` string.
pub fn split_full_name(full_name: &str) -> Result<(&str, &str)> {
    match full_name.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => Err(OrgError::InvalidConfig(format!(
            "expected repository in 'owner/name' form, got '{}'",
            full_name
        ))),
    }
}
