// HTTP team directory client.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::collab::TeamDirectory;
use crate::error::FetchError;
use crate::team::TeamList;

/// Fetches the team list with `GET {base_url}{teams_path}`.
pub struct HttpTeamDirectory {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpTeamDirectory {
    pub fn new(
        base_url: &str,
        teams_path: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpTeamDirectory {
            http,
            url: join_url(base_url, teams_path),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TeamDirectory for HttpTeamDirectory {
    async fn fetch(&self) -> Result<TeamList, FetchError> {
        let mut request = self.http.get(&self.url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!("Team directory returned {} bytes", body.len());
        decode_team_list(&body)
    }
}

/// Decode a team directory response body.
pub fn decode_team_list(body: &str) -> Result<TeamList, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::Decode {
        message: e.to_string(),
    })
}

fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
