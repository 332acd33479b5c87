//! Provider user lookup.
//!
//! CLI-layer collaborator for `mgit add` and `mgit info`: fetches a public
//! user record from the hosting provider so the profile can be filled in
//! without retyping name and email. This is the only place in the tool
//! that performs network I/O, and the only place with a timeout; the core
//! modules never import it.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::time::Duration;

use crate::account::Provider;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("mgit/", env!("CARGO_PKG_VERSION"));

/// Plain user-info record consumed by the CLI
#[derive(Debug, Clone)]
pub struct ProviderUser {
    pub login: String,
    pub id: u64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Deserialize)]
struct GithubUser {
    login: String,
    id: u64,
    name: Option<String>,
    email: Option<String>,
    bio: Option<String>,
    html_url: Option<String>,
}

#[derive(Deserialize)]
struct GitlabUser {
    id: u64,
    username: String,
    name: Option<String>,
    web_url: Option<String>,
}

#[derive(Deserialize)]
struct BitbucketUser {
    username: Option<String>,
    display_name: Option<String>,
    links: Option<BitbucketLinks>,
}

#[derive(Deserialize)]
struct BitbucketLinks {
    html: Option<BitbucketHref>,
}

#[derive(Deserialize)]
struct BitbucketHref {
    href: String,
}

fn client() -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

/// Fetch the public profile of `username` from the provider.
pub fn fetch_user(provider: Provider, username: &str) -> Result<ProviderUser> {
    match provider {
        Provider::Github => fetch_github(username),
        Provider::Gitlab => fetch_gitlab(username),
        Provider::Bitbucket => fetch_bitbucket(username),
        Provider::Custom => bail!("User lookup is not available for custom providers"),
    }
}

fn fetch_github(username: &str) -> Result<ProviderUser> {
    let url = format!("https://api.github.com/users/{}", username);
    let response = client()?
        .get(&url)
        .send()
        .with_context(|| format!("Failed to reach {}", url))?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        bail!("GitHub user '{}' not found", username);
    }
    let user: GithubUser = response
        .error_for_status()
        .context("GitHub API request failed")?
        .json()
        .context("Failed to decode GitHub user response")?;

    Ok(ProviderUser {
        login: user.login,
        id: user.id,
        name: user.name,
        email: user.email,
        bio: user.bio,
        html_url: user.html_url,
    })
}

fn fetch_gitlab(username: &str) -> Result<ProviderUser> {
    let url = format!("https://gitlab.com/api/v4/users?username={}", username);
    let users: Vec<GitlabUser> = client()?
        .get(&url)
        .send()
        .with_context(|| format!("Failed to reach {}", url))?
        .error_for_status()
        .context("GitLab API request failed")?
        .json()
        .context("Failed to decode GitLab user response")?;

    let user = users
        .into_iter()
        .next()
        .with_context(|| format!("GitLab user '{}' not found", username))?;

    Ok(ProviderUser {
        login: user.username,
        id: user.id,
        name: user.name,
        // GitLab never exposes emails through the public lookup
        email: None,
        bio: None,
        html_url: user.web_url,
    })
}

fn fetch_bitbucket(username: &str) -> Result<ProviderUser> {
    let url = format!("https://api.bitbucket.org/2.0/users/{}", username);
    let response = client()?
        .get(&url)
        .send()
        .with_context(|| format!("Failed to reach {}", url))?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        bail!("Bitbucket user '{}' not found", username);
    }
    let user: BitbucketUser = response
        .error_for_status()
        .context("Bitbucket API request failed")?
        .json()
        .context("Failed to decode Bitbucket user response")?;

    Ok(ProviderUser {
        login: user.username.unwrap_or_else(|| username.to_string()),
        id: 0,
        name: user.display_name,
        email: None,
        bio: None,
        html_url: user.links.and_then(|l| l.html).map(|h| h.href),
    })
}

/// Provider no-reply address, for users whose email is not public.
pub fn noreply_email(provider: Provider, username: &str, id: u64) -> Option<String> {
    match provider {
        Provider::Github => Some(format!("{}+{}@users.noreply.github.com", id, username)),
        Provider::Gitlab => Some(format!("{}-{}@users.noreply.gitlab.com", id, username)),
        Provider::Bitbucket | Provider::Custom => None,
    }
}
