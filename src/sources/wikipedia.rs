use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::Encyclopedia;
use crate::config::EncyclopediaConfig;
use crate::error::{AskragError, Result};

const USER_AGENT: &str = concat!("askrag/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    searchinfo: Option<SearchInfo>,
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchInfo {
    suggestion: Option<String>,
}

#[derive(Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Deserialize)]
struct ExtractResponse {
    query: Option<ExtractQuery>,
}

#[derive(Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    pageprops: Option<PageProps>,
}

#[derive(Deserialize)]
struct PageProps {
    disambiguation: Option<String>,
}

/// Summaries from the MediaWiki action API.
///
/// A topic is resolved with a single-result search (taking the spelling
/// suggestion when there is one), then the intro of the resolved page is
/// fetched as plain text with redirects followed.
pub struct WikipediaClient {
    client: Client,
    api_url: String,
}

impl WikipediaClient {
    pub fn new(config: &EncyclopediaConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AskragError::Encyclopedia(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: format!("https://{}.wikipedia.org/w/api.php", config.language),
        })
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, params: &[(&str, &str)]) -> Result<T> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[("action", "query"), ("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await
            .map_err(|e| AskragError::Encyclopedia(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AskragError::Encyclopedia(format!("API error {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| AskragError::Encyclopedia(format!("Failed to parse response: {}", e)))
    }

    /// Best page title for `topic`, if the search finds anything.
    async fn resolve_title(&self, topic: &str) -> Result<Option<String>> {
        let response: SearchResponse = self
            .get(&[
                ("list", "search"),
                ("srsearch", topic),
                ("srlimit", "1"),
                ("srinfo", "suggestion"),
                ("srprop", ""),
            ])
            .await?;

        let Some(query) = response.query else {
            return Ok(None);
        };
        let suggestion = query.searchinfo.and_then(|i| i.suggestion);
        Ok(suggestion.or_else(|| query.search.into_iter().next().map(|hit| hit.title)))
    }

    async fn intro(&self, title: &str) -> Result<Option<String>> {
        let response: ExtractResponse = self
            .get(&[
                ("prop", "extracts|pageprops"),
                ("ppprop", "disambiguation"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .await?;

        let Some(page) = response.query.and_then(|q| q.pages.into_iter().next()) else {
            return Ok(None);
        };
        if page.missing {
            return Ok(None);
        }
        if page.pageprops.and_then(|p| p.disambiguation).is_some() {
            log::debug!("'{}' is a disambiguation page", title);
            return Ok(None);
        }
        Ok(page.extract.filter(|e| !e.trim().is_empty()))
    }
}

#[async_trait]
impl Encyclopedia for WikipediaClient {
    async fn summarize(&self, topic: &str, sentences: usize) -> Result<Option<String>> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Ok(None);
        }

        let Some(title) = self.resolve_title(topic).await? else {
            return Ok(None);
        };
        log::debug!("Resolved topic '{}' to page '{}'", topic, title);

        let Some(extract) = self.intro(&title).await? else {
            return Ok(None);
        };
        if extract.contains("may refer to") {
            return Ok(None);
        }

        Ok(Some(first_sentences(&extract, sentences)))
    }
}

/// The first `n` sentences of `text`.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace or end of text.
pub fn first_sentences(text: &str, n: usize) -> String {
    let text = text.trim();
    if n == 0 {
        return String::new();
    }

    let mut seen = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let at_boundary = match chars.peek() {
            None => true,
            Some((_, next)) => next.is_whitespace(),
        };
        if at_boundary {
            seen += 1;
            if seen == n {
                return text[..i + c.len_utf8()].to_string();
            }
        }
    }
    text.to_string()
}
