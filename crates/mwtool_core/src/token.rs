use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::transport::Params;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Csrf,
    Edit,
    Delete,
    Login,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csrf => "csrf",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Login => "login",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub kind: TokenKind,
    pub title: Option<String>,
}

pub trait TokenScheme {
    fn key(&self, kind: TokenKind, title: &str) -> TokenKey;

    fn fetch_params(&self, key: &TokenKey) -> ApiResult<Params>;

    fn extract(&self, key: &TokenKey, body: &Value) -> ApiResult<String>;
}

/// 1.19: `prop=info&intoken=<kind>` returns one token per requested title.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageTokens;

impl TokenScheme for PageTokens {
    fn key(&self, kind: TokenKind, title: &str) -> TokenKey {
        TokenKey {
            kind,
            title: Some(title.to_string()),
        }
    }

    fn fetch_params(&self, key: &TokenKey) -> ApiResult<Params> {
        let Some(title) = &key.title else {
            return Err(ApiError::Unsupported("untitled token request"));
        };
        if matches!(key.kind, TokenKind::Login | TokenKind::Csrf) {
            return Err(ApiError::Unsupported("page-bound login/csrf tokens"));
        }
        Ok(vec![
            ("action".to_string(), "query".to_string()),
            ("prop".to_string(), "info".to_string()),
            ("titles".to_string(), title.clone()),
            ("intoken".to_string(), key.kind.as_str().to_string()),
            ("format".to_string(), "json".to_string()),
        ])
    }

    fn extract(&self, key: &TokenKey, body: &Value) -> ApiResult<String> {
        let field = format!("{}token", key.kind.as_str());
        let pages = body
            .get("query")
            .and_then(|query| query.get("pages"))
            .and_then(Value::as_object)
            .ok_or_else(|| ApiError::decode("token response has no query.pages"))?;

        // The server may normalize the title, so fall back to the first page.
        let exact = pages
            .values()
            .find(|page| page.get("title").and_then(Value::as_str) == key.title.as_deref());
        exact
            .or_else(|| pages.values().next())
            .and_then(|page| page.get(&field))
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| ApiError::decode(format!("token response has no {field}")))
    }
}

/// 1.31: `meta=tokens&type=<kind>`; edit and delete share one csrf token.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiteTokens;

impl TokenScheme for SiteTokens {
    fn key(&self, kind: TokenKind, _title: &str) -> TokenKey {
        let kind = match kind {
            TokenKind::Login => TokenKind::Login,
            _ => TokenKind::Csrf,
        };
        TokenKey { kind, title: None }
    }

    fn fetch_params(&self, key: &TokenKey) -> ApiResult<Params> {
        Ok(vec![
            ("action".to_string(), "query".to_string()),
            ("meta".to_string(), "tokens".to_string()),
            ("type".to_string(), key.kind.as_str().to_string()),
            ("format".to_string(), "json".to_string()),
        ])
    }

    fn extract(&self, key: &TokenKey, body: &Value) -> ApiResult<String> {
        let field = format!("{}token", key.kind.as_str());
        body.get("query")
            .and_then(|query| query.get("tokens"))
            .and_then(|tokens| tokens.get(&field))
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| ApiError::decode(format!("failed to get MediaWiki {field}")))
    }
}

pub struct TokenManager {
    scheme: Box<dyn TokenScheme>,
    cache: HashMap<TokenKey, String>,
}

impl TokenManager {
    pub fn new(scheme: Box<dyn TokenScheme>) -> Self {
        Self {
            scheme,
            cache: HashMap::new(),
        }
    }

    pub fn key(&self, kind: TokenKind, title: &str) -> TokenKey {
        self.scheme.key(kind, title)
    }

    pub fn cached(&self, key: &TokenKey) -> Option<&str> {
        self.cache.get(key).map(String::as_str)
    }

    pub fn get_token<F>(&mut self, key: &TokenKey, fetch: F) -> ApiResult<String>
    where
        F: FnOnce(Params) -> ApiResult<Value>,
    {
        if let Some(token) = self.cache.get(key) {
            return Ok(token.clone());
        }
        let params = self.scheme.fetch_params(key)?;
        let body = fetch(params)?;
        let token = self.scheme.extract(key, &body)?;
        debug!(kind = key.kind.as_str(), title = ?key.title, "fetched token");
        self.cache.insert(key.clone(), token.clone());
        Ok(token)
    }

    pub fn invalidate(&mut self, key: &TokenKey) {
        if self.cache.remove(key).is_some() {
            debug!(kind = key.kind.as_str(), title = ?key.title, "invalidated token");
        }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
