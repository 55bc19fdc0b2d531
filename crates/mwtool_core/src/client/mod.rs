//! The wiki operations, independent of protocol version.
//!
//! [`WikiClient`] is implemented by [`LegacyClient`] (MediaWiki 1.19) and
//! [`ModernClient`] (MediaWiki 1.31). Each owns its own [`Session`]; the
//! versions differ only in the strategies that session is built with and in
//! their login, write and upload wire details. Paginated reads are provided
//! methods driven through [`WikiClient::fetch_next_batch`], so both versions
//! share one implementation of every listing.
//!
//! [`Session`]: crate::session::Session

pub mod legacy;
pub mod modern;
pub mod requests;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::ClientConfig;
use crate::continuation::{Pager, QueryRequest};
use crate::error::{ApiError, ApiResult};
use crate::transport::{HttpTransport, Params};

pub use legacy::LegacyClient;
pub use modern::ModernClient;

pub const NAMESPACE_FILE: i32 = 6;

pub type Listing<'a, T> = Box<dyn Iterator<Item = ApiResult<T>> + 'a>;

/// Raw result object for listings whose shape varies by server (contributions,
/// deleted revisions).
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolVersion {
    #[serde(rename = "1.19")]
    V1_19,
    #[serde(rename = "1.31")]
    V1_31,
}

impl ProtocolVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1_19 => "1.19",
            Self::V1_31 => "1.31",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolVersion {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "1.19" => Ok(Self::V1_19),
            "1.31" => Ok(Self::V1_31),
            other => Err(format!(
                "MediaWiki API version {other} is not yet implemented"
            )),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    secret: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Parse `USER:SECRET`. Anything but exactly one separator is rejected.
    pub fn from_pair(value: &str) -> Option<Self> {
        let mut parts = value.split(':');
        let username = parts.next()?;
        let secret = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(username, secret))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectFilter {
    #[default]
    All,
    Redirects,
    NonRedirects,
}

impl RedirectFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Redirects => "redirects",
            Self::NonRedirects => "nonredirects",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    Page,
    Subcat,
    File,
}

impl MemberType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Subcat => "subcat",
            Self::File => "file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    #[serde(default)]
    pub pageid: Option<i64>,
    #[serde(default)]
    pub ns: i32,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionsQuery {
    pub user: String,
    pub namespace: i32,
    pub limit: u32,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub content: Vec<u8>,
    pub mime_type: Option<String>,
    pub text: Option<String>,
    pub ignore_warnings: bool,
}

pub trait WikiClient {
    fn protocol(&self) -> ProtocolVersion;

    fn request_count(&self) -> usize;

    fn query(&mut self, params: Params) -> ApiResult<Value>;

    fn fetch_next_batch(&mut self, pager: &mut Pager) -> Option<ApiResult<Vec<Value>>>;

    fn login(&mut self, credentials: &Credentials) -> ApiResult<()>;

    /// Raw wikitext. A missing page is `StatusCode(404)`.
    fn read_page(&mut self, title: &str) -> ApiResult<String>;

    fn edit_page(&mut self, title: &str, text: &str, summary: Option<&str>) -> ApiResult<()>;

    fn delete_page(&mut self, title: &str, reason: Option<&str>) -> ApiResult<()>;

    fn upload_file(&mut self, upload: &Upload) -> ApiResult<()>;

    fn list_namespaces(&mut self) -> ApiResult<BTreeSet<i32>> {
        let body = self.query(requests::namespaces())?;
        let namespaces = body
            .get("query")
            .and_then(|query| query.get("namespaces"))
            .and_then(Value::as_object)
            .ok_or_else(|| ApiError::decode("siteinfo response has no query.namespaces"))?;
        Ok(namespaces
            .keys()
            .filter_map(|key| key.parse::<i32>().ok())
            .filter(|id| *id >= 0)
            .collect())
    }

    fn list_pages(
        &mut self,
        namespace: i32,
        limit: u32,
        start: Option<&str>,
        redirect_filter: RedirectFilter,
    ) -> Listing<'_, String> {
        let request = requests::all_pages(namespace, limit, start, redirect_filter);
        decode_items(paginate(self, request), title_of)
    }

    fn search_pages(&mut self, search: &str, namespace: i32, limit: u32) -> Listing<'_, String> {
        decode_items(
            paginate(self, requests::search(search, namespace, limit)),
            title_of,
        )
    }

    fn get_category_members(
        &mut self,
        category: &str,
        limit: u32,
        namespace: Option<i32>,
        member_type: Option<MemberType>,
    ) -> Listing<'_, PageRef> {
        let request = requests::category_members(category, limit, namespace, member_type);
        decode_items(paginate(self, request), from_value)
    }

    fn get_backlinks(
        &mut self,
        title: &str,
        namespace: Option<i32>,
        limit: u32,
    ) -> Listing<'_, PageRef> {
        decode_items(
            paginate(self, requests::backlinks(title, namespace, limit)),
            from_value,
        )
    }

    fn get_user_contributions(&mut self, query: &ContributionsQuery) -> Listing<'_, Record> {
        decode_items(paginate(self, requests::user_contributions(query)), record_of)
    }

    /// Each yielded revision carries the `title` of the page it belonged to.
    fn get_deleted_revisions(&mut self, namespace: i32, limit: u32) -> Listing<'_, Record> {
        decode_items(
            paginate(self, requests::deleted_revisions(namespace, limit)),
            revisions_of,
        )
    }

    fn list_images(&mut self, limit: u32) -> Listing<'_, ImageInfo> {
        decode_items(paginate(self, requests::all_images(limit)), image_of)
    }

    /// One request per group of `batch_size` page IDs; `imageinfo` takes many
    /// IDs per call, so there is no cursor to follow.
    fn list_images_for_pages(&mut self, batch_size: usize, page_ids: &[i64]) -> Listing<'_, ImageInfo> {
        let groups: Vec<Vec<i64>> = page_ids
            .chunks(batch_size.max(1))
            .map(<[i64]>::to_vec)
            .collect();
        let mut failed = false;
        Box::new(groups.into_iter().flat_map(move |group| {
            if failed {
                return Vec::new();
            }
            match self.query(requests::page_images(&group)) {
                Ok(body) => page_images_of(body),
                Err(error) => {
                    failed = true;
                    vec![Err(error)]
                }
            }
        }))
    }
}

pub struct Batches<'c, C: ?Sized> {
    client: &'c mut C,
    pager: Pager,
}

impl<C: WikiClient + ?Sized> Iterator for Batches<'_, C> {
    type Item = ApiResult<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.client.fetch_next_batch(&mut self.pager)
    }
}

pub fn paginate<C: WikiClient + ?Sized>(client: &mut C, request: QueryRequest) -> Batches<'_, C> {
    Batches {
        client,
        pager: Pager::new(request),
    }
}

pub fn connect(config: &ClientConfig, version: ProtocolVersion) -> ApiResult<Box<dyn WikiClient>> {
    let transport = HttpTransport::new(config)?;
    Ok(match version {
        ProtocolVersion::V1_19 => Box::new(LegacyClient::new(transport, config)),
        ProtocolVersion::V1_31 => Box::new(ModernClient::new(transport, config)),
    })
}

fn decode_items<'a, C, U, F>(batches: Batches<'a, C>, decode: F) -> Listing<'a, U>
where
    C: WikiClient + ?Sized + 'a,
    U: 'a,
    F: Fn(Value) -> ApiResult<Vec<U>> + 'a,
{
    Box::new(batches.flat_map(move |batch| match batch {
        Ok(items) => items
            .into_iter()
            .flat_map(|item| match decode(item) {
                Ok(values) => values.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(error) => vec![Err(error)],
            })
            .collect::<Vec<_>>(),
        Err(error) => vec![Err(error)],
    }))
}

fn title_of(item: Value) -> ApiResult<Vec<String>> {
    item.get("title")
        .and_then(Value::as_str)
        .map(|title| vec![title.to_string()])
        .ok_or_else(|| ApiError::decode("list item has no title"))
}

fn from_value<U: for<'de> Deserialize<'de>>(item: Value) -> ApiResult<Vec<U>> {
    Ok(vec![serde_json::from_value(item)?])
}

fn record_of(item: Value) -> ApiResult<Vec<Record>> {
    match item {
        Value::Object(record) => Ok(vec![record]),
        _ => Err(ApiError::decode("list item is not an object")),
    }
}

fn revisions_of(item: Value) -> ApiResult<Vec<Record>> {
    let title = item
        .get("title")
        .cloned()
        .ok_or_else(|| ApiError::decode("deleted revision entry has no title"))?;
    let revisions = item
        .get("revisions")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    revisions
        .into_iter()
        .map(|revision| match revision {
            Value::Object(mut record) => {
                record.insert("title".to_string(), title.clone());
                Ok(record)
            }
            _ => Err(ApiError::decode("deleted revision is not an object")),
        })
        .collect()
}

fn image_of(item: Value) -> ApiResult<Vec<ImageInfo>> {
    let title = item.get("title").and_then(Value::as_str);
    let url = item.get("url").and_then(Value::as_str);
    match (title, url) {
        (Some(title), Some(url)) => Ok(vec![ImageInfo {
            title: title.to_string(),
            url: url.to_string(),
        }]),
        _ => Err(ApiError::decode("image entry has no title or url")),
    }
}

fn page_images_of(body: Value) -> Vec<ApiResult<ImageInfo>> {
    let Some(pages) = body
        .get("query")
        .and_then(|query| query.get("pages"))
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };
    let mut images = Vec::with_capacity(pages.len());
    for page in pages.values() {
        let title = page.get("title").and_then(Value::as_str);
        let url = page
            .get("imageinfo")
            .and_then(|info| info.get(0))
            .and_then(|info| info.get("url"))
            .and_then(Value::as_str);
        match (title, url) {
            (Some(title), Some(url)) => images.push(Ok(ImageInfo {
                title: title.to_string(),
                url: url.to_string(),
            })),
            (title, _) => warn!(title = title.unwrap_or("<unknown>"), "page has no image info"),
        }
    }
    images
}

fn login_result(body: &Value) -> ApiResult<&str> {
    body.get("login")
        .and_then(|login| login.get("result"))
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::decode("login response has no login.result"))
}

fn login_failed(result: &str) -> ApiError {
    ApiError::misc(format!("Login result is {result}"))
}

/// An edit can be refused without an `error` object (captcha, abuse filter).
fn ensure_edit_succeeded(body: &Value) -> ApiResult<()> {
    let Some(edit) = body.get("edit") else {
        return Ok(());
    };
    match edit.get("result").and_then(Value::as_str) {
        Some("Success") | None => Ok(()),
        Some(_) => Err(ApiError::Misc(edit.clone())),
    }
}
