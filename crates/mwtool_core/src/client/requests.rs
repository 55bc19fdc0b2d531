//! Wire parameters for every API call. Both protocol versions accept the
//! same parameter names for these modules; they differ in tokens, login and
//! continuation, which live elsewhere.

use crate::classify::Operation;
use crate::continuation::QueryRequest;
use crate::transport::Params;

use super::{ContributionsQuery, MemberType, RedirectFilter};

fn param(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

fn action(name: &str) -> Params {
    vec![param("action", name), param("format", "json")]
}

fn list_query(list: &'static str, params: impl IntoIterator<Item = (String, String)>) -> QueryRequest {
    let mut all = action("query");
    all.push(param("list", list));
    all.extend(params);
    QueryRequest::new(list, all)
}

pub fn namespaces() -> Params {
    let mut params = action("query");
    params.push(param("meta", "siteinfo"));
    params.push(param("siprop", "namespaces"));
    params
}

pub fn all_pages(
    namespace: i32,
    limit: u32,
    start: Option<&str>,
    redirect_filter: RedirectFilter,
) -> QueryRequest {
    let mut params = vec![
        param("apnamespace", namespace),
        param("apdir", "ascending"),
        param("apfilterredir", redirect_filter.as_str()),
        param("aplimit", limit),
    ];
    if let Some(start) = start {
        params.push(param("apfrom", start));
    }
    list_query("allpages", params)
}

pub fn search(search: &str, namespace: i32, limit: u32) -> QueryRequest {
    list_query(
        "search",
        [
            param("srnamespace", namespace),
            param("srlimit", limit),
            param("srsearch", search),
            param("srwhat", "text"),
        ],
    )
}

pub fn category_members(
    category: &str,
    limit: u32,
    namespace: Option<i32>,
    member_type: Option<MemberType>,
) -> QueryRequest {
    let mut params = vec![
        param("cmtitle", category),
        param("cmdir", "ascending"),
        param("cmlimit", limit),
    ];
    if let Some(member_type) = member_type {
        params.push(param("cmtype", member_type.as_str()));
    }
    if let Some(namespace) = namespace {
        params.push(param("cmnamespace", namespace));
    }
    list_query("categorymembers", params)
}

pub fn backlinks(title: &str, namespace: Option<i32>, limit: u32) -> QueryRequest {
    let mut params = vec![param("bltitle", title), param("bllimit", limit)];
    if let Some(namespace) = namespace {
        params.push(param("blnamespace", namespace));
    }
    list_query("backlinks", params).with_operation(Operation::Backlinks)
}

pub fn user_contributions(query: &ContributionsQuery) -> QueryRequest {
    let mut params = vec![
        param("ucuser", query.user.replace(' ', "_")),
        param("ucnamespace", query.namespace),
        param("uclimit", query.limit),
        param("ucdir", "newer"),
    ];
    if let Some(start) = query.start {
        params.push(param("ucstart", start.timestamp()));
    }
    if let Some(end) = query.end {
        params.push(param("ucend", end.timestamp()));
    }
    list_query("usercontribs", params)
}

pub fn deleted_revisions(namespace: i32, limit: u32) -> QueryRequest {
    list_query(
        "deletedrevs",
        [
            param("drnamespace", namespace),
            param("drlimit", limit),
            param("drprop", "revid|user|comment|content"),
            param("drdir", "newer"),
        ],
    )
}

pub fn all_images(limit: u32) -> QueryRequest {
    list_query(
        "allimages",
        [param("aidir", "ascending"), param("ailimit", limit)],
    )
}

pub fn page_images(page_ids: &[i64]) -> Params {
    let ids = page_ids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("|");
    let mut params = action("query");
    params.extend([
        param("prop", "imageinfo"),
        param("iiprop", "url"),
        param("iilimit", 1),
        param("pageids", ids),
    ]);
    params
}

pub fn edit(title: &str, text: &str, summary: Option<&str>, bot: bool) -> Params {
    let mut params = action("edit");
    params.push(param("title", title));
    params.push(param("text", text));
    if let Some(summary) = summary {
        params.push(param("summary", summary));
    }
    if bot {
        params.push(param("bot", 1));
    }
    params
}

pub fn delete(title: &str, reason: Option<&str>) -> Params {
    let mut params = action("delete");
    params.push(param("title", title));
    if let Some(reason) = reason {
        params.push(param("reason", reason));
    }
    params
}

pub fn upload(file_name: &str, text: Option<&str>, ignore_warnings: bool) -> Params {
    let mut params = action("upload");
    params.push(param("filename", file_name));
    params.push(param("async", 1));
    if ignore_warnings {
        params.push(param("ignorewarnings", 1));
    }
    if let Some(text) = text {
        params.push(param("text", text));
    }
    params
}

pub fn login(username: &str, secret: &str, token: Option<&str>) -> Params {
    let mut params = action("login");
    params.push(param("lgname", username));
    params.push(param("lgpassword", secret));
    if let Some(token) = token {
        params.push(param("lgtoken", token));
    }
    params
}
