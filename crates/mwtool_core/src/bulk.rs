//! Bulk workflows over a [`WikiClient`]: mass delete, mass edit, interwiki
//! clone and link replacement.
//!
//! Each run streams pages, tallies what happened to every one of them in a
//! [`BulkReport`] and keeps going past the per-page failures it documents as
//! non-fatal. Any other error aborts the run; the partial report travels with
//! the error in [`BulkAborted`].

use std::fmt;

use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::client::{Credentials, PageRef, RedirectFilter, WikiClient, requests};
use crate::continuation::{Pager, QueryRequest};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BulkOperation {
    MassDelete,
    MassEdit,
    CloneInterwikis,
    ReplaceLinks,
}

impl BulkOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MassDelete => "mass-delete",
            Self::MassEdit => "mass-edit",
            Self::CloneInterwikis => "clone-interwikis",
            Self::ReplaceLinks => "replace-links",
        }
    }
}

impl fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum FailureReason {
    CannotDelete(String),
    Protected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    pub title: String,
    pub reason: FailureReason,
}

/// Per-run tallies. Counters only ever grow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub operation: BulkOperation,
    pub processed: usize,
    pub mutated: usize,
    pub filtered_out: usize,
    /// The change was already in place (interwiki clone).
    pub already_done: usize,
    pub unchanged: usize,
    pub failures: Vec<PageFailure>,
}

impl BulkReport {
    pub fn new(operation: BulkOperation) -> Self {
        Self {
            operation,
            processed: 0,
            mutated: 0,
            filtered_out: 0,
            already_done: 0,
            unchanged: 0,
            failures: Vec::new(),
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn protected(&self) -> usize {
        self.failures
            .iter()
            .filter(|failure| matches!(failure.reason, FailureReason::Protected(_)))
            .count()
    }

    fn record_processed(&mut self) {
        self.processed += 1;
    }

    fn record_mutated(&mut self) {
        self.mutated += 1;
    }

    fn record_filtered(&mut self) {
        self.filtered_out += 1;
    }

    fn record_already_done(&mut self) {
        self.already_done += 1;
    }

    fn record_unchanged(&mut self) {
        self.unchanged += 1;
    }

    fn record_failure(&mut self, title: &str, reason: FailureReason) {
        self.failures.push(PageFailure {
            title: title.to_string(),
            reason,
        });
    }
}

/// A run stopped on a fatal error. `report` holds everything tallied before it.
#[derive(Debug, Error)]
#[error("{} aborted after {} processed pages: {source}", .report.operation, .report.processed)]
pub struct BulkAborted {
    pub report: BulkReport,
    pub source: ApiError,
}

pub type BulkResult = Result<BulkReport, BulkAborted>;

#[derive(Debug, Clone)]
pub struct PageSelection {
    filter: Regex,
    exclude: Option<Regex>,
    namespaces: Vec<i32>,
    first_page: Option<String>,
    first_page_namespace: Option<i32>,
    api_limit: u32,
}

impl PageSelection {
    /// `filter` and `exclude` must match at the start of a title.
    pub fn new(filter: &str, namespaces: Vec<i32>, api_limit: u32) -> ApiResult<Self> {
        Ok(Self {
            filter: Regex::new(filter)?,
            exclude: None,
            namespaces,
            first_page: None,
            first_page_namespace: None,
            api_limit,
        })
    }

    pub fn with_exclude(mut self, exclude: Option<&str>) -> ApiResult<Self> {
        self.exclude = exclude.map(Regex::new).transpose()?;
        Ok(self)
    }

    /// Resume a previous run. Namespaces listed before `namespace` are skipped
    /// and `title` is the first page listed in the resumed namespace.
    pub fn resume_from(mut self, title: Option<String>, namespace: Option<i32>) -> Self {
        self.first_page = title;
        self.first_page_namespace = namespace;
        self
    }

    pub fn accepts(&self, title: &str) -> bool {
        matches_at_start(&self.filter, title)
            && !self
                .exclude
                .as_ref()
                .is_some_and(|exclude| matches_at_start(exclude, title))
    }

    fn plan(&self) -> ApiResult<Vec<(i32, Option<&str>)>> {
        let start = match self.first_page_namespace {
            Some(namespace) => self
                .namespaces
                .iter()
                .position(|candidate| *candidate == namespace)
                .ok_or_else(|| {
                    ApiError::misc(format!("namespace {namespace} is not among the selected namespaces"))
                })?,
            None => 0,
        };
        Ok(self.namespaces[start..]
            .iter()
            .enumerate()
            .map(|(index, namespace)| {
                let first = if index == 0 { self.first_page.as_deref() } else { None };
                (*namespace, first)
            })
            .collect())
    }
}

fn matches_at_start(pattern: &Regex, text: &str) -> bool {
    pattern.find(text).is_some_and(|found| found.start() == 0)
}

/// Adds a `[[NEW:...]]` interwiki next to the last `[[OLD:...]]` one.
#[derive(Debug, Clone)]
pub struct InterwikiClone {
    old: String,
    new: String,
    old_link: Regex,
    new_link: Regex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneOutcome {
    AlreadyPresent,
    NoSource,
    Rewritten(String),
}

impl InterwikiClone {
    pub fn new(old: &str, new: &str) -> ApiResult<Self> {
        Ok(Self {
            old: old.to_string(),
            new: new.to_string(),
            old_link: Regex::new(&format!(r"(?s)\A(.*\[\[{}:(.+?)\]\])", regex::escape(old)))?,
            new_link: Regex::new(&format!(r"(?s)\[\[{}:(.+?)\]\]", regex::escape(new)))?,
        })
    }

    pub fn search_term(&self) -> &str {
        &self.old
    }

    pub fn apply(&self, text: &str) -> CloneOutcome {
        if self.new_link.is_match(text) {
            return CloneOutcome::AlreadyPresent;
        }
        if !self.old_link.is_match(text) {
            return CloneOutcome::NoSource;
        }
        let rewritten = self.old_link.replacen(text, 1, |caps: &Captures| {
            format!("{}\n[[{}:{}]]", &caps[1], self.new, &caps[2])
        });
        CloneOutcome::Rewritten(rewritten.into_owned())
    }
}

/// Points `[[OLD|label]]` and `[[OLD]]` at `NEW`, keeping the displayed text.
#[derive(Debug, Clone)]
pub struct LinkRewrite {
    old: String,
    new: String,
    labelled: Regex,
    bare: Regex,
}

impl LinkRewrite {
    pub fn new(old: &str, new: &str) -> ApiResult<Self> {
        let escaped = regex::escape(old);
        Ok(Self {
            old: old.to_string(),
            new: new.to_string(),
            labelled: Regex::new(&format!(r"(?i)\[\[{escaped}\|([^\]]+)\]\]"))?,
            bare: Regex::new(&format!(r"(?i)\[\[({escaped})\]\]"))?,
        })
    }

    /// The page whose backlinks are rewritten.
    pub fn target(&self) -> &str {
        &self.old
    }

    pub fn apply(&self, text: &str) -> String {
        let relink = |caps: &Captures| format!("[[{}|{}]]", self.new, &caps[1]);
        let labelled = self.labelled.replace_all(text, relink);
        self.bare.replace_all(&labelled, relink).into_owned()
    }
}

/// Delete every selected page. `CannotDelete` is tallied and skipped.
pub fn mass_delete<C: WikiClient + ?Sized>(
    client: &mut C,
    credentials: Option<&Credentials>,
    selection: &PageSelection,
    reason: Option<&str>,
) -> BulkResult {
    let mut report = BulkReport::new(BulkOperation::MassDelete);
    match run_mass_delete(client, credentials, selection, reason, &mut report) {
        Ok(()) => Ok(report),
        Err(source) => Err(BulkAborted { report, source }),
    }
}

fn run_mass_delete<C: WikiClient + ?Sized>(
    client: &mut C,
    credentials: Option<&Credentials>,
    selection: &PageSelection,
    reason: Option<&str>,
    report: &mut BulkReport,
) -> ApiResult<()> {
    authenticate(client, credentials)?;
    for (namespace, first_page) in selection.plan()? {
        let request = requests::all_pages(namespace, selection.api_limit, first_page, RedirectFilter::All);
        for_each_title(client, request, |client, title| {
            report.record_processed();
            if !selection.accepts(&title) {
                report.record_filtered();
                return Ok(());
            }
            match client.delete_page(&title, reason) {
                Ok(()) => {
                    info!(title = %title, "deleted");
                    report.record_mutated();
                    Ok(())
                }
                Err(ApiError::CannotDelete(detail)) => {
                    warn!(title = %title, detail = %detail, "cannot delete");
                    report.record_failure(&title, FailureReason::CannotDelete(detail));
                    Ok(())
                }
                Err(error) => Err(error),
            }
        })?;
    }
    Ok(())
}

/// Replace the text of every selected non-redirect page. Every error is fatal.
pub fn mass_edit<C: WikiClient + ?Sized>(
    client: &mut C,
    credentials: Option<&Credentials>,
    selection: &PageSelection,
    text: &str,
    summary: Option<&str>,
) -> BulkResult {
    let mut report = BulkReport::new(BulkOperation::MassEdit);
    match run_mass_edit(client, credentials, selection, text, summary, &mut report) {
        Ok(()) => Ok(report),
        Err(source) => Err(BulkAborted { report, source }),
    }
}

fn run_mass_edit<C: WikiClient + ?Sized>(
    client: &mut C,
    credentials: Option<&Credentials>,
    selection: &PageSelection,
    text: &str,
    summary: Option<&str>,
    report: &mut BulkReport,
) -> ApiResult<()> {
    authenticate(client, credentials)?;
    for (namespace, first_page) in selection.plan()? {
        let request = requests::all_pages(
            namespace,
            selection.api_limit,
            first_page,
            RedirectFilter::NonRedirects,
        );
        for_each_title(client, request, |client, title| {
            report.record_processed();
            if !selection.accepts(&title) {
                report.record_filtered();
                return Ok(());
            }
            client.edit_page(&title, text, summary)?;
            info!(title = %title, "edited");
            report.record_mutated();
            Ok(())
        })?;
    }
    Ok(())
}

/// Search every namespace for pages with the old interwiki and add the new one
/// next to it.
pub fn clone_interwikis<C: WikiClient + ?Sized>(
    client: &mut C,
    credentials: Option<&Credentials>,
    clone: &InterwikiClone,
    summary: Option<&str>,
    api_limit: u32,
) -> BulkResult {
    let mut report = BulkReport::new(BulkOperation::CloneInterwikis);
    match run_clone_interwikis(client, credentials, clone, summary, api_limit, &mut report) {
        Ok(()) => Ok(report),
        Err(source) => Err(BulkAborted { report, source }),
    }
}

fn run_clone_interwikis<C: WikiClient + ?Sized>(
    client: &mut C,
    credentials: Option<&Credentials>,
    clone: &InterwikiClone,
    summary: Option<&str>,
    api_limit: u32,
    report: &mut BulkReport,
) -> ApiResult<()> {
    authenticate(client, credentials)?;
    for namespace in client.list_namespaces()? {
        let request = requests::search(clone.search_term(), namespace, api_limit);
        for_each_title(client, request, |client, title| {
            report.record_processed();
            let text = client.read_page(&title)?;
            match clone.apply(&text) {
                CloneOutcome::AlreadyPresent => report.record_already_done(),
                CloneOutcome::NoSource => report.record_unchanged(),
                CloneOutcome::Rewritten(new_text) => {
                    client.edit_page(&title, &new_text, summary)?;
                    info!(title = %title, "edited");
                    report.record_mutated();
                }
            }
            Ok(())
        })?;
    }
    Ok(())
}

/// Rewrite links on every page linking to the rewrite's target. The backlink
/// list is fetched in full before the first edit.
pub fn replace_links<C: WikiClient + ?Sized>(
    client: &mut C,
    credentials: Option<&Credentials>,
    rewrite: &LinkRewrite,
    summary: Option<&str>,
    api_limit: u32,
) -> BulkResult {
    let mut report = BulkReport::new(BulkOperation::ReplaceLinks);
    match run_replace_links(client, credentials, rewrite, summary, api_limit, &mut report) {
        Ok(()) => Ok(report),
        Err(source) => Err(BulkAborted { report, source }),
    }
}

fn run_replace_links<C: WikiClient + ?Sized>(
    client: &mut C,
    credentials: Option<&Credentials>,
    rewrite: &LinkRewrite,
    summary: Option<&str>,
    api_limit: u32,
    report: &mut BulkReport,
) -> ApiResult<()> {
    authenticate(client, credentials)?;
    let old = rewrite.target();
    let backlinks = client
        .get_backlinks(old, None, api_limit)
        .collect::<ApiResult<Vec<PageRef>>>()?;
    info!(count = backlinks.len(), target = old, "collected backlinks");

    for backlink in backlinks {
        let title = backlink.title;
        let text = client.read_page(&title)?;
        let new_text = rewrite.apply(&text);
        report.record_processed();
        if new_text == text {
            report.record_unchanged();
            continue;
        }
        match client.edit_page(&title, &new_text, summary) {
            Ok(()) => {
                info!(title = %title, "edited");
                report.record_mutated();
            }
            Err(ApiError::PageProtected(detail)) => {
                warn!(title = %title, "page is protected");
                report.record_failure(&title, FailureReason::Protected(protection_detail(&detail)));
            }
            Err(error) => return Err(error),
        }
    }
    Ok(())
}

fn authenticate<C: WikiClient + ?Sized>(client: &mut C, credentials: Option<&Credentials>) -> ApiResult<()> {
    match credentials {
        Some(credentials) => client.login(credentials),
        None => Ok(()),
    }
}

/// Page through `request` one batch at a time, handing each title to `visit`
/// with the client free for writes in between.
fn for_each_title<C, F>(client: &mut C, request: QueryRequest, mut visit: F) -> ApiResult<()>
where
    C: WikiClient + ?Sized,
    F: FnMut(&mut C, String) -> ApiResult<()>,
{
    let mut pager = Pager::new(request);
    while let Some(batch) = client.fetch_next_batch(&mut pager) {
        for item in batch? {
            let title = item
                .get("title")
                .and_then(Value::as_str)
                .ok_or_else(|| ApiError::decode("list item has no title"))?
                .to_string();
            visit(client, title)?;
        }
    }
    Ok(())
}

fn protection_detail(detail: &Value) -> String {
    detail
        .get("info")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .unwrap_or_else(|| detail.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        BulkOperation, CloneOutcome, FailureReason, InterwikiClone, LinkRewrite, PageSelection,
        clone_interwikis, mass_delete, mass_edit, replace_links,
    };
    use crate::client::{Credentials, LegacyClient, ModernClient};
    use crate::config::ClientConfig;
    use crate::error::ApiError;
    use crate::testing::MockTransport;

    fn modern(transport: &MockTransport) -> ModernClient<MockTransport> {
        ModernClient::new(transport.clone(), &ClientConfig::new("https://wiki.example.org"))
    }

    fn csrf(token: &str) -> serde_json::Value {
        json!({"query": {"tokens": {"csrftoken": token}}})
    }

    fn pages(titles: &[&str]) -> serde_json::Value {
        let items: Vec<_> = titles.iter().map(|title| json!({"title": title})).collect();
        json!({"query": {"allpages": items}})
    }

    #[test]
    fn selection_matches_at_start_and_honours_exclude() {
        let selection = PageSelection::new("Ba", vec![0], 500)
            .and_then(|selection| selection.with_exclude(Some("Baz$")))
            .expect("selection");
        assert!(selection.accepts("Bar"));
        assert!(!selection.accepts("Baz"));
        assert!(!selection.accepts("FooBar"));
    }

    #[test]
    fn invalid_filter_is_invalid_pattern() {
        let error = PageSelection::new("(", vec![0], 500).expect_err("must fail");
        assert!(matches!(error, ApiError::InvalidPattern(_)));
    }

    #[test]
    fn mass_delete_only_touches_selected_pages() {
        let transport = MockTransport::default();
        transport.push_json(pages(&["Foo", "Bar", "Baz"]));
        transport.push_json(csrf("c1"));
        transport.push_json(json!({"delete": {"title": "Bar"}}));

        let selection = PageSelection::new("^Ba", vec![0], 500)
            .and_then(|selection| selection.with_exclude(Some("^Baz$")))
            .expect("selection");
        let mut client = modern(&transport);
        let report = mass_delete(&mut client, None, &selection, Some("cleanup")).expect("report");

        assert_eq!(report.mutated, 1);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.filtered_out, 2);
        assert_eq!(report.processed, 3);

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].param("action"), Some("delete"));
        assert_eq!(requests[2].param("title"), Some("Bar"));
        assert_eq!(requests[2].param("reason"), Some("cleanup"));
    }

    #[test]
    fn mass_delete_tallies_cannot_delete_and_continues() {
        let transport = MockTransport::default();
        transport.push_json(json!({
            "continue": {"apcontinue": "B", "continue": "-||"},
            "query": {"allpages": [{"title": "A"}]}
        }));
        transport.push_json(csrf("c1"));
        transport.push_json(json!({"error": {"code": "cantdelete", "info": "already gone"}}));
        transport.push_json(pages(&["B"]));
        transport.push_json(json!({"delete": {"title": "B"}}));

        let selection = PageSelection::new(".", vec![0], 1).expect("selection");
        let mut client = modern(&transport);
        let report = mass_delete(&mut client, None, &selection, None).expect("report");

        assert_eq!(report.mutated, 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].title, "A");
        assert_eq!(
            report.failures[0].reason,
            FailureReason::CannotDelete("already gone".to_string())
        );
        assert_eq!(transport.requests()[3].param("apcontinue"), Some("B"));
    }

    #[test]
    fn mass_delete_aborts_on_other_errors_with_partial_report() {
        let transport = MockTransport::default();
        transport.push_json(pages(&["A", "B"]));
        transport.push_json(csrf("c1"));
        transport.push_json(json!({"delete": {"title": "A"}}));
        transport.push_json(json!({"error": {"code": "permissiondenied", "info": "no"}}));

        let selection = PageSelection::new(".", vec![0], 500).expect("selection");
        let mut client = modern(&transport);
        let aborted = mass_delete(&mut client, None, &selection, None).expect_err("must abort");

        assert_eq!(aborted.report.operation, BulkOperation::MassDelete);
        assert_eq!(aborted.report.mutated, 1);
        assert!(matches!(aborted.source, ApiError::Misc(_)));
        assert!(aborted.to_string().contains("mass-delete"));
    }

    #[test]
    fn mass_delete_logs_in_first_when_given_credentials() {
        let transport = MockTransport::default();
        transport.push_json(json!({"login": {"result": "NeedToken", "token": "lt"}}));
        transport.push_json(json!({"login": {"result": "Success"}}));
        transport.push_json(pages(&[]));

        let selection = PageSelection::new(".", vec![0], 500).expect("selection");
        let mut client =
            LegacyClient::new(transport.clone(), &ClientConfig::new("https://old.example.org"));
        let report = mass_delete(
            &mut client,
            Some(&Credentials::new("Bot", "pw")),
            &selection,
            None,
        )
        .expect("report");
        assert_eq!(report.processed, 0);
        assert_eq!(transport.requests()[2].param("list"), Some("allpages"));
    }

    #[test]
    fn resume_skips_earlier_namespaces_and_starts_at_title() {
        let transport = MockTransport::default();
        transport.push_json(pages(&["M"]));
        transport.push_json(pages(&["N"]));

        let selection = PageSelection::new("^Z", vec![0, 4, 10], 500)
            .expect("selection")
            .resume_from(Some("M".to_string()), Some(4));
        let mut client = modern(&transport);
        let report = mass_edit(&mut client, None, &selection, "text", None).expect("report");
        assert_eq!(report.filtered_out, 2);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].param("apnamespace"), Some("4"));
        assert_eq!(requests[0].param("apfrom"), Some("M"));
        assert_eq!(requests[0].param("apfilterredir"), Some("nonredirects"));
        assert_eq!(requests[1].param("apnamespace"), Some("10"));
        assert_eq!(requests[1].param("apfrom"), None);
    }

    #[test]
    fn resume_namespace_must_be_selected() {
        let transport = MockTransport::default();
        let selection = PageSelection::new(".", vec![0], 500)
            .expect("selection")
            .resume_from(None, Some(14));
        let mut client = modern(&transport);
        assert!(mass_edit(&mut client, None, &selection, "x", None).is_err());
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn mass_edit_treats_protection_as_fatal() {
        let transport = MockTransport::default();
        transport.push_json(pages(&["A"]));
        transport.push_json(csrf("c1"));
        transport.push_json(json!({"error": {"code": "protectedpage", "info": "protected"}}));

        let selection = PageSelection::new(".", vec![0], 500).expect("selection");
        let mut client = modern(&transport);
        let aborted = mass_edit(&mut client, None, &selection, "x", None).expect_err("must abort");
        assert!(aborted.source.is_page_protected());
        assert_eq!(aborted.report.processed, 1);
    }

    #[test]
    fn link_rewrite_keeps_labels_and_bare_titles() {
        let rewrite = LinkRewrite::new("Old", "New").expect("rewrite");
        assert_eq!(
            rewrite.apply("[[Old|Label]] and [[Old]]"),
            "[[New|Label]] and [[New|Old]]"
        );
        assert_eq!(rewrite.apply("[[old]] [[Older]]"), "[[New|old]] [[Older]]");
    }

    #[test]
    fn link_rewrite_escapes_title_metacharacters() {
        let rewrite = LinkRewrite::new("C++ (language)", "C++").expect("rewrite");
        assert_eq!(rewrite.target(), "C++ (language)");
        assert_eq!(
            rewrite.apply("[[C++ (language)]] vs [[Cxx (language)]]"),
            "[[C++|C++ (language)]] vs [[Cxx (language)]]"
        );
    }

    #[test]
    fn replace_links_counts_protected_pages_and_continues() {
        let transport = MockTransport::default();
        transport.push_json(json!({"query": {"backlinks": [
            {"pageid": 1, "ns": 0, "title": "A"},
            {"pageid": 2, "ns": 0, "title": "B"},
            {"pageid": 3, "ns": 0, "title": "C"}
        ]}}));
        transport.push_text(200, "[[Old|Label]] and [[Old]]");
        transport.push_json(csrf("c1"));
        transport.push_json(json!({"error": {"code": "protectedpage", "info": "protected"}}));
        transport.push_text(200, "see [[old]]");
        transport.push_json(json!({"edit": {"result": "Success"}}));
        transport.push_text(200, "no links here");

        let rewrite = LinkRewrite::new("Old", "New").expect("rewrite");
        let mut client = modern(&transport);
        let report =
            replace_links(&mut client, None, &rewrite, Some("relink"), 500).expect("report");

        assert_eq!(report.processed, 3);
        assert_eq!(report.mutated, 1);
        assert_eq!(report.protected(), 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(transport.pending(), 0);

        let requests = transport.requests();
        assert_eq!(requests[0].param("bltitle"), Some("Old"));
        assert_eq!(requests[3].param("text"), Some("[[New|Label]] and [[New|Old]]"));
        assert_eq!(requests[5].param("text"), Some("see [[New|old]]"));
    }

    #[test]
    fn interwiki_clone_adds_new_link_after_last_old_one() {
        let clone = InterwikiClone::new("en", "fr").expect("clone");
        assert_eq!(
            clone.apply("Text\n[[de:Karte]]\n[[en:Map]]\nfooter"),
            CloneOutcome::Rewritten("Text\n[[de:Karte]]\n[[en:Map]]\n[[fr:Map]]\nfooter".to_string())
        );
        assert_eq!(clone.apply("[[en:Map]]\n[[fr:Carte]]"), CloneOutcome::AlreadyPresent);
        assert_eq!(clone.apply("plain text"), CloneOutcome::NoSource);
    }

    #[test]
    fn clone_interwikis_searches_every_namespace() {
        let transport = MockTransport::default();
        transport.push_json(json!({"query": {"namespaces": {"0": {}, "14": {}}}}));
        transport.push_json(json!({"query": {"search": [{"title": "Map"}, {"title": "Done"}]}}));
        transport.push_text(200, "[[en:Map]]");
        transport.push_json(csrf("c1"));
        transport.push_json(json!({"edit": {"result": "Success"}}));
        transport.push_text(200, "[[en:Done]]\n[[fr:Fait]]");
        transport.push_json(json!({"query": {"search": [{"title": "Category:Stub"}]}}));
        transport.push_text(200, "no interwikis");

        let clone = InterwikiClone::new("en", "fr").expect("clone");
        let mut client = modern(&transport);
        let report = clone_interwikis(&mut client, None, &clone, Some("Mass interwiki fix"), 500)
            .expect("report");

        assert_eq!(report.processed, 3);
        assert_eq!(report.mutated, 1);
        assert_eq!(report.already_done, 1);
        assert_eq!(report.unchanged, 1);

        let requests = transport.requests();
        assert_eq!(requests[1].param("srsearch"), Some("en"));
        assert_eq!(requests[1].param("srnamespace"), Some("0"));
        assert_eq!(requests[4].param("text"), Some("[[en:Map]]\n[[fr:Map]]"));
        assert_eq!(requests[6].param("srnamespace"), Some("14"));
    }
}
