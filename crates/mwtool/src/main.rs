mod config;
mod files;

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use mwtool_core::bulk::{
    self, BulkReport, BulkResult, FailureReason, InterwikiClone, LinkRewrite, PageSelection,
};
use mwtool_core::client::{ContributionsQuery, MemberType, NAMESPACE_FILE, RedirectFilter, Upload};
use mwtool_core::config::DEFAULT_IMAGE_IDS_LIMIT;
use mwtool_core::{Credentials, WikiClient, connect};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::{DEFAULT_CONFIG_PATH, Overrides, env_value, load_config, resolve_credentials};
use crate::files::JsonChunkWriter;

#[derive(Debug, Parser)]
#[command(
    name = "mwtool",
    version,
    about = "Bulk listing and maintenance client for MediaWiki 1.19 and 1.31 wikis"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "URL", help = "Wiki base URL or its api.php URL")]
    url: Option<String>,
    #[arg(long, global = true, value_name = "VERSION", help = "MediaWiki version: 1.19 or 1.31")]
    mediawiki_version: Option<String>,
    #[arg(long, global = true, value_name = "AGENT")]
    user_agent: Option<String>,
    #[arg(long, global = true, value_name = "MS", help = "Minimum delay between requests")]
    request_interval_ms: Option<u64>,
    #[arg(long, global = true, value_name = "N", help = "Maximum number of entries per API request")]
    api_limit: Option<u32>,
    #[arg(long, global = true, value_name = "USER:SECRET", help = "Login pair (or MEDIAWIKI_CREDENTIALS)")]
    credentials: Option<String>,
    #[arg(long, global = true, help = "Log in even for commands that do not require it")]
    login: bool,
    #[arg(long, global = true, help = "Print results as JSON")]
    json: bool,
    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "More log output (-vv for trace)")]
    verbose: u8,
    #[arg(short, long, global = true, help = "Only log errors")]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List non-negative namespace IDs.
    ListNamespaces,
    /// List page titles of every namespace.
    ListPages(OutputArgs),
    /// List page titles of one namespace.
    ListNamespacePages(ListNamespacePagesArgs),
    /// List all images (titles and URLs).
    ListImages(OutputArgs),
    /// List images of a category (titles and URLs).
    ListCategoryImages(ListCategoryImagesArgs),
    ListCategoryMembers(ListCategoryMembersArgs),
    /// Dump deleted revisions as JSON files.
    #[command(name = "list-deletedrevs")]
    ListDeletedRevs(ListDeletedRevsArgs),
    ListUserContribs(ListUserContribsArgs),
    Search(SearchArgs),
    /// Print the raw wikitext of a page.
    ReadPage(ReadPageArgs),
    /// Delete pages whose titles match an expression.
    DeletePages(DeletePagesArgs),
    /// Replace the text of pages whose titles match an expression.
    EditPages(EditPagesArgs),
    /// Add interwiki NEW to pages that have interwiki OLD but not NEW.
    EditPagesCloneInterwikis(CloneInterwikisArgs),
    /// Point links to page OLD at page NEW.
    ReplaceLinks(ReplaceLinksArgs),
    UploadImage(UploadImageArgs),
}

#[derive(Debug, Args)]
struct OutputArgs {
    #[arg(long, value_name = "PATH", help = "Write to a file instead of stdout")]
    output_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ListNamespacePagesArgs {
    namespace: i32,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Args)]
struct ListCategoryImagesArgs {
    category: String,
    #[arg(long, default_value_t = DEFAULT_IMAGE_IDS_LIMIT, help = "Page IDs passed per API request")]
    api_image_ids_limit: usize,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MemberTypeArg {
    Page,
    Subcat,
    File,
}

impl From<MemberTypeArg> for MemberType {
    fn from(value: MemberTypeArg) -> Self {
        match value {
            MemberTypeArg::Page => Self::Page,
            MemberTypeArg::Subcat => Self::Subcat,
            MemberTypeArg::File => Self::File,
        }
    }
}

#[derive(Debug, Args)]
struct ListCategoryMembersArgs {
    category: String,
    #[arg(long)]
    namespace: Option<i32>,
    #[arg(long, value_enum)]
    member_type: Option<MemberTypeArg>,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Args)]
struct ListDeletedRevsArgs {
    output_directory: PathBuf,
    #[arg(long, help = "All namespaces instead of the main namespace only")]
    all_namespaces: bool,
    #[arg(long, default_value_t = 500, help = "Entries per JSON file")]
    file_entry_num: usize,
}

#[derive(Debug, Args)]
struct ListUserContribsArgs {
    user: String,
    #[arg(long, default_value_t = 0)]
    namespace: i32,
    #[arg(long, value_name = "RFC3339")]
    start: Option<DateTime<Utc>>,
    #[arg(long, value_name = "RFC3339")]
    end: Option<DateTime<Utc>>,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Args)]
struct SearchArgs {
    query: String,
    #[arg(long, default_value_t = 0)]
    namespace: i32,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Args)]
struct ReadPageArgs {
    title: String,
}

#[derive(Debug, Args)]
struct SelectionArgs {
    /// Titles must match this expression at their start.
    filter_expression: String,
    #[arg(long, help = "Skip titles matching this expression")]
    exclude_expression: Option<String>,
    #[arg(long, help = "Resume from this title")]
    first_page: Option<String>,
    #[arg(long, help = "Namespace of --first-page")]
    first_page_namespace: Option<i32>,
    #[arg(long = "namespace", default_values_t = [0])]
    namespaces: Vec<i32>,
}

#[derive(Debug, Args)]
struct DeletePagesArgs {
    #[command(flatten)]
    selection: SelectionArgs,
    #[arg(long, default_value = "Mass deletion")]
    reason: String,
}

#[derive(Debug, Args)]
struct EditPagesArgs {
    #[command(flatten)]
    selection: SelectionArgs,
    new_text: String,
    #[arg(long, default_value = "Mass edit")]
    reason: String,
}

#[derive(Debug, Args)]
struct CloneInterwikisArgs {
    old: String,
    new: String,
    #[arg(long, default_value = "Mass interwiki fix")]
    reason: String,
}

#[derive(Debug, Args)]
struct ReplaceLinksArgs {
    old: String,
    new: String,
    #[arg(long, default_value = "Replacing links")]
    reason: String,
}

#[derive(Debug, Args)]
struct UploadImageArgs {
    file_name: String,
    file: PathBuf,
    #[arg(long, help = "Initial page text for the file page")]
    text: Option<String>,
    #[arg(long, help = "Fail on upload warnings instead of ignoring them")]
    strict: bool,
}

struct Runtime {
    client: Box<dyn WikiClient>,
    credentials: Option<Credentials>,
    api_limit: u32,
    json: bool,
}

impl Runtime {
    fn open(cli: &Cli) -> Result<Self> {
        dotenvy::dotenv().ok();
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        if let Some(env_path) = config_path.parent().map(|parent| parent.join(".env"))
            && env_path.exists()
        {
            let _ = dotenvy::from_path_override(&env_path);
        }

        let file_config = load_config(&config_path)?;
        let resolved = file_config.resolve(&Overrides {
            url: cli.url.clone(),
            api_version: cli.mediawiki_version.clone(),
            user_agent: cli.user_agent.clone(),
            request_interval_ms: cli.request_interval_ms,
            api_limit: cli.api_limit,
        })?;
        let credentials = resolve_credentials(cli.credentials.as_deref(), env_value)?;
        debug!(
            url = %resolved.client.base_url,
            version = %resolved.version,
            interval_ms = resolved.client.request_interval.as_millis() as u64,
            "resolved configuration"
        );

        let client = connect(&resolved.client, resolved.version)
            .context("failed to build HTTP client")?;
        debug!(protocol = %client.protocol(), "connected");
        Ok(Self {
            client,
            credentials,
            api_limit: resolved.api_limit,
            json: cli.json,
        })
    }

    fn required_credentials(&self) -> Result<&Credentials> {
        match &self.credentials {
            Some(credentials) => Ok(credentials),
            None => bail!("user credentials not given (use --credentials or MEDIAWIKI_CREDENTIALS)"),
        }
    }

    /// Reads are anonymous unless `--login` was given.
    fn login_for_read(&mut self, login: bool) -> Result<()> {
        if !login {
            return Ok(());
        }
        let credentials = self.required_credentials()?.clone();
        self.client.login(&credentials).context("login failed")
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let mut runtime = Runtime::open(&cli)?;
    let login = cli.login;
    let result = match cli.command {
        Commands::ListNamespaces => run_list_namespaces(&mut runtime, login),
        Commands::ListPages(args) => run_list_pages(&mut runtime, login, args),
        Commands::ListNamespacePages(args) => run_list_namespace_pages(&mut runtime, login, args),
        Commands::ListImages(args) => run_list_images(&mut runtime, login, args),
        Commands::ListCategoryImages(args) => run_list_category_images(&mut runtime, login, args),
        Commands::ListCategoryMembers(args) => run_list_category_members(&mut runtime, login, args),
        Commands::ListDeletedRevs(args) => run_list_deleted_revs(&mut runtime, args),
        Commands::ListUserContribs(args) => run_list_user_contribs(&mut runtime, login, args),
        Commands::Search(args) => run_search(&mut runtime, login, args),
        Commands::ReadPage(args) => run_read_page(&mut runtime, login, args),
        Commands::DeletePages(args) => run_delete_pages(&mut runtime, args),
        Commands::EditPages(args) => run_edit_pages(&mut runtime, args),
        Commands::EditPagesCloneInterwikis(args) => run_clone_interwikis(&mut runtime, args),
        Commands::ReplaceLinks(args) => run_replace_links(&mut runtime, args),
        Commands::UploadImage(args) => run_upload_image(&mut runtime, args),
    };
    debug!(requests = runtime.client.request_count(), "done");
    result
}

/// `RUST_LOG` wins; otherwise `-q` is error, default info, `-v` debug, `-vv` trace.
fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

fn write_item<T: Serialize>(
    out: &mut dyn Write,
    json: bool,
    item: &T,
    plain: impl FnOnce(&T) -> String,
) -> Result<()> {
    let line = if json {
        serde_json::to_string(item)?
    } else {
        plain(item)
    };
    writeln!(out, "{line}")?;
    Ok(())
}

fn run_list_namespaces(runtime: &mut Runtime, login: bool) -> Result<()> {
    runtime.login_for_read(login)?;
    let namespaces = runtime.client.list_namespaces()?;
    if runtime.json {
        println!("{}", serde_json::to_string(&namespaces)?);
    } else {
        for namespace in namespaces {
            println!("{namespace}");
        }
    }
    Ok(())
}

fn run_list_pages(runtime: &mut Runtime, login: bool, args: OutputArgs) -> Result<()> {
    runtime.login_for_read(login)?;
    let mut out = open_output(args.output_file.as_deref())?;
    let api_limit = runtime.api_limit;
    let json = runtime.json;
    for namespace in runtime.client.list_namespaces()? {
        for title in runtime
            .client
            .list_pages(namespace, api_limit, None, RedirectFilter::All)
        {
            write_item(&mut *out, json, &title?, String::clone)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn run_list_namespace_pages(
    runtime: &mut Runtime,
    login: bool,
    args: ListNamespacePagesArgs,
) -> Result<()> {
    runtime.login_for_read(login)?;
    let mut out = open_output(args.output.output_file.as_deref())?;
    let json = runtime.json;
    let api_limit = runtime.api_limit;
    for title in runtime
        .client
        .list_pages(args.namespace, api_limit, None, RedirectFilter::All)
    {
        write_item(&mut *out, json, &title?, String::clone)?;
    }
    out.flush()?;
    Ok(())
}

fn run_list_images(runtime: &mut Runtime, login: bool, args: OutputArgs) -> Result<()> {
    runtime.login_for_read(login)?;
    let mut out = open_output(args.output_file.as_deref())?;
    let json = runtime.json;
    let api_limit = runtime.api_limit;
    for image in runtime.client.list_images(api_limit) {
        write_item(&mut *out, json, &image?, |image| {
            format!("{}\t{}", image.title, image.url)
        })?;
    }
    out.flush()?;
    Ok(())
}

fn run_list_category_images(
    runtime: &mut Runtime,
    login: bool,
    args: ListCategoryImagesArgs,
) -> Result<()> {
    runtime.login_for_read(login)?;
    let api_limit = runtime.api_limit;
    let json = runtime.json;
    let page_ids = runtime
        .client
        .get_category_members(
            &args.category,
            api_limit,
            Some(NAMESPACE_FILE),
            Some(MemberType::File),
        )
        .map(|member| member.map(|member| member.pageid))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .collect::<Vec<i64>>();
    info!(category = %args.category, files = page_ids.len(), "collected category files");

    let mut out = open_output(args.output.output_file.as_deref())?;
    for image in runtime
        .client
        .list_images_for_pages(args.api_image_ids_limit, &page_ids)
    {
        write_item(&mut *out, json, &image?, |image| {
            format!("{}\t{}", image.title, image.url)
        })?;
    }
    out.flush()?;
    Ok(())
}

fn run_list_category_members(
    runtime: &mut Runtime,
    login: bool,
    args: ListCategoryMembersArgs,
) -> Result<()> {
    runtime.login_for_read(login)?;
    let mut out = open_output(args.output.output_file.as_deref())?;
    let json = runtime.json;
    let api_limit = runtime.api_limit;
    for member in runtime.client.get_category_members(
        &args.category,
        api_limit,
        args.namespace,
        args.member_type.map(MemberType::from),
    ) {
        write_item(&mut *out, json, &member?, |member| member.title.clone())?;
    }
    out.flush()?;
    Ok(())
}

fn run_list_deleted_revs(runtime: &mut Runtime, args: ListDeletedRevsArgs) -> Result<()> {
    let credentials = runtime.required_credentials()?.clone();
    runtime.client.login(&credentials).context("login failed")?;

    let namespaces: Vec<i32> = if args.all_namespaces {
        runtime.client.list_namespaces()?.into_iter().collect()
    } else {
        vec![0]
    };

    let api_limit = runtime.api_limit;
    let mut writer = JsonChunkWriter::create(&args.output_directory, args.file_entry_num)?;
    for namespace in namespaces {
        for revision in runtime.client.get_deleted_revisions(namespace, api_limit) {
            writer.push(revision?)?;
        }
    }
    let files = writer.finish()?;
    println!("files_written: {files}");
    println!("output_directory: {}", args.output_directory.display());
    Ok(())
}

fn run_list_user_contribs(
    runtime: &mut Runtime,
    login: bool,
    args: ListUserContribsArgs,
) -> Result<()> {
    runtime.login_for_read(login)?;
    let mut out = open_output(args.output.output_file.as_deref())?;
    let query = ContributionsQuery {
        user: args.user,
        namespace: args.namespace,
        limit: runtime.api_limit,
        start: args.start,
        end: args.end,
    };
    // Contribution records vary by server, so they are always JSON.
    for contribution in runtime.client.get_user_contributions(&query) {
        write_item(&mut *out, true, &contribution?, |_| String::new())?;
    }
    out.flush()?;
    Ok(())
}

fn run_search(runtime: &mut Runtime, login: bool, args: SearchArgs) -> Result<()> {
    runtime.login_for_read(login)?;
    let mut out = open_output(args.output.output_file.as_deref())?;
    let json = runtime.json;
    let api_limit = runtime.api_limit;
    for title in runtime
        .client
        .search_pages(&args.query, args.namespace, api_limit)
    {
        write_item(&mut *out, json, &title?, String::clone)?;
    }
    out.flush()?;
    Ok(())
}

fn run_read_page(runtime: &mut Runtime, login: bool, args: ReadPageArgs) -> Result<()> {
    runtime.login_for_read(login)?;
    let text = runtime
        .client
        .read_page(&args.title)
        .with_context(|| format!("failed to read {}", args.title))?;
    print!("{text}");
    Ok(())
}

fn selection(args: SelectionArgs, api_limit: u32) -> Result<PageSelection> {
    let selection = PageSelection::new(&args.filter_expression, args.namespaces, api_limit)
        .and_then(|selection| selection.with_exclude(args.exclude_expression.as_deref()))
        .context("invalid page expression")?;
    Ok(selection.resume_from(args.first_page, args.first_page_namespace))
}

fn run_delete_pages(runtime: &mut Runtime, args: DeletePagesArgs) -> Result<()> {
    let credentials = runtime.required_credentials()?.clone();
    let selection = selection(args.selection, runtime.api_limit)?;
    let result = bulk::mass_delete(
        runtime.client.as_mut(),
        Some(&credentials),
        &selection,
        Some(&args.reason),
    );
    finish_bulk(result, runtime.json)
}

fn run_edit_pages(runtime: &mut Runtime, args: EditPagesArgs) -> Result<()> {
    let credentials = runtime.required_credentials()?.clone();
    let selection = selection(args.selection, runtime.api_limit)?;
    let result = bulk::mass_edit(
        runtime.client.as_mut(),
        Some(&credentials),
        &selection,
        &args.new_text,
        Some(&args.reason),
    );
    finish_bulk(result, runtime.json)
}

fn run_clone_interwikis(runtime: &mut Runtime, args: CloneInterwikisArgs) -> Result<()> {
    let credentials = runtime.required_credentials()?.clone();
    let clone = InterwikiClone::new(&args.old, &args.new).context("invalid interwiki prefix")?;
    let result = bulk::clone_interwikis(
        runtime.client.as_mut(),
        Some(&credentials),
        &clone,
        Some(&args.reason),
        runtime.api_limit,
    );
    finish_bulk(result, runtime.json)
}

fn run_replace_links(runtime: &mut Runtime, args: ReplaceLinksArgs) -> Result<()> {
    let credentials = runtime.required_credentials()?.clone();
    let rewrite = LinkRewrite::new(&args.old, &args.new).context("invalid link title")?;
    let result = bulk::replace_links(
        runtime.client.as_mut(),
        Some(&credentials),
        &rewrite,
        Some(&args.reason),
        runtime.api_limit,
    );
    finish_bulk(result, runtime.json)
}

fn run_upload_image(runtime: &mut Runtime, args: UploadImageArgs) -> Result<()> {
    let credentials = runtime.required_credentials()?.clone();
    let content = fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    runtime.client.login(&credentials).context("login failed")?;
    runtime.client.upload_file(&Upload {
        file_name: args.file_name.clone(),
        content,
        mime_type: files::mime_type_for(&args.file).map(ToString::to_string),
        text: args.text,
        ignore_warnings: !args.strict,
    })?;
    println!("uploaded: {}", args.file_name);
    Ok(())
}

/// Print the tally, partial or not, then surface a fatal error.
fn finish_bulk(result: BulkResult, json: bool) -> Result<()> {
    match result {
        Ok(report) => print_report(&report, json),
        Err(aborted) => {
            print_report(&aborted.report, json)?;
            Err(aborted.into())
        }
    }
}

fn print_report(report: &BulkReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("{}", report.operation);
    println!("processed: {}", report.processed);
    println!("mutated: {}", report.mutated);
    println!("filtered_out: {}", report.filtered_out);
    println!("already_done: {}", report.already_done);
    println!("unchanged: {}", report.unchanged);
    println!("failed: {}", report.failed());
    println!("protected: {}", report.protected());
    if !report.failures.is_empty() {
        println!("failures:");
        for failure in &report.failures {
            match &failure.reason {
                FailureReason::CannotDelete(detail) => {
                    println!("  - {}: cannot delete ({detail})", failure.title)
                }
                FailureReason::Protected(detail) => {
                    println!("  - {}: protected ({detail})", failure.title)
                }
            }
        }
    }
    Ok(())
}
