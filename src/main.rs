mod config;
mod pr;
mod report;
mod run;
mod runtime;
mod store;
mod sync;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

use config::{Config, ConfigError, Settings};
use pr::{EventContext, GitHubClient};
use run::{RunError, RunOutcome};
use runtime::{ActionRuntime, GithubActionsRuntime};
use store::notion::DEFAULT_DATABASE_TITLE;
use store::{DryRunStore, NotionClient};

/// pr-notion-sync — keeps one Notion database record per GitHub Pull Request
/// up to date as the PR is opened, updated, closed, merged or drafted.
#[derive(Parser, Debug)]
#[command(name = "pr-notion-sync", version, about)]
struct Cli {
    /// Config file (defaults to .pr-notion-sync.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Append a markdown summary here instead of printing to the terminal
    #[arg(long, global = true, env = "GITHUB_STEP_SUMMARY")]
    summary: Option<PathBuf>,

    #[command(flatten)]
    sync: SyncArgs,

    /// Without a command, the current workflow event is synced.
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug)]
struct SyncArgs {
    /// Name of the triggering event
    #[arg(long, env = "GITHUB_EVENT_NAME")]
    event_name: Option<String>,

    /// JSON file holding the event payload
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    event_path: Option<PathBuf>,

    /// Look up the record but only log the write that would follow
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a PR from GitHub (e.g., https://github.com/org/repo/pull/42) and sync it
    Pull { pr_url: String },

    /// Check that the configured database is reachable and has the mapped columns
    Verify,

    /// Create a database whose columns match the field mapping
    InitDatabase {
        /// Page the database is created under
        #[arg(long)]
        parent_page: String,

        #[arg(long, default_value = DEFAULT_DATABASE_TITLE)]
        title: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = GithubActionsRuntime::from_env();

    let succeeded = match &cli.command {
        None => {
            let result = sync_from_event(&cli, &runtime)
                .instrument(info_span!("sync_event"))
                .await;
            conclude_sync(&cli, &runtime, result)
        }
        Some(Command::Pull { pr_url }) => {
            let result = sync_from_url(&cli, &runtime, pr_url)
                .instrument(info_span!("pull", pr_url = %pr_url))
                .await;
            conclude_sync(&cli, &runtime, result)
        }
        Some(Command::Verify) => conclude(&runtime, verify(&cli, &runtime).await),
        Some(Command::InitDatabase { parent_page, title }) => {
            conclude(&runtime, init_database(&cli, &runtime, parent_page, title).await)
        }
    };

    if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Load and validate settings, and mask the credentials before anything is logged.
fn load_settings(cli: &Cli, runtime: &dyn ActionRuntime) -> Result<Settings, RunError> {
    info!("loading configuration");
    let settings = Config::load(cli.config.as_deref())?.into_settings()?;
    runtime.mask(settings.notion_token.expose());
    runtime.mask(settings.github_token.expose());
    Ok(settings)
}

async fn sync_from_event(cli: &Cli, runtime: &dyn ActionRuntime) -> Result<RunOutcome, RunError> {
    let settings = load_settings(cli, runtime)?;

    let context = match (&cli.sync.event_name, &cli.sync.event_path) {
        (Some(name), Some(path)) => pr::load_event_context(name, path)?,
        (name, _) => EventContext {
            event_name: name.clone().unwrap_or_default(),
            payload: Default::default(),
        },
    };
    pr::log_pr_event(&context);

    let client = NotionClient::new(settings.notion_token.clone(), &settings.notion_api_url);
    if cli.sync.dry_run {
        run::sync_event(runtime, &DryRunStore::new(client), &settings, &context).await
    } else {
        run::sync_event(runtime, &client, &settings, &context).await
    }
}

async fn sync_from_url(cli: &Cli, runtime: &dyn ActionRuntime, pr_url: &str) -> Result<RunOutcome, RunError> {
    let settings = load_settings(cli, runtime)?;
    let parsed = pr::parse_pr_url(pr_url)?;

    info!("fetching pull request from GitHub");
    let github = GitHubClient::new(settings.github_token.clone(), &settings.github_api_url);
    let fact = pr::fetch_fact(&github, &parsed).await?;
    runtime.info(&format!("Processing PR #{}: {}", fact.number, fact.title));

    let client = NotionClient::new(settings.notion_token.clone(), &settings.notion_api_url);
    let outcome = if cli.sync.dry_run {
        let store = DryRunStore::new(client);
        run::sync_fact(runtime, &store, &settings.database_id, &settings.mapping, &fact).await?
    } else {
        run::sync_fact(runtime, &client, &settings.database_id, &settings.mapping, &fact).await?
    };
    Ok(RunOutcome::Synced { fact, outcome })
}

async fn verify(cli: &Cli, runtime: &dyn ActionRuntime) -> Result<(), RunError> {
    let settings = load_settings(cli, runtime)?;
    let client = NotionClient::new(settings.notion_token.clone(), &settings.notion_api_url);
    let info = client.verify_database_access(&settings.database_id).await?;
    run::report_database(runtime, &info, &settings.mapping);
    Ok(())
}

async fn init_database(
    cli: &Cli,
    runtime: &dyn ActionRuntime,
    parent_page: &str,
    title: &str,
) -> Result<(), RunError> {
    let config = Config::load(cli.config.as_deref())?;
    let token = config.notion_token()?;
    runtime.mask(token.expose());

    if !config::is_valid_notion_id(parent_page) {
        return Err(ConfigError::InvalidPageId(parent_page.to_string()).into());
    }
    let mapping = config.field_mapping();
    mapping.validate()?;

    let client = NotionClient::new(token, config.notion_api_url());
    let database_id = client.create_database(parent_page, title, &mapping).await?;
    runtime.info(&format!("Created Notion database: {database_id}"));
    runtime.set_output("notion-database-id", &database_id)?;
    Ok(())
}

/// Print the summary of a successful sync, then settle the run status.
fn conclude_sync(cli: &Cli, runtime: &dyn ActionRuntime, result: Result<RunOutcome, RunError>) -> bool {
    if let Ok(RunOutcome::Synced { fact, outcome }) = &result {
        let built_report = report::build(fact, outcome, cli.sync.dry_run);
        if let Err(err) = report::output(&built_report, cli.summary.as_deref()) {
            warn!(error = %err, "could not write sync summary");
        }
    }
    run::finish(runtime, result)
}

fn conclude(runtime: &dyn ActionRuntime, result: Result<(), RunError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => run::finish(runtime, Err(err)),
    }
}
