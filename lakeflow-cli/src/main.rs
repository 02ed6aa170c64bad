//! `lakeflow` command line client.
//!
//! Subcommands map one to one onto [`commands::Client`] methods; logging
//! goes to stderr so command output stays pipeable.

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// Lakeflow - branching table catalog and pipeline runner
#[derive(Parser)]
#[command(name = "lakeflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Home directory holding the catalog and client state
    #[arg(long, global = true, env = "LAKEFLOW_HOME")]
    home: Option<PathBuf>,

    /// Author recorded on commits
    #[arg(long, global = true, env = "LAKEFLOW_AUTHOR")]
    author: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, delete, list or check out branches
    #[command(subcommand)]
    Branch(BranchCommand),

    /// Create, delete or list tags
    #[command(subcommand)]
    Tag(TagCommand),

    /// Declare or list project parameters
    #[command(subcommand)]
    Parameter(ParameterCommand),

    /// Run a project pipeline
    Run {
        /// Project directory
        #[arg(long, default_value = ".")]
        project: PathBuf,

        /// Target branch (default: the checked-out branch)
        #[arg(long = "ref")]
        reference: Option<String>,

        /// Parameter override, as name=value
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,

        /// Leave the run branch unpromoted
        #[arg(long)]
        detach: bool,
    },

    /// Promote a detached run branch
    Promote {
        /// The run branch
        #[arg(long)]
        run_branch: String,

        /// Branch to merge into
        #[arg(long)]
        into: String,
    },

    /// Import, inspect, delete or revert tables
    #[command(subcommand)]
    Table(TableCommand),

    /// Show commit history
    Commits {
        /// Branch, tag or @commit (default: the checked-out branch)
        #[arg(long = "ref")]
        reference: Option<String>,

        /// Only commits by this author
        #[arg(long = "by")]
        by_author: Option<String>,

        /// Maximum number of commits
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Run an ad hoc SQL query
    Query {
        /// The query
        sql: String,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// Show a table as a dashboard
    Show {
        /// Table to show
        #[arg(long)]
        table: String,

        /// Bar chart of label:value columns
        #[arg(long)]
        chart: Option<String>,

        /// Bar width of the chart
        #[arg(long, default_value_t = 40)]
        width: usize,

        #[command(flatten)]
        view: ViewArgs,
    },
}

#[derive(Args)]
struct ViewArgs {
    /// Branch, tag or @commit (default: the checked-out branch)
    #[arg(long = "ref")]
    reference: Option<String>,

    /// Maximum rows to print
    #[arg(long, default_value_t = 20)]
    rows: usize,
}

#[derive(Subcommand)]
enum BranchCommand {
    /// Create a branch
    Create {
        name: String,
        /// Ref to branch from (default: the checked-out branch)
        #[arg(long)]
        from: Option<String>,
    },
    /// Delete a branch
    Delete { name: String },
    /// List branches
    List,
    /// Make a branch the default for other commands
    Checkout { name: String },
}

#[derive(Subcommand)]
enum TagCommand {
    /// Tag a commit
    Create {
        name: String,
        /// Ref to tag (default: the checked-out branch)
        #[arg(long = "ref")]
        reference: Option<String>,
    },
    /// Delete a tag
    Delete { name: String },
    /// List tags
    List,
}

#[derive(Subcommand)]
enum ParameterCommand {
    /// Declare a parameter or change its default
    Set {
        #[arg(long)]
        name: String,
        #[arg(long)]
        value: String,
        /// Store as a secret; never printed
        #[arg(long)]
        secret: bool,
        /// Project directory
        #[arg(long, default_value = ".")]
        project: PathBuf,
    },
    /// List declared parameters
    List {
        /// Project directory
        #[arg(long, default_value = ".")]
        project: PathBuf,
    },
}

#[derive(Subcommand)]
enum TableCommand {
    /// Import a JSON or NDJSON file
    Import {
        name: String,
        /// File to read
        #[arg(long)]
        file: PathBuf,
        /// Branch to commit to (default: the checked-out branch)
        #[arg(long = "ref")]
        reference: Option<String>,
        /// Append to the existing table instead of replacing it
        #[arg(long)]
        append: bool,
    },
    /// List tables
    List {
        /// Branch, tag or @commit (default: the checked-out branch)
        #[arg(long = "ref")]
        reference: Option<String>,
    },
    /// Print a table
    Show {
        name: String,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Delete a table
    Delete {
        name: String,
        /// Branch to commit to (default: the checked-out branch)
        #[arg(long = "ref")]
        reference: Option<String>,
    },
    /// Restore a table from an earlier ref
    Revert {
        name: String,
        /// Ref holding the version to restore
        #[arg(long)]
        from: String,
        /// Branch to restore onto (default: the checked-out branch)
        #[arg(long)]
        into: Option<String>,
        /// Overwrite the table if it exists
        #[arg(long)]
        replace: bool,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))
}

fn init_tracing(verbose: u8, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow!("installing log subscriber: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format)?;

    let client = commands::Client::open(cli.home, cli.author)?;
    match cli.command {
        Commands::Branch(command) => match command {
            BranchCommand::Create { name, from } => client.branch_create(&name, from),
            BranchCommand::Delete { name } => client.branch_delete(&name),
            BranchCommand::List => client.branch_list(),
            BranchCommand::Checkout { name } => client.branch_checkout(&name),
        },
        Commands::Tag(command) => match command {
            TagCommand::Create { name, reference } => client.tag_create(&name, reference),
            TagCommand::Delete { name } => client.tag_delete(&name),
            TagCommand::List => client.tag_list(),
        },
        Commands::Parameter(command) => match command {
            ParameterCommand::Set {
                name,
                value,
                secret,
                project,
            } => commands::parameter_set(&project, &name, &value, secret),
            ParameterCommand::List { project } => commands::parameter_list(&project),
        },
        Commands::Run {
            project,
            reference,
            params,
            detach,
        } => client.run(&project, reference, &params, detach).await,
        Commands::Promote { run_branch, into } => client.promote(&run_branch, &into),
        Commands::Table(command) => match command {
            TableCommand::Import {
                name,
                file,
                reference,
                append,
            } => client.table_import(&name, &file, reference, append),
            TableCommand::List { reference } => client.table_list(reference),
            TableCommand::Show { name, view } => client.table_show(&name, view.reference, view.rows),
            TableCommand::Delete { name, reference } => client.table_delete(&name, reference),
            TableCommand::Revert {
                name,
                from,
                into,
                replace,
            } => client.table_revert(&name, &from, into, replace),
        },
        Commands::Commits {
            reference,
            by_author,
            limit,
        } => client.commits(reference, by_author, limit),
        Commands::Query { sql, view } => client.query(&sql, view.reference, view.rows),
        Commands::Show {
            table,
            chart,
            width,
            view,
        } => client.show(&table, view.reference, chart.as_deref(), width, view.rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_tracing_installs_once() {
        assert!(init_tracing(1, LogFormat::Text).is_ok());
        assert!(init_tracing(1, LogFormat::Json).is_err());
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(parse_key_value("run_id=7").unwrap(), ("run_id".to_string(), "7".to_string()));
        assert_eq!(parse_key_value("q=a=b").unwrap().1, "a=b");
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=1").is_err());
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "lakeflow", "run", "--ref", "dev", "--param", "run_id=2", "--param", "region=eu", "--detach",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                reference,
                params,
                detach,
                ..
            } => {
                assert_eq!(reference.as_deref(), Some("dev"));
                assert_eq!(params.len(), 2);
                assert!(detach);
            }
            _ => panic!("expected run"),
        }
    }
}
