//! Followgraph CLI - command-line interface for follow-edge history.

mod commands;
mod config;
mod progress;

use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use followgraph::job::ResolveOptions;
use followgraph::resolve::{ListRef, ResolveMode, Target, TargetSpec};
use followgraph::sync::SyncOptions;
use followgraph::{Direction, Error};
use tracing_subscriber::EnvFilter;

use crate::config::SyncConfig;

#[derive(Parser)]
#[command(name = "followgraph")]
#[command(version)]
#[command(about = "Record who follows whom, and since when")]
#[command(
    long_about = "Followgraph fetches the followers or friends of selected users through a pool \
of rate-limited API credentials and keeps a local history of every follow edge, including \
when it was first and last observed."
)]
#[command(after_long_help = r#"EXAMPLES
    Create the database schema:
        $ followgraph migrate up

    Sync the friends of two accounts, fetching profiles that are not stored yet:
        $ followgraph fetch friends --screen-names jack,biz

    Sync followers of everyone tagged "press", tolerating duplicate ids:
        $ followgraph fetch followers --select-tags press --mode skip --robust

    Tag the members of a list:
        $ followgraph tag create press
        $ followgraph tag apply press --lists nytimes/staff

CONFIGURATION
    Followgraph reads configuration from:
      1. ~/.config/followgraph/config.toml (or $XDG_CONFIG_HOME/followgraph/config.toml)
      2. ./followgraph.toml
      3. Environment variables (FOLLOWGRAPH_* prefix, `__` between nested keys)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    FOLLOWGRAPH_DATABASE__URL     Database connection string (default: ~/.local/state/followgraph/followgraph.db)
    FOLLOWGRAPH_API__BASE_URL     Remote API root
    RUST_LOG                      Log filter (default: followgraph=info,followgraph_cli=info)

EXIT CODES
    1  other error            5  unknown tag
    2  configuration          6  duplicate edge rows
    3  missing target         7  remote service
    4  bad target             8  database
"#)]
struct Cli {
    /// Log more detail (debug level)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Fetch users or follow edges from the remote service
    Fetch {
        #[command(subcommand)]
        action: FetchAction,
    },
    /// Manage local user tags
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

#[derive(Subcommand)]
enum FetchAction {
    /// Look up targets again and store fresh profiles
    Users {
        #[command(flatten)]
        targets: TargetArgs,
    },
    /// Sync the accounts following each target
    Followers {
        #[command(flatten)]
        targets: TargetArgs,

        #[command(flatten)]
        sync_opts: SyncArgs,
    },
    /// Sync the accounts each target follows
    Friends {
        #[command(flatten)]
        targets: TargetArgs,

        #[command(flatten)]
        sync_opts: SyncArgs,
    },
}

#[derive(Subcommand)]
enum TagAction {
    /// Create an empty tag
    Create {
        name: String,
    },
    /// Delete a tag and remove it from every user
    Delete {
        name: String,
    },
    /// Tag every resolved target
    Apply {
        name: String,

        #[command(flatten)]
        targets: TargetArgs,
    },
}

/// Which users to operate on, and how to resolve them.
#[derive(Debug, Clone, clap::Args)]
struct TargetArgs {
    /// Numeric user ids (comma separated or repeated)
    #[arg(long, value_delimiter = ',')]
    user_ids: Vec<i64>,

    /// Screen names, without the leading @
    #[arg(long, value_delimiter = ',')]
    screen_names: Vec<String>,

    /// Names of stored tags
    #[arg(long, value_delimiter = ',')]
    select_tags: Vec<String>,

    /// Remote lists as owner/slug
    #[arg(long, value_delimiter = ',')]
    lists: Vec<ListRef>,

    /// How to handle targets that are not stored yet (fetch, rehydrate, skip, raise)
    #[arg(short, long, default_value_t = ResolveMode::Fetch)]
    mode: ResolveMode,

    /// Continue when targets are absent locally in skip mode
    #[arg(long)]
    allow_missing_targets: bool,

    /// Continue when the service does not know a target
    #[arg(long)]
    allow_api_errors: bool,
}

impl TargetArgs {
    fn targets(&self) -> Result<Vec<Target>, Error> {
        let specs = [
            TargetSpec::UserIds(self.user_ids.clone()),
            TargetSpec::ScreenNames(self.screen_names.clone()),
            TargetSpec::Tags(self.select_tags.clone()),
            TargetSpec::Lists(self.lists.clone()),
        ];
        let targets: Vec<Target> = specs
            .into_iter()
            .filter(|spec| !spec.is_empty())
            .map(|spec| Target::new(spec, self.mode))
            .collect();
        if targets.is_empty() {
            return Err(Error::config(
                "no targets given (use --user-ids, --screen-names, --select-tags or --lists)",
            ));
        }
        Ok(targets)
    }

    fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            allow_missing_targets: self.allow_missing_targets,
            allow_api_errors: self.allow_api_errors,
        }
    }
}

/// Edge sync options; unset flags fall back to the `[sync]` config table.
#[derive(Debug, Clone, clap::Args)]
struct SyncArgs {
    /// Drop duplicate ids row by row instead of failing
    #[arg(short, long)]
    robust: bool,

    /// Stage fetched ids in chunks of this many rows
    #[arg(short, long)]
    batch_size: Option<usize>,
}

impl SyncArgs {
    fn options(&self, direction: Direction, config: &SyncConfig) -> SyncOptions {
        SyncOptions {
            robust: self.robust || config.robust,
            batch_size: self.batch_size.or(config.batch_size),
            ..SyncOptions::new(direction)
        }
    }
}

fn init_tracing(verbose: u8) {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose > 0 => EnvFilter::new("followgraph=debug,followgraph_cli=debug"),
        Err(_) => EnvFilter::new("followgraph=info,followgraph_cli=info"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    // Handle commands that don't require configuration first
    if let Commands::Completions { shell } = &cli.command {
        return commands::meta::handle_completions(*shell);
    }

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load().map_err(|e| Error::config(e.to_string()))?;
    let database_url = config
        .database_url()
        .ok_or_else(|| Error::config("could not determine a database URL; set database.url"))?;
    commands::shared::prepare_sqlite_path(&database_url)?;

    match cli.command {
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await
        }
        Commands::Fetch { action } => {
            commands::fetch::handle_fetch(action, &config, &database_url).await
        }
        Commands::Tag { action } => commands::tag::handle_tag(action, &config, &database_url).await,
        Commands::Completions { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn target_flags_become_one_target_per_kind() {
        let cli = Cli::try_parse_from([
            "followgraph",
            "fetch",
            "friends",
            "--user-ids",
            "1,2",
            "--lists",
            "@owner/slug",
            "--mode",
            "raise",
        ])
        .unwrap();
        let Commands::Fetch {
            action: FetchAction::Friends { targets, .. },
        } = cli.command
        else {
            panic!("expected fetch friends");
        };

        let targets = targets.targets().unwrap();
        assert_eq!(
            targets,
            vec![
                Target::new(TargetSpec::UserIds(vec![1, 2]), ResolveMode::Raise),
                Target::new(
                    TargetSpec::Lists(vec![ListRef::new("owner", "slug")]),
                    ResolveMode::Raise
                ),
            ]
        );
    }

    #[test]
    fn missing_targets_is_a_config_error() {
        let cli = Cli::try_parse_from(["followgraph", "fetch", "users"]).unwrap();
        let Commands::Fetch {
            action: FetchAction::Users { targets },
        } = cli.command
        else {
            panic!("expected fetch users");
        };
        let err = targets.targets().unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn bad_list_reference_is_rejected_by_parser() {
        let result = Cli::try_parse_from(["followgraph", "tag", "apply", "t", "--lists", "noslash"]);
        assert!(result.is_err());
    }

    #[test]
    fn sync_flags_override_config() {
        let args = SyncArgs {
            robust: false,
            batch_size: Some(10),
        };
        let config = SyncConfig {
            batch_size: Some(500),
            robust: true,
        };
        let options = args.options(Direction::Followers, &config);
        assert_eq!(options.direction, Direction::Followers);
        assert!(options.robust);
        assert_eq!(options.batch_size, Some(10));
    }

    #[test]
    fn edge_sync_has_no_item_cap() {
        let result = Cli::try_parse_from([
            "followgraph",
            "fetch",
            "friends",
            "--user-ids",
            "1",
            "--max-items",
            "2",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn verbose_flag_is_global() {
        let cli = Cli::try_parse_from(["followgraph", "migrate", "status", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
