use std::sync::Arc;

use followgraph::job::{self, JobContext};
use followgraph::remote::HttpGraphApi;
use followgraph::{Direction, Error};

use crate::commands::shared;
use crate::config::Config;
use crate::progress::LoggingReporter;
use crate::{FetchAction, SyncArgs, TargetArgs};

pub(crate) async fn handle_fetch(
    action: FetchAction,
    config: &Config,
    database_url: &str,
) -> Result<(), Error> {
    let db = shared::connect(database_url).await?;
    let reporter = Arc::new(LoggingReporter::new());
    let on_event = reporter.as_callback();
    let client = shared::remote_client(config, &on_event)?;
    let ctx = JobContext::new(&db, client.as_ref()).with_events(Some(&on_event));

    match action {
        FetchAction::Users { targets } => fetch_users(&ctx, &targets).await,
        FetchAction::Followers { targets, sync_opts } => {
            sync_edges(&ctx, config, Direction::Followers, &targets, &sync_opts).await
        }
        FetchAction::Friends { targets, sync_opts } => {
            sync_edges(&ctx, config, Direction::Friends, &targets, &sync_opts).await
        }
    }
}

async fn fetch_users(ctx: &JobContext<'_, HttpGraphApi>, args: &TargetArgs) -> Result<(), Error> {
    let resolution = job::user_info(ctx, &args.targets()?, &args.resolve_options()).await?;

    println!("Stored {} user profiles.", resolution.users.len());
    for target in &resolution.bad {
        println!("  unknown to the service: {target}");
    }
    for target in &resolution.missing {
        println!("  not stored: {target}");
    }
    Ok(())
}

async fn sync_edges(
    ctx: &JobContext<'_, HttpGraphApi>,
    config: &Config,
    direction: Direction,
    args: &TargetArgs,
    sync_args: &SyncArgs,
) -> Result<(), Error> {
    let options = sync_args.options(direction, &config.sync);
    let report =
        job::follow_graph(ctx, &args.targets()?, &args.resolve_options(), options).await?;

    println!(
        "Synced {} of {} users ({}): {} edges opened, {} closed, {} new users.",
        report.users_processed,
        report.users_processed + report.users_skipped,
        direction,
        report.edges_inserted,
        report.edges_closed,
        report.users_inserted,
    );
    if report.duplicates_discarded > 0 {
        println!("Discarded {} duplicate ids.", report.duplicates_discarded);
    }
    if !report.has_changes() {
        println!("No changes.");
    }
    Ok(())
}
