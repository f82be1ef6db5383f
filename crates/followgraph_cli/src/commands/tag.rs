use std::sync::Arc;

use followgraph::Error;
use followgraph::job::{self, JobContext};

use crate::TagAction;
use crate::commands::shared;
use crate::config::Config;
use crate::progress::LoggingReporter;

pub(crate) async fn handle_tag(
    action: TagAction,
    config: &Config,
    database_url: &str,
) -> Result<(), Error> {
    let db = shared::connect(database_url).await?;

    match action {
        TagAction::Create { name } => {
            let tag = job::create_tag(&db, &name).await?;
            println!("Created tag '{}' ({}).", tag.name, tag.tag_id);
        }
        TagAction::Delete { name } => {
            let removed = job::delete_tag(&db, &name).await?;
            println!("Deleted tag '{name}' from {removed} users.");
        }
        TagAction::Apply { name, targets } => {
            let reporter = Arc::new(LoggingReporter::new());
            let on_event = reporter.as_callback();
            // Stored targets resolve without credentials.
            let client = shared::remote_client(config, &on_event)?;
            let ctx = JobContext::new(&db, client.as_ref()).with_events(Some(&on_event));

            let report =
                job::apply_tag(&ctx, &name, &targets.targets()?, &targets.resolve_options()).await?;
            println!(
                "Tagged {} users with '{}' ({} new).",
                report.resolved, report.tag, report.newly_tagged
            );
        }
    }

    Ok(())
}
