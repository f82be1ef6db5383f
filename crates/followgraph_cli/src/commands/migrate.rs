use followgraph::Error;
use followgraph::migration::{Migrator, MigratorTrait};

use crate::MigrateAction;
use crate::commands::shared;

pub(crate) async fn handle_migrate(action: MigrateAction, database_url: &str) -> Result<(), Error> {
    let db = shared::connect(database_url).await?;

    match action {
        MigrateAction::Up => {
            tracing::info!("Applying migrations");
            Migrator::up(&db, None).await?;
            println!("Migrations applied successfully.");
        }
        MigrateAction::Down => {
            tracing::info!("Rolling back last migration");
            Migrator::down(&db, Some(1)).await?;
            println!("Rollback complete.");
        }
        MigrateAction::Status => {
            println!("Migration status:");
            Migrator::status(&db).await?;
        }
        MigrateAction::Fresh => {
            tracing::warn!("Dropping all tables and reapplying migrations");
            Migrator::fresh(&db).await?;
            println!("Fresh migration complete.");
        }
    }

    Ok(())
}
