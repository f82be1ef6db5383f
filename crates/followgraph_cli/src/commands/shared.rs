use std::path::Path;

use followgraph::remote::{CredentialPool, HttpGraphApi, RemoteClient};
use followgraph::sync::EventCallback;
use followgraph::{Error, db};
use sea_orm::DatabaseConnection;

use crate::config::Config;

/// Ensure the directory of a `sqlite://` database file exists.
pub(crate) fn prepare_sqlite_path(database_url: &str) -> Result<(), Error> {
    let Some(db_path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    // Strip query parameters (e.g., ?mode=rwc) before path operations
    let db_path = db_path.split('?').next().unwrap_or(db_path);
    let db_path = Path::new(db_path);

    if db_path.is_relative() && !db_path.as_os_str().is_empty() {
        tracing::warn!(
            "Database path '{}' is relative - behavior depends on current directory. \
             Consider using an absolute path.",
            db_path.display()
        );
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::config(format!("cannot create database directory {}: {e}", parent.display()))
        })?;
    }
    Ok(())
}

pub(crate) async fn connect(database_url: &str) -> Result<DatabaseConnection, Error> {
    Ok(db::connect(database_url).await?)
}

/// Build a remote client from the configured credentials.
///
/// Returns `None` when no credentials are configured; jobs that need the
/// remote service then fail with a remote error.
pub(crate) fn remote_client(
    config: &Config,
    on_event: &EventCallback,
) -> Result<Option<RemoteClient<HttpGraphApi>>, Error> {
    if config.credentials.is_empty() {
        tracing::debug!("No credentials configured");
        return Ok(None);
    }

    let api = HttpGraphApi::new(&config.api.base_url, config.timeout())
        .map_err(|e| Error::config(format!("invalid api settings: {e}")))?;
    let pool = CredentialPool::new(api, config.credentials.clone())?
        .with_config(config.pool_config())
        .with_events(on_event.clone());
    tracing::debug!(credentials = pool.len(), base_url = %config.api.base_url, "Remote client ready");
    Ok(Some(RemoteClient::new(pool)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn non_sqlite_urls_are_left_alone() {
        assert!(prepare_sqlite_path("postgres://localhost/graph").is_ok());
        assert!(prepare_sqlite_path("sqlite::memory:").is_ok());
    }

    #[test]
    fn sqlite_parent_directory_is_created() {
        let dir = std::env::temp_dir().join(format!("followgraph-cli-{}", std::process::id()));
        let url = format!("sqlite://{}/nested/graph.db?mode=rwc", dir.display());

        prepare_sqlite_path(&url).unwrap();
        assert!(dir.join("nested").is_dir());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn no_credentials_means_no_client() {
        let on_event: EventCallback = Arc::new(|_| {});
        let client = remote_client(&Config::default(), &on_event).unwrap();
        assert!(client.is_none());
    }

    #[test]
    fn credentials_build_a_client() {
        let config = Config {
            credentials: vec![followgraph::remote::Credential::new("a", "k", "s")],
            ..Config::default()
        };
        let on_event: EventCallback = Arc::new(|_| {});
        let client = remote_client(&config, &on_event).unwrap().unwrap();
        assert_eq!(client.pool().len(), 1);
    }
}
