use anyhow::{Context, Result};
use tokio_postgres::NoTls;
use tracing::info;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("./migrations");
}

/// Tables created by the embedded migrations.
pub const TABLES: [&str; 5] = ["users", "documents", "chat_messages", "notes", "document_chunks"];

pub async fn run_migrations(database_url: &str) -> Result<()> {
    info!("Running database migrations...");

    let connect_result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        tokio_postgres::connect(database_url, NoTls),
    )
    .await
    .context("Database connection timed out")?;

    let (mut client, connection) = connect_result.context("Failed to connect to database")?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    let report = embedded::migrations::runner()
        .run_async(&mut client)
        .await
        .context("Failed to run migrations")?;

    for migration in report.applied_migrations() {
        info!(
            "Applied migration V{} {}",
            migration.version(),
            migration.name()
        );
    }

    Ok(())
}

/// Names of the embedded migrations, in version order.
pub fn migration_names() -> Vec<String> {
    let mut migrations = embedded::migrations::runner().get_migrations().clone();
    migrations.sort_by_key(|migration| migration.version());
    migrations
        .iter()
        .map(|migration| migration.name().to_string())
        .collect()
}
