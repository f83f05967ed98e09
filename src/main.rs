use kite::configuration::Settings;
use kite::db::init_db;
use kite::migration::{Migrator, MigratorTrait};
use kite::telemetry::{get_subscriber, init_subscriber};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    let subscriber = get_subscriber(
        "kite".into(),
        settings.log_filter.clone(),
        std::io::stdout
    );
    init_subscriber(subscriber)?;

    let db = init_db(&settings.database).await?;

    info!("running database migrations...");
    Migrator::up(&db, None).await?;
    info!("migrations complete");

    Ok(())
}
