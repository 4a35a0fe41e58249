use dotenvy::dotenv;
use loan_ledger::{
    config::{database, users},
    core::{loan, report, user},
    errors::Result,
};
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so RUST_LOG and DATABASE_URL can come from it
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to ledger store: {e}"))?;

    database::create_tables(&db)
        .await
        .inspect(|_| info!("Ledger schema ready"))
        .inspect_err(|e| error!("Failed to create ledger tables: {e}"))?;

    if Path::new(CONFIG_PATH).exists() {
        let config = users::load_default_config()?;
        let seeded = user::seed_users(&db, &config.users).await?;
        info!("Seeded {seeded} of {} configured users", config.users.len());
    } else {
        warn!("No {CONFIG_PATH} found, skipping user seeding");
    }

    let approved = loan::get_approved_loans(&db).await?;
    info!("{} approved loans in the ledger", approved.len());
    for approved_loan in approved {
        let statement = report::generate_loan_statement(&db, approved_loan.id).await?;
        info!("\n{}", report::format_loan_statement(&statement));
    }

    Ok(())
}
