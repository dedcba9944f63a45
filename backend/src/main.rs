use outlier_finder::api::build_rocket;
use outlier_finder::config::{create_app_state, init_logger, load_environment, AppConfig};

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    load_environment();
    init_logger();

    let config = AppConfig::from_env()?;
    let state = create_app_state(&config)?;

    build_rocket(state)
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("Rocket failed: {e}"))?;
    Ok(())
}
