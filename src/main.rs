/// CrashKB server binary
use crashkb::{
    config::ServerConfig, context::AppContext, error::KbResult, jobs::JobScheduler, server,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> KbResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crashkb=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    let config = ServerConfig::from_env()?;
    let developer_usernames = config.authentication.developer_usernames.clone();

    let ctx = Arc::new(AppContext::new(config).await?);

    // Top-tier accounts can only come from configuration
    if !developer_usernames.is_empty() {
        let granted = ctx
            .role_admin
            .bootstrap_developers(&developer_usernames)
            .await?;
        tracing::info!("Developer bootstrap granted {} role(s)", granted);
    }

    // Start background jobs
    let scheduler = Arc::new(JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
   ______                __    __ __ ____
  / ____/________ ______/ /_  / //_// __ )
 / /   / ___/ __ `/ ___/ __ \/ ,<  / __  |
/ /___/ /  / /_/ (__  ) / / / /| |/ /_/ /
\____/_/   \__,_/____/_/ /_/_/ |_/_____/

        Crash-fix knowledge base v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
