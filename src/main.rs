//! apos-upgrade - migrate legacy Apostrophe content to A3

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use apos_upgrade::{
    config::{Args, MigrationOptions},
    db::{MongoClient, MongoLegacySource, MongoTargetStore},
    schema::SchemaRegistry,
    MigrationRun,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("apos_upgrade={},info", args.log_level).into());
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }
    let target_uri = args.target_uri.clone().unwrap_or_default();
    let target_db = args.target_db().unwrap_or_default();

    info!("======================================");
    info!("  apos-upgrade");
    info!("======================================");
    info!("Source: {} / {}", args.source_uri, args.source_db);
    info!("Target: {}", target_db);
    info!("Schemas: {}", args.schemas.display());
    if let Some(options) = &args.options {
        info!("Options: {}", options.display());
    }
    info!("Workflow: {:?}", args.workflow);
    info!("Drop existing target: {}", args.drop);
    info!("======================================");

    let registry = match SchemaRegistry::load(&args.schemas) {
        Ok(registry) => registry,
        Err(e) => {
            error!("Schema registry error: {}", e);
            std::process::exit(1);
        }
    };
    let options = match &args.options {
        Some(path) => match MigrationOptions::load(path) {
            Ok(options) => options,
            Err(e) => {
                error!("Options error: {}", e);
                std::process::exit(1);
            }
        },
        None => MigrationOptions::default(),
    };

    let legacy = match MongoClient::new(&args.source_uri, &args.source_db).await {
        Ok(client) => {
            info!("Legacy MongoDB connected");
            client
        }
        Err(e) => {
            error!("Legacy MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };
    let target = match MongoClient::new(&target_uri, &target_db).await {
        Ok(client) => {
            info!("Target MongoDB connected");
            client
        }
        Err(e) => {
            error!("Target MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let run = MigrationRun::new(registry, options)
        .with_default_locale(&args.default_locale)
        .with_workflow(args.workflow)
        .allow_drop(args.drop);

    let report = match run
        .run(&MongoLegacySource::new(&legacy), &MongoTargetStore::new(&target))
        .await
    {
        Ok(report) => report,
        Err(e) => {
            error!(fatal = e.is_fatal(), "Upgrade failed: {}", e);
            std::process::exit(1);
        }
    };

    info!(report = %serde_json::to_string(&report)?, "Run report");
    println!("{}", report);
    Ok(())
}
