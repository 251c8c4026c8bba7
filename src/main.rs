#![allow(missing_docs)]

//! Tastemate — personal taste companion.
//!
//! Single binary: scans mailboxes for booking confirmations, resolves them
//! into cultural recommendations, and delivers short messages over Telegram.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use tastemate::config::MateConfig;
use tastemate::delivery::telegram::TelegramDelivery;
use tastemate::delivery::DeliveryChannel;
use tastemate::heartbeat;
use tastemate::logging;
use tastemate::mail::gmail::GmailClient;
use tastemate::mail::MailSource;
use tastemate::pipeline::batch::{self, BatchDeps, MailScanSettings, UserOutcome};
use tastemate::pipeline::Pipeline;
use tastemate::providers::openai::OpenAiModel;
use tastemate::providers::LanguageModel;
use tastemate::qloo::{CulturalSearch, QlooClient, RecommendationSource, RetryPolicy};
use tastemate::store::sqlite::SqliteStore;
use tastemate::store::{MessageLog, PreferenceStore, UserProfile};

#[derive(Parser)]
#[command(name = "tastemate", version, about = "Personal taste companion")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler loop (booking scan + taste digest on their crons).
    Start,
    /// Run one booking mail scan across all users, then exit.
    Scan,
    /// Run one taste digest across all users, then exit.
    Digest,
    /// Add or update a user profile in the store.
    AddUser {
        /// Stable user identifier.
        #[arg(long)]
        id: String,
        /// Account email address.
        #[arg(long)]
        email: String,
        /// Comma-separated taste tags (movie, travel, dining, book, ...).
        #[arg(long, value_delimiter = ',')]
        tastes: Vec<String>,
        /// Telegram chat id for delivery.
        #[arg(long)]
        telegram_chat_id: Option<String>,
        /// Gmail refresh token for the booking scan.
        #[arg(long)]
        gmail_refresh_token: Option<String>,
        /// Exclude the account from scheduled runs.
        #[arg(long)]
        inactive: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = MateConfig::load().context("failed to load configuration")?;

    match cli.command {
        Command::Start => {
            let _guard = logging::init_production(Path::new("logs"))?;
            info!("tastemate starting");
            let deps = build_deps(&config).await?;
            heartbeat::run_loop(&deps, &config.heartbeat).await
        }
        Command::Scan => {
            logging::init_cli();
            let deps = build_deps(&config).await?;
            let outcomes = batch::run_booking_scan(&deps).await?;
            print_outcomes(&outcomes);
            Ok(())
        }
        Command::Digest => {
            logging::init_cli();
            let deps = build_deps(&config).await?;
            let outcomes = batch::run_taste_digest(&deps).await?;
            print_outcomes(&outcomes);
            Ok(())
        }
        Command::AddUser {
            id,
            email,
            tastes,
            telegram_chat_id,
            gmail_refresh_token,
            inactive,
        } => {
            logging::init_cli();
            let store = SqliteStore::open(Path::new(&config.store.db_path))
                .await
                .context("failed to open store")?;
            let profile = UserProfile {
                user_id: id,
                email,
                tastes: tastes
                    .iter()
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect(),
                telegram_chat_id,
                gmail_refresh_token,
                active: !inactive,
            };
            store
                .upsert_user(&profile)
                .await
                .context("failed to save user")?;
            println!("saved user {}", profile.user_id);
            Ok(())
        }
    }
}

async fn build_deps(config: &MateConfig) -> Result<BatchDeps> {
    let store = Arc::new(
        SqliteStore::open(Path::new(&config.store.db_path))
            .await
            .context("failed to open store")?,
    );

    let model: Arc<dyn LanguageModel> = Arc::new(OpenAiModel::new(
        config.llm.base_url.clone(),
        config.llm.api_key.clone(),
        config.llm.model.clone(),
    ));

    let qloo = Arc::new(QlooClient::new(
        config.qloo.base_url.clone(),
        config.qloo.api_key.clone(),
        RetryPolicy {
            max_attempts: config.pipeline.insights_max_attempts,
            backoff_base_ms: config.pipeline.insights_backoff_ms,
        },
    ));

    let pipeline = Pipeline::new(
        model,
        Arc::clone(&qloo) as Arc<dyn CulturalSearch>,
        qloo as Arc<dyn RecommendationSource>,
        Duration::from_secs(config.pipeline.timeout_secs),
    );

    let mail: Arc<dyn MailSource> = Arc::new(GmailClient::new(
        config.mail.google_client_id.clone(),
        config.mail.google_client_secret.clone(),
    ));

    let delivery: Arc<dyn DeliveryChannel> =
        Arc::new(TelegramDelivery::new(&config.telegram.bot_token));

    Ok(BatchDeps {
        store: Arc::clone(&store) as Arc<dyn PreferenceStore>,
        log: store as Arc<dyn MessageLog>,
        mail,
        delivery,
        pipeline,
        mail_settings: MailScanSettings {
            window_days: config.pipeline.mail_window_days,
            max_results: config.pipeline.mail_max_results,
        },
    })
}

fn print_outcomes(outcomes: &[UserOutcome]) {
    for outcome in outcomes {
        let status = if outcome.delivered { "delivered" } else { "-" };
        println!("{}\t{}\t{}", outcome.user_id, status, outcome.detail);
    }
    println!(
        "{} of {} users received a message",
        outcomes.iter().filter(|o| o.delivered).count(),
        outcomes.len()
    );
}
