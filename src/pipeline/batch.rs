//! Per-user batch entry points: the booking mail scan and the taste digest.
//!
//! Both walk every stored user and run the pipeline for those that qualify.
//! Each user is isolated behind its own error boundary: a failed run is
//! logged and reported in that user's outcome, and the batch moves on.
//!
//! Delivery is fire-and-forget — a failed send is reported in the outcome
//! but the composed message is still recorded in the history.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, warn};

use super::Pipeline;
use crate::classifier::{self, BookingRecord, Classification};
use crate::delivery::DeliveryChannel;
use crate::inspiration;
use crate::mail::{self, MailSource};
use crate::store::{MessageLog, PreferenceStore, UserProfile};

/// Taste tags that attract booking emails.
const BOOKING_TASTES: [&str; 4] = ["movie", "travel", "dining", "book"];

/// Mail scan bounds.
#[derive(Debug, Clone, Copy)]
pub struct MailScanSettings {
    /// How far back the search looks, in days.
    pub window_days: i64,
    /// Maximum emails fetched per user.
    pub max_results: u32,
}

/// Everything a batch run needs, wired once at startup.
pub struct BatchDeps {
    /// User profile source.
    pub store: Arc<dyn PreferenceStore>,
    /// Delivered-message history.
    pub log: Arc<dyn MessageLog>,
    /// Mailbox access.
    pub mail: Arc<dyn MailSource>,
    /// Outbound channel.
    pub delivery: Arc<dyn DeliveryChannel>,
    /// The recommendation pipeline.
    pub pipeline: Pipeline,
    /// Mail scan bounds.
    pub mail_settings: MailScanSettings,
}

/// Outcome of one user's batch run.
#[derive(Debug, Clone)]
pub struct UserOutcome {
    /// The user this outcome belongs to.
    pub user_id: String,
    /// Whether a message reached the user.
    pub delivered: bool,
    /// Human-readable summary of what happened.
    pub detail: String,
}

impl UserOutcome {
    fn skipped(user_id: &str, why: &str) -> Self {
        Self {
            user_id: user_id.to_owned(),
            delivered: false,
            detail: format!("skipped: {why}"),
        }
    }

    fn failed(user_id: &str, why: String) -> Self {
        Self {
            user_id: user_id.to_owned(),
            delivered: false,
            detail: format!("failed: {why}"),
        }
    }
}

/// Scan every user's mailbox for booking confirmations and deliver
/// recommendations for the first one found.
///
/// # Errors
///
/// Returns an error only when the user list itself cannot be loaded;
/// individual user failures are contained in their outcomes.
pub async fn run_booking_scan(deps: &BatchDeps) -> anyhow::Result<Vec<UserOutcome>> {
    let users = deps
        .store
        .list_users()
        .await
        .context("failed to list users for booking scan")?;
    info!(users = users.len(), "booking scan started");

    let mut outcomes = Vec::with_capacity(users.len());
    for user in &users {
        let outcome = match scan_user(deps, user).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(user_id = %user.user_id, error = %e, "booking scan failed for user");
                UserOutcome::failed(&user.user_id, format!("{e:#}"))
            }
        };
        outcomes.push(outcome);
    }

    info!(
        delivered = outcomes.iter().filter(|o| o.delivered).count(),
        total = outcomes.len(),
        "booking scan finished"
    );
    Ok(outcomes)
}

/// Deliver one taste-based recommendation digest to every user with
/// enabled preferences.
///
/// # Errors
///
/// Returns an error only when the user list itself cannot be loaded.
pub async fn run_taste_digest(deps: &BatchDeps) -> anyhow::Result<Vec<UserOutcome>> {
    let users = deps
        .store
        .list_users()
        .await
        .context("failed to list users for taste digest")?;
    info!(users = users.len(), "taste digest started");

    let mut outcomes = Vec::with_capacity(users.len());
    for user in &users {
        let outcome = match digest_user(deps, user).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(user_id = %user.user_id, error = %e, "taste digest failed for user");
                UserOutcome::failed(&user.user_id, format!("{e:#}"))
            }
        };
        outcomes.push(outcome);
    }

    info!(
        delivered = outcomes.iter().filter(|o| o.delivered).count(),
        total = outcomes.len(),
        "taste digest finished"
    );
    Ok(outcomes)
}

async fn scan_user(deps: &BatchDeps, user: &UserProfile) -> anyhow::Result<UserOutcome> {
    if !user.active {
        return Ok(UserOutcome::skipped(&user.user_id, "account inactive"));
    }
    let Some(refresh_token) = &user.gmail_refresh_token else {
        return Ok(UserOutcome::skipped(&user.user_id, "no mail credential"));
    };
    if !user
        .tastes
        .iter()
        .any(|taste| BOOKING_TASTES.contains(&taste.as_str()))
    {
        return Ok(UserOutcome::skipped(
            &user.user_id,
            "no booking-relevant taste preferences",
        ));
    }

    let Some(query) = mail::booking_search_query(
        &user.tastes,
        Utc::now(),
        deps.mail_settings.window_days,
        deps.mail_settings.max_results,
    ) else {
        return Ok(UserOutcome::skipped(&user.user_id, "no search terms"));
    };

    let emails = deps
        .mail
        .search(refresh_token, &query)
        .await
        .context("mail search failed")?;
    info!(user_id = %user.user_id, emails = emails.len(), "booking search returned");

    // First supported booking wins; unsupported formats are skipped quietly.
    let record = emails.iter().find_map(|email| {
        match classifier::classify(&email.plain_text(), &email.subject) {
            Classification::Booking(fields) => Some(BookingRecord {
                source_subject: email.subject.clone(),
                source_sender: email.from.clone(),
                source_date: email.date.clone(),
                fields,
            }),
            Classification::Unsupported => None,
        }
    });

    let Some(record) = record else {
        return Ok(UserOutcome::skipped(&user.user_id, "no booking email matched"));
    };
    info!(
        user_id = %user.user_id,
        booking_type = record.booking_type().as_str(),
        subject = %record.source_subject,
        "booking classified"
    );

    let sentence = inspiration::from_booking(&record);
    deliver_run(deps, user, &sentence).await
}

async fn digest_user(deps: &BatchDeps, user: &UserProfile) -> anyhow::Result<UserOutcome> {
    if !user.active {
        return Ok(UserOutcome::skipped(&user.user_id, "account inactive"));
    }
    if user.tastes.is_empty() {
        return Ok(UserOutcome::skipped(&user.user_id, "no taste preferences"));
    }

    let mut rng = StdRng::from_entropy();
    let sentence = inspiration::from_taste_preferences(&user.tastes, &mut rng);
    let refined = inspiration::refine(deps.pipeline.model().as_ref(), &sentence).await;
    info!(user_id = %user.user_id, inspiration = %refined, "taste digest inspiration ready");

    deliver_run(deps, user, &refined).await
}

/// Run the pipeline for one sentence, record the message, and send it.
async fn deliver_run(
    deps: &BatchDeps,
    user: &UserProfile,
    sentence: &str,
) -> anyhow::Result<UserOutcome> {
    let mut rng = StdRng::from_entropy();
    let run = deps
        .pipeline
        .run(sentence, &mut rng)
        .await
        .context("pipeline run failed")?;

    // History first: the composed message is kept even when the send fails.
    if let Err(e) = deps.log.record_delivery(&user.user_id, &run.message).await {
        warn!(user_id = %user.user_id, error = %e, "failed to record delivered message");
    }

    let Some(chat_id) = &user.telegram_chat_id else {
        return Ok(UserOutcome {
            user_id: user.user_id.clone(),
            delivered: false,
            detail: "message composed but user has no delivery destination".to_owned(),
        });
    };

    match deps.delivery.deliver(chat_id, &run.message).await {
        Ok(_) => Ok(UserOutcome {
            user_id: user.user_id.clone(),
            delivered: true,
            detail: format!(
                "delivered {} recommendations ({})",
                run.recommendations.len(),
                run.entity_type.as_str()
            ),
        }),
        Err(e) => {
            warn!(user_id = %user.user_id, error = %e, "delivery failed");
            Ok(UserOutcome {
                user_id: user.user_id.clone(),
                delivered: false,
                detail: format!("message composed but delivery failed: {e}"),
            })
        }
    }
}
