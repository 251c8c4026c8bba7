//! Response composition: raw recommendations → a short user-voiced message.
//!
//! One model call turns a random subset of the results into a casual,
//! emoji-sprinkled message under a strict style contract. Composition never
//! fails the pipeline: empty results get a canned no-results message without
//! touching the model, and any model failure falls back to a deterministic
//! string.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

use crate::providers::{CompletionRequest, LanguageModel};
use crate::qloo::{Recommendation, NO_DESCRIPTION};

/// Canned reply when the recommendation fetch returned nothing.
pub const NO_RESULTS_MESSAGE: &str = "Hey! 👋 I looked everywhere but couldn't find anything that matches what you're looking for. Maybe try being a bit more specific, or I can suggest something completely different? 😊";

/// Canned reply when every returned entry was malformed.
pub const NO_VALID_RESULTS_MESSAGE: &str =
    "I found some results but they weren't quite what I expected. Let me try a different approach! 😊";

/// Deterministic fallback when message generation itself fails.
pub const COMPOSE_FALLBACK_MESSAGE: &str = "Oops! I found some great recommendations for you but got a bit confused while organizing them 😅 Want me to try again?";

/// Size of the random subset embedded in the prompt:
/// `min(5, max(3, floor(0.3 * valid_count)))`.
pub fn selection_size(valid_count: usize) -> usize {
    let scaled = valid_count.saturating_mul(3).saturating_div(10);
    scaled.clamp(3, 5)
}

/// Compose a user-voiced message from recommendation results.
///
/// Returns the model output verbatim on success and a canned string on
/// every failure path — the caller never sees an error from this stage.
pub async fn compose<R: Rng + Send>(
    model: &dyn LanguageModel,
    original_query: &str,
    results: &[Recommendation],
    rng: &mut R,
) -> String {
    if results.is_empty() {
        return NO_RESULTS_MESSAGE.to_owned();
    }

    let valid: Vec<&Recommendation> = results
        .iter()
        .filter(|rec| !rec.name.trim().is_empty() && !rec.description.trim().is_empty())
        .collect();

    if valid.is_empty() {
        return NO_VALID_RESULTS_MESSAGE.to_owned();
    }

    let mut selected = valid;
    selected.shuffle(rng);
    selected.truncate(selection_size(selected.len()));

    let prompt = build_compose_prompt(original_query, &selected);

    match model.complete(CompletionRequest::new(prompt, 300, 0.85)).await {
        Ok(message) if !message.trim().is_empty() => message,
        Ok(_) => COMPOSE_FALLBACK_MESSAGE.to_owned(),
        Err(e) => {
            warn!(error = %e, "message composition failed, using fallback");
            COMPOSE_FALLBACK_MESSAGE.to_owned()
        }
    }
}

/// Build the composition prompt embedding the selected items and the style
/// contract.
fn build_compose_prompt(original_query: &str, selected: &[&Recommendation]) -> String {
    let mut items_list = String::new();
    for (index, item) in selected.iter().enumerate() {
        items_list.push_str(&format!("{}. {}", index.saturating_add(1), item.name));
        if item.description != NO_DESCRIPTION {
            items_list.push_str(&format!(" - {}", item.description));
        }
        if let Some(address) = &item.address {
            items_list.push_str(&format!(" (📍 {address})"));
        }
        items_list.push('\n');
    }

    format!(
        "You are Tastemate, a friendly taste companion. Respond to the user as if you are their fun, casual friend who just found some cool recommendations for them.\n\n\
         User's original request: \"{original_query}\"\n\
         Number of recommendations: {}\n\n\
         Here are the recommendations you found (show only a few, not all):\n{items_list}\n\
         Instructions:\n\
         - Write a friendly, excited, and casual message.\n\
         - Start with a creative, non-formal opening (no 'Based on your request...').\n\
         - Present the recommendations as a list, with a short, casual comment for each if you want.\n\
         - End with a fun, conversational closing (invite the user to ask for more, or share their thoughts, etc.).\n\
         - Use relevant emojis in the message.\n\
         - Do NOT be formal or robotic. Be playful and personal.\n\
         - Keep the whole message under 200 words.\n\
         - Do not mention you are an AI or language model.\n\
         - Only output the message, nothing else.",
        selected.len()
    )
}
