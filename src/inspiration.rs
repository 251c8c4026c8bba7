//! Inspiration sentence synthesis.
//!
//! Converts either a classified [`BookingRecord`] or a user's standing taste
//! preferences into one short natural-language sentence describing what to
//! search for. The sentence is the sole input to the query analyzer.
//!
//! The taste-based variant picks ONE preference uniformly at random per
//! invocation so repeated daily runs vary. The random source is injected so
//! tests can pin the selection.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

use crate::classifier::{BookingFields, BookingRecord};
use crate::providers::{CompletionRequest, LanguageModel};

/// Sentence used when no recognized taste preference is enabled.
pub const GENERIC_TASTE_INSPIRATION: &str =
    "I want personalized recommendations based on my interests.";

/// The taste preference tags the synthesizer recognizes, with their canned
/// descriptions.
const TASTE_DESCRIPTIONS: &[(&str, &str)] = &[
    ("movie", "Find popular movies and entertainment content"),
    ("travel", "Find travel destinations and places to visit"),
    ("dining", "Find restaurants and food recommendations"),
    ("book", "Find books and reading recommendations"),
    ("recipe", "Find local recipes and cooking tips"),
    ("challenge", "Find fun food exploration challenges"),
    ("culture", "Find local customs and traditions"),
    ("seasonal", "Find time-based suggestions"),
    ("weather", "Find weather-based activity suggestions"),
    ("budget", "Find cost-saving recommendations"),
];

/// Build an inspiration sentence from a classified booking.
///
/// Always names the booking's key entity (with a generic stand-in when
/// extraction missed it) plus whichever secondary qualifiers are present,
/// and ends with an explicit ask for similar recommendations.
pub fn from_booking(record: &BookingRecord) -> String {
    match &record.fields {
        BookingFields::Movie {
            movie_title,
            show_date_time,
            theatre,
        } => {
            let title = movie_title.as_deref().unwrap_or("this movie");
            let mut sentence = format!("Find movies similar to \"{title}\"");
            if let Some(theatre) = theatre {
                sentence.push_str(&format!(" that are showing at {theatre}"));
            }
            if let Some(when) = show_date_time {
                sentence.push_str(&format!(" around {when}"));
            }
            sentence.push_str(". I want recommendations for similar movies to watch.");
            sentence
        }
        BookingFields::Travel {
            from,
            to,
            travel_mode,
            departure,
            ..
        } => {
            let destination = to.as_deref().unwrap_or("this destination");
            let mut sentence = format!("Find places to visit near \"{destination}\"");
            if let Some(from) = from {
                sentence.push_str(&format!(" when traveling from {from}"));
            }
            sentence.push_str(&format!(" for {}", travel_mode.as_str()));
            if let Some(departure) = departure {
                sentence.push_str(&format!(" around {departure}"));
            }
            sentence.push_str(
                ". I want recommendations for tourist attractions, restaurants, and interesting places to explore.",
            );
            sentence
        }
        BookingFields::Dining {
            restaurant,
            date_time,
            guest_count,
            ..
        } => {
            let restaurant = restaurant.as_deref().unwrap_or("this restaurant");
            let mut sentence = format!("Find restaurants similar to \"{restaurant}\"");
            if let Some(guests) = guest_count {
                sentence.push_str(&format!(" for {guests} people"));
            }
            if let Some(when) = date_time {
                sentence.push_str(&format!(" around {when}"));
            }
            sentence.push_str(
                ". I want recommendations for similar dining experiences and restaurants to try.",
            );
            sentence
        }
        BookingFields::Book {
            title,
            author,
            price,
            ..
        } => {
            let title = title.as_deref().unwrap_or("this book");
            let mut sentence = format!("Find books similar to \"{title}\"");
            if let Some(author) = author {
                sentence.push_str(&format!(" by {author}"));
            }
            if let Some(price) = price {
                sentence.push_str(&format!(" in the {price} price range"));
            }
            sentence.push_str(". I want recommendations for similar books to read.");
            sentence
        }
    }
}

/// Build an inspiration sentence from the user's enabled taste preferences.
///
/// Picks one recognized preference uniformly at random; unrecognized tags
/// are ignored. With nothing recognized, returns the generic sentence.
pub fn from_taste_preferences<R: Rng>(tastes: &[String], rng: &mut R) -> String {
    let available: Vec<&(&str, &str)> = TASTE_DESCRIPTIONS
        .iter()
        .filter(|(tag, _)| tastes.iter().any(|t| t.trim().eq_ignore_ascii_case(tag)))
        .collect();

    match available.choose(rng) {
        Some((_, description)) => {
            format!("{description}. I want personalized recommendations based on this interest.")
        }
        None => GENERIC_TASTE_INSPIRATION.to_owned(),
    }
}

/// Rewrite a canned inspiration sentence into a more specific one via one
/// model call. Any failure falls back to the input sentence unchanged —
/// refinement is an enhancement, never a gate.
pub async fn refine(model: &dyn LanguageModel, inspiration: &str) -> String {
    let prompt = format!(
        "Take this basic inspiration text and make it more engaging, specific, and detailed for better search results:\n\n\
         Original: \"{inspiration}\"\n\n\
         Please refine it into a more compelling and specific sentence that will help find better recommendations. Make it:\n\
         - More engaging and interesting\n\
         - More specific about what kind of content is desired\n\
         - Better structured for search algorithms\n\
         - Include relevant keywords\n\n\
         Return only the refined sentence, nothing else."
    );

    match model.complete(CompletionRequest::new(prompt, 150, 0.7)).await {
        Ok(refined) if !refined.trim().is_empty() => refined.trim().to_owned(),
        Ok(_) => inspiration.to_owned(),
        Err(e) => {
            warn!(error = %e, "inspiration refinement failed, keeping original");
            inspiration.to_owned()
        }
    }
}
