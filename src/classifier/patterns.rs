//! Ordered fallback regex chains for per-type field extraction.
//!
//! Each field tries its patterns in order; the first successful match wins
//! and an unmatched field stays `None` — extraction itself never fails.
//! The patterns are carried over from the production mail formats the
//! system was tuned against (ticketing portals, IRCTC slips, order mails).

use regex::Regex;

use super::{BookingFields, TravelMode};

/// Extract movie booking fields.
pub(crate) fn extract_movie(content: &str) -> BookingFields {
    BookingFields::Movie {
        movie_title: movie_title(content),
        show_date_time: capture(content, r"Date & Time\s+([A-Za-z0-9 ,|:]+)"),
        theatre: capture_first(
            content,
            &[
                r"(?i)Theatre\s+([^\n]+)",
                r"(?i)Theatre\s*:?\s*(.+?)(?:\n|$)",
                r"(?i)Venue\s*:?\s*(.+?)(?:\n|$)",
                r"(?i)Location\s*:?\s*(.+?)(?:\n|$)",
                r"(?i)at\s+([A-Za-z0-9\s,()-]+(?:formerly\s+[A-Za-z\s]+)?)",
            ],
        ),
    }
}

/// Extract travel booking fields, falling back to the subject line for
/// identifiers and route endpoints where the body has none.
pub(crate) fn extract_travel(content: &str, subject: &str, lower_content: &str) -> BookingFields {
    let pnr = capture(content, r"(?i)PNR\s*:?\s*([A-Z0-9]+)")
        .or_else(|| capture(subject, r"(?i)PNR\s*:?\s*([A-Z0-9]+)"));
    let booking_id = capture(content, r"(?i)booking id\s*-?\s*([A-Z0-9]+)")
        .or_else(|| capture(subject, r"(?i)booking id\s*-?\s*([A-Z0-9]+)"));

    let from = capture(
        content,
        r"(?i)(?:From|Boarding Station|Departure)\s*:?\s*([A-Za-z\s()]+)\s*(?:To|\()",
    )
    .or_else(|| capture(subject, r"\(([^-]+)-"));
    let to = capture(content, r"(?i)To\s*:?\s*([A-Za-z\s()]+)")
        .or_else(|| capture(subject, r"-([A-Za-z]+)\)"));

    BookingFields::Travel {
        from,
        to,
        travel_mode: detect_travel_mode(lower_content),
        pnr,
        booking_id,
        departure: capture(content, r"Departure\*?\s*:?\s*([0-9:]+ \d+ \w+ \d{4})"),
        arrival: capture(content, r"Arrival\*?\s*:?\s*([0-9:]+ \d+ \w+ \d{4})"),
    }
}

/// Extract dining reservation fields.
pub(crate) fn extract_dining(content: &str) -> BookingFields {
    BookingFields::Dining {
        restaurant: capture_first(
            content,
            &[
                r"(?i)restaurant\s*:?\s*([^\n]+)",
                r"(?i)at\s+([A-Za-z0-9\s&'-]+(?:restaurant|dining|bistro|cafe))",
                r"(?i)([A-Za-z0-9\s&'-]+(?:restaurant|dining|bistro|cafe))",
            ],
        ),
        date_time: capture(content, r"(?i)(?:date|time|when)\s*:?\s*([A-Za-z0-9 ,|:]+)"),
        guest_count: capture(content, r"(?i)(?:for|guests|people)\s*:?\s*(\d+)"),
        reservation_id: capture(
            content,
            r"(?i)(?:reservation|booking)\s*(?:id|number)\s*:?\s*([A-Z0-9]+)",
        ),
    }
}

/// Extract book order fields.
pub(crate) fn extract_book(content: &str) -> BookingFields {
    BookingFields::Book {
        title: capture_first(
            content,
            &[
                r"(?i)book\s*:?\s*([^\n]+)",
                r"(?i)title\s*:?\s*([^\n]+)",
                r"(?i)order\s+for\s+([^\n]+)",
            ],
        ),
        author: capture(content, r"(?i)author\s*:?\s*([^\n]+)"),
        order_id: capture(content, r"(?i)order\s*(?:id|number)\s*:?\s*([A-Z0-9]+)"),
        price: capture(content, r"(?i)price\s*:?\s*([^\n]+)"),
    }
}

/// Movie title has a three-step fallback: ticketing-portal order line,
/// "tickets for X: Y are confirmed", then the bare confirmation phrase.
fn movie_title(content: &str) -> Option<String> {
    if let Some(title) = capture(content, r"(?i)Order ID\s*:\s*\d+\s+([^(]+?)\s*\(UA16\+\)") {
        return Some(title);
    }

    if let Ok(re) = Regex::new(r"(?i)tickets for ([^:]+): ([^a]+) are confirmed") {
        if let Some(caps) = re.captures(content) {
            if let (Some(series), Some(part)) = (caps.get(1), caps.get(2)) {
                return Some(format!(
                    "{}: {}",
                    series.as_str().trim(),
                    part.as_str().trim()
                ));
            }
        }
    }

    capture(content, r"(?i)for ([^a]+?) are confirmed")
}

fn detect_travel_mode(lower_content: &str) -> TravelMode {
    if lower_content.contains("flight") {
        TravelMode::Flight
    } else if lower_content.contains("hotel") {
        TravelMode::Hotel
    } else if lower_content.contains("train") {
        TravelMode::Train
    } else {
        TravelMode::Other
    }
}

/// Run a single-group pattern against `text`, returning the trimmed capture.
fn capture(text: &str, pattern: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// Try patterns in order; first successful capture wins.
fn capture_first(text: &str, patterns: &[&str]) -> Option<String> {
    patterns.iter().find_map(|pattern| capture(text, pattern))
}
