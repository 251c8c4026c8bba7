//! Booking email classification and field extraction.
//!
//! Decides which booking type a message represents (movie, travel, dining,
//! book) from substring heuristics over the lowercased body and subject,
//! then extracts type-specific fields with ordered regex fallbacks.
//!
//! Detection order is significant and deliberately preserved: movie, then
//! travel, then dining, then book. Several trigger words overlap between
//! types ("booking" most of all), so reordering the checks changes behavior;
//! the precedence tests below pin it down.
//!
//! Classification uses plain string matching rather than an LLM so that the
//! mailbox scan stays deterministic and cheap.

use serde::{Deserialize, Serialize};

pub mod html;
mod patterns;

/// The booking category a message was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingType {
    /// Cinema ticket confirmation.
    Movie,
    /// Train / flight / hotel reservation.
    Travel,
    /// Restaurant table reservation.
    Dining,
    /// Book purchase confirmation.
    Book,
}

impl BookingType {
    /// String form used in logs and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Travel => "travel",
            Self::Dining => "dining",
            Self::Book => "book",
        }
    }
}

/// Mode of travel detected from the booking content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    /// Air travel.
    Flight,
    /// Hotel stay.
    Hotel,
    /// Rail travel.
    Train,
    /// Unspecified travel booking.
    Other,
}

impl TravelMode {
    /// String form used in inspiration sentences and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flight => "flight",
            Self::Hotel => "hotel",
            Self::Train => "train",
            Self::Other => "travel",
        }
    }
}

/// Type-specific extracted fields. Unmatched fields are `None`, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BookingFields {
    /// Movie ticket fields.
    Movie {
        /// Film title.
        movie_title: Option<String>,
        /// Show date and time as printed in the mail.
        show_date_time: Option<String>,
        /// Theatre or venue name.
        theatre: Option<String>,
    },
    /// Travel reservation fields.
    Travel {
        /// Origin station / city.
        from: Option<String>,
        /// Destination station / city.
        to: Option<String>,
        /// Detected travel mode.
        travel_mode: TravelMode,
        /// PNR identifier.
        pnr: Option<String>,
        /// Portal booking identifier.
        booking_id: Option<String>,
        /// Departure time as printed.
        departure: Option<String>,
        /// Arrival time as printed.
        arrival: Option<String>,
    },
    /// Dining reservation fields.
    Dining {
        /// Restaurant name.
        restaurant: Option<String>,
        /// Reservation date and time as printed.
        date_time: Option<String>,
        /// Party size.
        guest_count: Option<String>,
        /// Reservation identifier.
        reservation_id: Option<String>,
    },
    /// Book order fields.
    Book {
        /// Book title.
        title: Option<String>,
        /// Author name.
        author: Option<String>,
        /// Order identifier.
        order_id: Option<String>,
        /// Price as printed.
        price: Option<String>,
    },
}

impl BookingFields {
    /// The booking type these fields belong to.
    pub fn booking_type(&self) -> BookingType {
        match self {
            Self::Movie { .. } => BookingType::Movie,
            Self::Travel { .. } => BookingType::Travel,
            Self::Dining { .. } => BookingType::Dining,
            Self::Book { .. } => BookingType::Book,
        }
    }

    /// The key entity the booking is about: film title, destination,
    /// restaurant, or book title.
    pub fn primary_entity(&self) -> Option<&str> {
        match self {
            Self::Movie { movie_title, .. } => movie_title.as_deref(),
            Self::Travel { to, .. } => to.as_deref(),
            Self::Dining { restaurant, .. } => restaurant.as_deref(),
            Self::Book { title, .. } => title.as_deref(),
        }
    }

    /// Whether extraction produced any field at all. A detected type with
    /// no extracted fields is reported as unsupported, not as an empty record.
    pub fn has_any_field(&self) -> bool {
        match self {
            Self::Movie {
                movie_title,
                show_date_time,
                theatre,
            } => movie_title.is_some() || show_date_time.is_some() || theatre.is_some(),
            Self::Travel {
                from,
                to,
                pnr,
                booking_id,
                departure,
                arrival,
                ..
            } => {
                from.is_some()
                    || to.is_some()
                    || pnr.is_some()
                    || booking_id.is_some()
                    || departure.is_some()
                    || arrival.is_some()
            }
            Self::Dining {
                restaurant,
                date_time,
                guest_count,
                reservation_id,
            } => {
                restaurant.is_some()
                    || date_time.is_some()
                    || guest_count.is_some()
                    || reservation_id.is_some()
            }
            Self::Book {
                title,
                author,
                order_id,
                price,
            } => title.is_some() || author.is_some() || order_id.is_some() || price.is_some(),
        }
    }
}

/// A classified booking with provenance copied from the source email.
///
/// Created once per matched email, never mutated, consumed by the
/// inspiration synthesizer, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRecord {
    /// Subject line of the source email.
    pub source_subject: String,
    /// Sender of the source email.
    pub source_sender: String,
    /// Date header of the source email.
    pub source_date: String,
    /// Extracted type-specific fields.
    pub fields: BookingFields,
}

impl BookingRecord {
    /// The booking type of this record.
    pub fn booking_type(&self) -> BookingType {
        self.fields.booking_type()
    }
}

/// Classification outcome: a booking or an explicit unsupported-format miss.
///
/// An unsupported format is a normal, non-fatal outcome — the caller skips
/// the email and moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The email matched a supported booking pattern.
    Booking(BookingFields),
    /// The email matched no supported booking pattern.
    Unsupported,
}

/// Classify an email body and subject into a booking.
///
/// HTML bodies are stripped to plain text first so the extraction regexes
/// see the same structure the heuristics were tuned on.
pub fn classify(body: &str, subject: &str) -> Classification {
    let content = html::html_to_text(body);
    let lower_content = content.to_lowercase();
    let lower_subject = subject.to_lowercase();

    let fields = if is_movie(&lower_content) {
        patterns::extract_movie(&content)
    } else if is_travel(&lower_content, &lower_subject) {
        patterns::extract_travel(&content, subject, &lower_content)
    } else if is_dining(&lower_content) {
        patterns::extract_dining(&content)
    } else if is_book(&lower_content, &lower_subject) {
        patterns::extract_book(&content)
    } else {
        return Classification::Unsupported;
    };

    if fields.has_any_field() {
        Classification::Booking(fields)
    } else {
        Classification::Unsupported
    }
}

fn is_movie(lower_content: &str) -> bool {
    lower_content.contains("booking confirmed") && lower_content.contains("screen")
}

fn is_travel(lower_content: &str, lower_subject: &str) -> bool {
    lower_content.contains("electronic reservation slip")
        || lower_content.contains("pnr")
        || (lower_subject.contains("e-ticket")
            && (lower_subject.contains("pnr") || lower_subject.contains("booking id")))
        || lower_content.contains("flight")
        || lower_content.contains("hotel")
        || lower_content.contains("travel booking")
}

fn is_dining(lower_content: &str) -> bool {
    lower_content.contains("restaurant")
        || lower_content.contains("dining")
        || lower_content.contains("table reservation")
        || (lower_content.contains("reservation confirmed")
            && (lower_content.contains("restaurant") || lower_content.contains("dining")))
}

fn is_book(lower_content: &str, lower_subject: &str) -> bool {
    (lower_content.contains("book") && lower_content.contains("order"))
        || (lower_content.contains("book") && lower_content.contains("confirmation"))
        || (lower_subject.contains("book") && lower_subject.contains("confirmation"))
}
