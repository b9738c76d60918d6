use crate::gemini::Embedding;
use serde::{Deserialize, Serialize};

/// Earliest ceremony year that is ingested
pub const MIN_CEREMONY_YEAR: i64 = 2023;

/// One nomination row from the awards CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwardRecord {
    /// Source identifier, or a generated UUID when the CSV has none
    pub id: String,
    pub year_film: i64,
    pub year_ceremony: i64,
    pub ceremony: String,
    pub category: String,
    pub name: String,
    pub film: String,
    pub winner: bool,
}

impl AwardRecord {
    /// Whether this row should be ingested at all
    pub fn is_accepted(&self) -> bool {
        self.year_ceremony >= MIN_CEREMONY_YEAR && !self.name.is_empty() && !self.film.is_empty()
    }

    /// Human-readable sentence used both as the embedding input and as search context
    pub fn describe(&self) -> String {
        format!(
            "In the {} Oscar Awards, the category {} was nominated {} and {} the award.",
            self.year_ceremony,
            self.category,
            self.name,
            if self.winner { "won" } else { "did not win" }
        )
    }
}

/// A record enriched with its description and embedding, ready to be stored
#[derive(Debug, Clone)]
pub struct AwardDocument {
    pub record: AwardRecord,
    pub description: String,
    pub embedding: Embedding,
}

impl AwardDocument {
    pub fn new(record: AwardRecord, embedding: Embedding) -> Self {
        let description = record.describe();
        AwardDocument {
            record,
            description,
            embedding,
        }
    }
}

/// Interpret a winner cell: only "true" (any case) counts
pub fn parse_winner(raw: Option<&str>) -> bool {
    raw.map(|value| value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Lenient numeric conversion: garbage and empty cells become zero
pub fn coerce_number(raw: Option<&str>) -> i64 {
    let value = match raw.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => return 0,
    };

    if let Ok(number) = value.parse::<i64>() {
        return number;
    }

    match value.parse::<f64>() {
        Ok(number) if number.is_finite() => number.trunc() as i64,
        _ => 0,
    }
}
