use crate::award::{coerce_number, parse_winner, AwardRecord};
use anyhow::{Context, Result};
use clap::ValueEnum;
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use log::{debug, info, warn};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use uuid::Uuid;

/// Default location of the awards CSV, relative to the working directory
pub const DEFAULT_CSV_PATH: &str = "data/the_oscar_award.csv";

/// Header naming conventions found in award exports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ColumnNaming {
    /// year_film, year_ceremony, ...
    #[default]
    Snake,
    /// yearFilm, yearCeremony, ...
    Camel,
}

/// Maps award fields to CSV header names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub id: String,
    pub year_film: String,
    pub year_ceremony: String,
    pub ceremony: String,
    pub category: String,
    pub name: String,
    pub film: String,
    pub winner: String,
}

impl ColumnMapping {
    pub fn snake_case() -> Self {
        Self::with_years("year_film", "year_ceremony")
    }

    pub fn camel_case() -> Self {
        Self::with_years("yearFilm", "yearCeremony")
    }

    // The two conventions only differ on the multi-word columns.
    fn with_years(year_film: &str, year_ceremony: &str) -> Self {
        ColumnMapping {
            id: "id".to_string(),
            year_film: year_film.to_string(),
            year_ceremony: year_ceremony.to_string(),
            ceremony: "ceremony".to_string(),
            category: "category".to_string(),
            name: "name".to_string(),
            film: "film".to_string(),
            winner: "winner".to_string(),
        }
    }
}

impl From<ColumnNaming> for ColumnMapping {
    fn from(naming: ColumnNaming) -> Self {
        match naming {
            ColumnNaming::Snake => ColumnMapping::snake_case(),
            ColumnNaming::Camel => ColumnMapping::camel_case(),
        }
    }
}

/// Positions of the mapped columns within one file's header row
#[derive(Debug, Clone, Copy)]
struct ColumnPositions {
    id: Option<usize>,
    year_film: Option<usize>,
    year_ceremony: Option<usize>,
    ceremony: Option<usize>,
    category: Option<usize>,
    name: Option<usize>,
    film: Option<usize>,
    winner: Option<usize>,
}

impl ColumnPositions {
    fn resolve(headers: &StringRecord, mapping: &ColumnMapping) -> Self {
        let find = |column: &str| {
            let position = headers.iter().position(|header| header.trim() == column);
            if position.is_none() {
                warn!("Column '{}' not found in CSV header", column);
            }
            position
        };

        ColumnPositions {
            // The id column is optional in every known export.
            id: headers.iter().position(|header| header.trim() == mapping.id),
            year_film: find(&mapping.year_film),
            year_ceremony: find(&mapping.year_ceremony),
            ceremony: find(&mapping.ceremony),
            category: find(&mapping.category),
            name: find(&mapping.name),
            film: find(&mapping.film),
            winner: find(&mapping.winner),
        }
    }
}

/// Lazily reads award rows from CSV input
pub struct AwardReader<R> {
    records: StringRecordsIntoIter<R>,
    positions: ColumnPositions,
}

impl AwardReader<File> {
    /// Open a CSV file on disk
    pub fn from_path<P: AsRef<Path>>(path: P, mapping: &ColumnMapping) -> Result<Self> {
        let path = path.as_ref();
        info!("Reading awards from {}", path.display());

        let file = File::open(path)
            .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

        Self::from_reader(file, mapping)
            .with_context(|| format!("Failed to read CSV header: {}", path.display()))
    }
}

impl<R: Read> AwardReader<R> {
    /// Wrap any reader producing CSV text with a header row
    pub fn from_reader(reader: R, mapping: &ColumnMapping) -> Result<Self> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = reader.headers()?.clone();
        let positions = ColumnPositions::resolve(&headers, mapping);

        Ok(AwardReader {
            records: reader.into_records(),
            positions,
        })
    }
}

impl<R: Read> Iterator for AwardReader<R> {
    type Item = Result<AwardRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.records.next()?;
        Some(
            row.map(|row| to_award(&row, &self.positions))
                .context("Failed to decode CSV row"),
        )
    }
}

fn to_award(row: &StringRecord, positions: &ColumnPositions) -> AwardRecord {
    let cell = |position: Option<usize>| position.and_then(|index| row.get(index));
    // Text cells are kept verbatim so descriptions reproduce the source exactly.
    let text = |position: Option<usize>| cell(position).unwrap_or("").to_string();

    let id = match cell(positions.id).map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => Uuid::new_v4().to_string(),
    };

    let award = AwardRecord {
        id,
        year_film: coerce_number(cell(positions.year_film)),
        year_ceremony: coerce_number(cell(positions.year_ceremony)),
        ceremony: text(positions.ceremony),
        category: text(positions.category),
        name: text(positions.name),
        film: text(positions.film),
        winner: parse_winner(cell(positions.winner)),
    };

    if !award.is_accepted() {
        debug!(
            "Row will be skipped: year_ceremony={}, name='{}', film='{}'",
            award.year_ceremony, award.name, award.film
        );
    }

    award
}
