//! Patent record loading from a CSV corpus file.
//!
//! Column headers are matched after trimming and lowercasing, so
//! " Title " and "ABSTRACT" both resolve. Missing required columns fail
//! the whole load before any embedding work; missing cell values never
//! drop a row, they become empty strings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const TITLE_COLUMN: &str = "title";
pub const ABSTRACT_COLUMN: &str = "abstract";
pub const PUBLICATION_COLUMN: &str = "publication_number";
pub const ASSIGNEE_COLUMN: &str = "assignee";
pub const COUNTRY_COLUMN: &str = "country";

/// Placeholder identifier when the corpus has no publication number column
/// or the cell is empty.
pub const MISSING_IDENTIFIER: &str = "N/A";

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("corpus is missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatentRecord {
    pub publication_number: String,

    pub title: String,

    #[serde(rename = "abstract")]
    pub abstract_text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// Drawing lookup URL derived from the publication number, when an
    /// image base is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl PatentRecord {
    pub fn has_identifier(&self) -> bool {
        self.publication_number != MISSING_IDENTIFIER
    }
}

/// Map of normalized header name -> column position.
///
/// The first occurrence wins when a file repeats a header.
fn column_positions(headers: &csv::StringRecord) -> HashMap<String, usize> {
    let mut columns = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        columns.entry(name.trim().to_lowercase()).or_insert(idx);
    }
    columns
}

/// Derive `{base}/{publication_number}.png`.
fn image_url_for(image_base: &str, publication_number: &str) -> String {
    format!(
        "{}/{}.png",
        image_base.trim_end_matches('/'),
        publication_number
    )
}

/// Load the patent corpus from a CSV file, preserving row order.
///
/// Required columns: `title`, `abstract`. Recognized optional columns:
/// `publication_number`, `assignee`, `country`. Pure transform of the file
/// into records; the only derivation is the image lookup URL when
/// `image_base` is configured.
pub fn load_records(
    path: &Path,
    image_base: Option<&str>,
) -> Result<Vec<PatentRecord>, LoadError> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns = column_positions(reader.headers()?);

    let missing: Vec<String> = [TITLE_COLUMN, ABSTRACT_COLUMN]
        .iter()
        .filter(|name| !columns.contains_key(**name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::MissingColumns(missing));
    }

    let field = |row: &csv::StringRecord, name: &str| -> Option<String> {
        columns
            .get(name)
            .and_then(|&idx| row.get(idx))
            .map(|value| value.to_string())
    };

    let mut records = vec![];
    for row in reader.records() {
        let row = row?;

        let title = field(&row, TITLE_COLUMN).unwrap_or_default();
        let abstract_text = field(&row, ABSTRACT_COLUMN).unwrap_or_default();

        let publication_number = field(&row, PUBLICATION_COLUMN)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| MISSING_IDENTIFIER.to_string());

        let assignee = field(&row, ASSIGNEE_COLUMN).filter(|value| !value.is_empty());
        let country = field(&row, COUNTRY_COLUMN).filter(|value| !value.is_empty());

        let image_url = match image_base {
            Some(base) if publication_number != MISSING_IDENTIFIER => {
                Some(image_url_for(base, &publication_number))
            }
            _ => None,
        };

        records.push(PatentRecord {
            publication_number,
            title,
            abstract_text,
            assignee,
            country,
            image_url,
        });
    }

    log::debug!("loaded {} patent records from {}", records.len(), path.display());

    Ok(records)
}
