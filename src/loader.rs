use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info, warn};
use reqwest::Client;
use zip::ZipArchive;

use crate::error::LoadError;
use crate::exchange_rate::DATE_FORMAT;
use crate::rate_table::RateTable;

pub const ECB_HISTORY_URL: &str = "https://www.ecb.europa.eu/stats/eurofxref/eurofxref-hist.zip";

const DATE_COLUMN: &str = "Date";
const MISSING_MARKERS: [&str; 5] = ["", "N/A", "NA", "NaN", "-"];

#[derive(Debug, Clone, PartialEq)]
pub enum SourceLocation {
    Url(String),
    File(PathBuf),
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Where the zipped rate history comes from. One attempt per `load`.
#[derive(Debug, Clone)]
pub struct RateSource {
    client: Client,
    location: SourceLocation,
}

impl RateSource {
    pub fn new(location: SourceLocation, timeout: Duration) -> Result<Self, LoadError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::unavailable(location.to_string(), e))?;

        Ok(Self { client, location })
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub async fn load(&self) -> Result<RateTable, LoadError> {
        let archive = self.fetch().await?;
        let table = parse_archive(&archive)?;
        if table.is_empty() {
            warn!("Rate source {} has no dates", self.location);
        }

        info!(
            "Loaded {} dates for {} currencies from {} ({} .. {})",
            table.len(),
            table.currencies().len(),
            self.location,
            table.first_date().map(|d| d.to_string()).unwrap_or_default(),
            table.last_date().map(|d| d.to_string()).unwrap_or_default(),
        );

        Ok(table)
    }

    async fn fetch(&self) -> Result<Vec<u8>, LoadError> {
        match &self.location {
            SourceLocation::Url(url) => load_zip(&self.client, url).await,
            SourceLocation::File(path) => tokio::fs::read(path)
                .await
                .map_err(|e| LoadError::unavailable(path.display().to_string(), e)),
        }
    }
}

async fn load_zip(client: &Client, url: &str) -> Result<Vec<u8>, LoadError> {
    debug!("Downloading {}", url);
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| LoadError::unavailable(url, e))?;
    if !resp.status().is_success() {
        return Err(LoadError::unavailable(
            url,
            format!("can't download the file: {}", resp.status()),
        ));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| LoadError::unavailable(url, e))?;

    Ok(bytes.to_vec())
}

pub fn parse_archive(archive: &[u8]) -> Result<RateTable, LoadError> {
    let csv = extract_single_file(archive)?;
    parse_csv(&csv)
}

/// Contents of the only file in a ZIP archive. Directory entries don't count.
pub fn extract_single_file(archive: &[u8]) -> Result<Vec<u8>, LoadError> {
    let mut archive = ZipArchive::new(Cursor::new(archive))?;

    let mut found: Option<(String, Vec<u8>)> = None;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        if let Some((first, _)) = &found {
            return Err(LoadError::malformed(format!(
                "expected a single file in archive, found {} and {}",
                first,
                file.name()
            )));
        }

        let name = file.name().to_string();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .map_err(|e| LoadError::malformed(format!("failed to read {name}: {e}")))?;
        found = Some((name, contents));
    }

    let (name, contents) = found.ok_or(LoadError::malformed("archive contains no files"))?;
    debug!("Extracted {} ({} bytes)", name, contents.len());

    Ok(contents)
}

fn is_currency_code(name: &str) -> bool {
    name.len() == 3 && name.bytes().all(|b| b.is_ascii_uppercase())
}

/// Parses `Date,USD,JPY,...` rows. Only the date column and three-letter
/// uppercase currency columns are kept.
pub fn parse_csv(data: &[u8]) -> Result<RateTable, LoadError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data);

    let headers = rdr.headers()?.clone();
    let date_idx = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(DATE_COLUMN))
        .ok_or(LoadError::malformed("missing Date column"))?;

    let mut currency_columns: Vec<(usize, String)> = Vec::new();
    for (idx, name) in headers.iter().enumerate() {
        if idx == date_idx {
            continue;
        }
        if is_currency_code(name) {
            currency_columns.push((idx, name.to_string()));
        } else {
            debug!("Dropping column {} ({:?})", idx, name);
        }
    }
    if currency_columns.is_empty() {
        return Err(LoadError::malformed("no currency columns"));
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(parse_row(&record, date_idx, &currency_columns)?);
    }

    let currencies = currency_columns.into_iter().map(|(_, code)| code).collect();
    Ok(RateTable::new(currencies, rows)?)
}

fn parse_row(
    record: &StringRecord,
    date_idx: usize,
    currency_columns: &[(usize, String)],
) -> Result<(NaiveDate, Vec<Option<f64>>), LoadError> {
    let line = record.position().map(|p| p.line()).unwrap_or_default();

    let date_str = record.get(date_idx).unwrap_or_default();
    let date = NaiveDate::parse_from_str(date_str, DATE_FORMAT).map_err(|_| {
        LoadError::malformed(format!("line {line}: invalid date {date_str:?}"))
    })?;

    let mut cells = Vec::with_capacity(currency_columns.len());
    for (idx, code) in currency_columns {
        let raw = record.get(*idx).unwrap_or_default();
        if MISSING_MARKERS.contains(&raw) {
            cells.push(None);
            continue;
        }
        let value = raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| LoadError::malformed(format!("line {line}: invalid {code} rate {raw:?}")))?;
        cells.push(Some(value));
    }

    Ok((date, cells))
}
