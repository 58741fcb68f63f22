use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Export has no header line")]
    MissingHeader,
    #[error("Export has no title column (looked for {0})")]
    NoTitleColumn(String),
}

/// Columns we understand in a Rekordbox "Export playlist to .txt" file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Artist,
    Key,
    Bpm,
    Duration,
    Genre,
    Location,
}

/// Header name → field. For fields with several aliases the earlier alias
/// wins when a row has values under both.
const HEADER_ALIASES: &[(&str, Field)] = &[
    ("Track Title", Field::Title),
    ("Title", Field::Title),
    ("Name", Field::Title),
    ("Spårtitel", Field::Title),
    ("SpÃ¥rtitel", Field::Title), // Swedish header read through the wrong codepage
    ("Artist", Field::Artist),
    ("Key", Field::Key),
    ("Tonalitet", Field::Key),
    ("BPM", Field::Bpm),
    ("Tempo", Field::Bpm),
    ("Time", Field::Duration),
    ("Duration", Field::Duration),
    ("Tid", Field::Duration),
    ("Genre", Field::Genre),
    ("Location", Field::Location),
];

/// A row of the export, ready to be stored as a track.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportedTrack {
    pub title: String,
    pub artist: String,
    pub bpm: Option<f64>,
    pub key: Option<String>,
    pub duration_seconds: Option<i64>,
    pub genre: Option<String>,
    pub location: Option<String>,
}

/// Column indexes for each field, in alias priority order.
struct ColumnMap {
    columns: Vec<(Field, Vec<usize>)>,
}

impl ColumnMap {
    fn from_header(header: &str) -> Self {
        let names: Vec<&str> = header.split('\t').map(str::trim).collect();
        let mut columns: Vec<(Field, Vec<usize>)> = Vec::new();

        for (alias, field) in HEADER_ALIASES {
            let Some(idx) = names.iter().position(|n| n == alias) else {
                continue;
            };
            match columns.iter_mut().find(|(f, _)| f == field) {
                Some((_, idxs)) => idxs.push(idx),
                None => columns.push((*field, vec![idx])),
            }
        }
        Self { columns }
    }

    fn has(&self, field: Field) -> bool {
        self.columns.iter().any(|(f, _)| *f == field)
    }

    /// First non-empty cell among the field's columns.
    fn get<'a>(&self, cells: &[&'a str], field: Field) -> Option<&'a str> {
        let (_, idxs) = self.columns.iter().find(|(f, _)| *f == field)?;
        idxs.iter()
            .filter_map(|&i| cells.get(i).copied().map(str::trim))
            .find(|c| !c.is_empty())
    }
}

/// Parse the text of a tab-delimited export. Rows without a title are dropped.
pub fn parse_export(content: &str) -> Result<Vec<ImportedTrack>, ImportError> {
    let mut lines = content.lines();
    let header = lines
        .by_ref()
        .find(|l| !l.trim().is_empty())
        .ok_or(ImportError::MissingHeader)?;
    let map = ColumnMap::from_header(header);
    if !map.has(Field::Title) {
        let expected: Vec<&str> = HEADER_ALIASES
            .iter()
            .filter(|(_, f)| *f == Field::Title)
            .map(|(a, _)| *a)
            .collect();
        return Err(ImportError::NoTitleColumn(expected.join(", ")));
    }

    let mut tracks = Vec::new();
    for (n, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split('\t').collect();
        let Some(title) = map.get(&cells, Field::Title) else {
            log::debug!("Row {} has no title, dropping", n + 2);
            continue;
        };

        let text = |field| map.get(&cells, field).map(str::to_string);
        tracks.push(ImportedTrack {
            title: title.to_string(),
            artist: text(Field::Artist).unwrap_or_default(),
            bpm: map.get(&cells, Field::Bpm).and_then(parse_bpm),
            key: text(Field::Key),
            duration_seconds: map.get(&cells, Field::Duration).and_then(parse_duration),
            genre: text(Field::Genre),
            location: text(Field::Location),
        });
    }

    Ok(tracks)
}

/// Read and parse an export file from disk.
pub fn read_export(path: &Path) -> Result<Vec<ImportedTrack>, ImportError> {
    let bytes = std::fs::read(path)?;
    parse_export(&decode_export(&bytes))
}

/// Decode export bytes. Rekordbox writes UTF-16LE with a BOM; UTF-8 and
/// BOM-less UTF-16LE show up after the file has been edited elsewhere.
/// Anything that is neither is read as Windows-1252.
pub fn decode_export(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes);
    }
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    if looks_like_utf16le(bytes) {
        return decode_utf16(bytes, u16::from_le_bytes);
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            log::debug!("Export is not UTF-8, reading as Windows-1252");
            bytes.iter().map(|&b| cp1252_char(b)).collect()
        }
    }
}

/// The header line is ASCII, so in UTF-16LE its odd bytes are all NUL.
/// Only the leading bytes are checked; titles further down may use any script.
fn looks_like_utf16le(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(64) & !1];
    head.len() >= 2
        && head.iter().skip(1).step_by(2).all(|&b| b == 0)
        && head.iter().step_by(2).any(|&b| b != 0)
}

/// Windows-1252 differs from Latin-1 only in 0x80-0x9F.
const CP1252_HIGH: [char; 32] = [
    '€', '\u{81}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{8D}', 'Ž', '\u{8F}',
    '\u{90}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', '\u{9D}', 'ž', 'Ÿ',
];

fn cp1252_char(b: u8) -> char {
    match b {
        0x80..=0x9F => CP1252_HIGH[usize::from(b - 0x80)],
        _ => char::from(b),
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// "128", "128.00" or "128,00".
fn parse_bpm(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse::<f64>().ok().filter(|b| b.is_finite())
}

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+):)?(\d+):(\d+)$").expect("duration pattern is valid")
});

/// "MM:SS" or "HH:MM:SS" → seconds.
fn parse_duration(raw: &str) -> Option<i64> {
    let caps = DURATION_RE.captures(raw.trim())?;
    let part = |i: usize| -> Option<i64> {
        caps.get(i).map_or(Some(0), |m| m.as_str().parse().ok())
    };
    Some(part(1)? * 3600 + part(2)? * 60 + part(3)?)
}
