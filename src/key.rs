use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Unrecognized key: {0:?}")]
    Unrecognized(String),
}

/// Minor (A) or major (B) side of the Camelot wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mode {
    A,
    B,
}

impl Mode {
    fn letter(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
        }
    }
}

/// A position on the Camelot wheel: number 1-12 plus letter A/B.
///
/// The fields are private so every value in circulation is one of the 24
/// valid positions. Build one with [`HarmonicKey::new`] or by parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HarmonicKey {
    number: u8,
    mode: Mode,
}

impl HarmonicKey {
    pub fn new(number: u8, mode: Mode) -> Option<Self> {
        (1..=12).contains(&number).then_some(Self { number, mode })
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// All 24 keys in wheel order: 1A, 1B, 2A, ... 12B.
    pub fn all() -> impl Iterator<Item = HarmonicKey> {
        (1..=12u8).flat_map(|n| [Mode::A, Mode::B].map(|mode| HarmonicKey { number: n, mode }))
    }

    /// Whether two keys mix cleanly.
    ///
    /// Compatible when the keys are identical, share a number (relative
    /// major/minor), or share a letter and sit next to each other on the
    /// wheel (12 and 1 are neighbours).
    pub fn is_compatible(&self, other: &HarmonicKey) -> bool {
        if self.number == other.number {
            return true;
        }
        if self.mode != other.mode {
            return false;
        }
        let diff = self.number.abs_diff(other.number);
        diff == 1 || diff == 11
    }

    /// The four keys that mix with this one, in wheel order.
    pub fn compatible_keys(&self) -> Vec<HarmonicKey> {
        HarmonicKey::all().filter(|k| self.is_compatible(k)).collect()
    }

    /// Parse standard notation ("Am", "F#", "Dbm", "Bbmin") onto the wheel.
    fn from_musical(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let base: i32 = match chars.next()?.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };
        let rest = chars.as_str();
        let (pitch, rest) = if let Some(r) = rest.strip_prefix(['#', '♯']) {
            (base + 1, r)
        } else if let Some(r) = rest.strip_prefix(['b', '♭']) {
            (base - 1, r)
        } else {
            (base, rest)
        };
        let minor = match rest.to_ascii_lowercase().as_str() {
            "" | "maj" | "major" => false,
            "m" | "min" | "minor" => true,
            _ => return None,
        };

        // A minor key sits on the same number as its relative major, three semitones up.
        let major_pitch = if minor { pitch + 3 } else { pitch }.rem_euclid(12);
        // Each step round the wheel is a fifth (7 semitones); C major is 8B.
        let number = ((major_pitch * 7 + 7) % 12 + 1) as u8;
        let mode = if minor { Mode::A } else { Mode::B };
        Some(Self { number, mode })
    }

    fn from_camelot(s: &str) -> Option<Self> {
        let mode = match s.chars().last()?.to_ascii_uppercase() {
            'A' => Mode::A,
            'B' => Mode::B,
            _ => return None,
        };
        let digits = &s[..s.len() - 1];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let number: u8 = digits.parse().ok()?;
        Self::new(number, mode)
    }
}

impl fmt::Display for HarmonicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, self.mode.letter())
    }
}

impl FromStr for HarmonicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::from_camelot(trimmed)
            .or_else(|| Self::from_musical(trimmed))
            .ok_or_else(|| KeyError::Unrecognized(s.to_string()))
    }
}

impl TryFrom<String> for HarmonicKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HarmonicKey> for String {
    fn from(key: HarmonicKey) -> Self {
        key.to_string()
    }
}
