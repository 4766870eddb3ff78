// Parameter set configuration and metadata
//
// Textual form: `LEVEL (',' LEVEL)* (':' AUXSIZE)?` with
// `LEVEL := HEIGHT ('/' WIDTH)?`, e.g. "20/8,10/8:8740".

use std::fmt;
use std::str::FromStr;

use hss_types::{LmotsAlgorithm, LmsAlgorithm, Typecode, MAX_LEVELS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine;
use crate::hss::{aux, leaf, state};

/// Parameter string used by `genkey` when none is given
pub const DEFAULT_PARAMETERS: &str = "20/8,10/8";

/// Winternitz width of a level written without `/WIDTH`
pub const DEFAULT_WIDTH: u32 = 8;

/// Aux data budget when the `:AUXSIZE` clause is omitted
pub const DEFAULT_AUX_BUDGET: usize = 8740;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("expected height of Merkle tree at position {position}")]
    MissingHeight { position: usize },

    #[error("unsupported Merkle tree height {value} (supported: 5, 10, 15, 20, 25)")]
    UnsupportedHeight { value: String },

    #[error("expected Winternitz parameter at position {position}")]
    MissingWidth { position: usize },

    #[error("unsupported Winternitz parameter {value} (supported: 1, 2, 4, 8)")]
    UnsupportedWidth { value: String },

    #[error("{count} levels specified, at most {MAX_LEVELS} are supported")]
    TooManyLevels { count: usize },

    #[error("expected aux data size at position {position}")]
    MissingAuxSize { position: usize },

    #[error("unsupported aux data size {value}")]
    UnsupportedAuxSize { value: String },

    #[error("unexpected '{found}' at position {position}")]
    UnexpectedChar { found: char, position: usize },
}

/// One Merkle tree level of the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub lms: LmsAlgorithm,
    pub ots: LmotsAlgorithm,
}

impl Level {
    pub fn new(height: u32, width: u32) -> Result<Self, ParameterError> {
        let lms = LmsAlgorithm::from_height(height).ok_or_else(|| ParameterError::UnsupportedHeight {
            value: height.to_string(),
        })?;
        let ots = LmotsAlgorithm::from_width(width).ok_or_else(|| ParameterError::UnsupportedWidth {
            value: width.to_string(),
        })?;
        Ok(Self { lms, ots })
    }

    pub fn height(&self) -> u32 {
        self.lms.height()
    }

    pub fn width(&self) -> u32 {
        self.ots.width()
    }

    /// One-byte encoding used in the private key state: `(lms << 4) | ots`.
    pub fn code(&self) -> u8 {
        ((self.lms.typecode() << 4) | self.ots.typecode()) as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(Self {
            lms: LmsAlgorithm::from_typecode(u32::from(code >> 4))?,
            ots: LmotsAlgorithm::from_typecode(u32::from(code & 0x0f))?,
        })
    }

    fn parse(height: &str, width: Option<&str>) -> Result<Self, ParameterError> {
        let height_value = height.parse::<u32>().map_err(|_| ParameterError::UnsupportedHeight {
            value: height.to_string(),
        })?;
        let width_value = match width {
            Some(text) => text.parse::<u32>().map_err(|_| ParameterError::UnsupportedWidth {
                value: text.to_string(),
            })?,
            None => DEFAULT_WIDTH,
        };
        Self::new(height_value, width_value)
    }
}

/// Layered tree configuration of a key
///
/// Serialized in its textual form so stored metadata stays readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParameterSet {
    levels: Vec<Level>,
    aux_budget: usize,
}

impl ParameterSet {
    pub fn new(levels: Vec<Level>, aux_budget: usize) -> Result<Self, ParameterError> {
        if levels.is_empty() {
            return Err(ParameterError::MissingHeight { position: 0 });
        }
        if levels.len() > MAX_LEVELS {
            return Err(ParameterError::TooManyLevels { count: levels.len() });
        }
        Ok(Self { levels, aux_budget })
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Byte budget for the accelerator cache; 0 disables it.
    pub fn aux_budget(&self) -> usize {
        self.aux_budget
    }

    pub fn total_height(&self) -> u32 {
        self.levels.iter().map(Level::height).sum()
    }

    /// Number of signatures the key can produce.
    ///
    /// Saturates at `u64::MAX` once the total height reaches 64 bits.
    pub fn capacity(&self) -> u64 {
        leaf::capacity(&self.levels)
    }

    pub fn public_key_len(&self) -> usize {
        engine::public_key_len()
    }

    pub fn signature_len(&self) -> usize {
        engine::signature_len(&self.levels)
    }

    pub fn private_key_len(&self) -> usize {
        state::STATE_LEN
    }

    /// Length of the accelerator cache written at generation, 0 if none.
    pub fn aux_len(&self) -> usize {
        aux::stored_height(self.levels[0].height(), self.aux_budget)
            .map(|height| aux::encoded_len(self.levels[0].height(), height))
            .unwrap_or(0)
    }

    /// Human readable listing, one line per level.
    pub fn describe(&self) -> String {
        let mut out = format!(
            "Parameter set: {} level(s) of Merkle trees\n",
            self.levels.len()
        );
        for (i, level) in self.levels.iter().enumerate() {
            out.push_str(&format!(
                "Level {}: hash function = SHA-256; {} level Merkle tree; Winternitz param {}\n",
                i,
                level.height(),
                level.width()
            ));
        }
        if self.aux_budget > 0 {
            out.push_str(&format!("Maximum of {} bytes of aux data\n", self.aux_budget));
        } else {
            out.push_str("Aux data disabled\n");
        }
        out
    }
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn digits(&mut self) -> Option<&'a str> {
        let rest = &self.text[self.pos..];
        let len = rest.bytes().take_while(u8::is_ascii_digit).count();
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn unexpected(&self, found: char) -> ParameterError {
        ParameterError::UnexpectedChar {
            found,
            position: self.pos,
        }
    }
}

impl FromStr for ParameterSet {
    type Err = ParameterError;

    /// Parse a parameter string. Nothing is returned unless the whole
    /// string is valid.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cursor = Cursor { text: s, pos: 0 };
        let mut levels = Vec::new();
        let mut aux_budget = DEFAULT_AUX_BUDGET;

        loop {
            if levels.len() == MAX_LEVELS {
                return Err(ParameterError::TooManyLevels {
                    count: MAX_LEVELS + 1,
                });
            }

            let position = cursor.pos;
            let height = cursor
                .digits()
                .ok_or(ParameterError::MissingHeight { position })?;

            let mut width = None;
            if cursor.peek() == Some('/') {
                cursor.bump();
                let position = cursor.pos;
                width = Some(
                    cursor
                        .digits()
                        .ok_or(ParameterError::MissingWidth { position })?,
                );
            }
            levels.push(Level::parse(height, width)?);

            match cursor.peek() {
                None => break,
                Some(',') => {
                    cursor.bump();
                }
                Some(':') => {
                    cursor.bump();
                    let position = cursor.pos;
                    let text = cursor
                        .digits()
                        .ok_or(ParameterError::MissingAuxSize { position })?;
                    aux_budget = text.parse().map_err(|_| ParameterError::UnsupportedAuxSize {
                        value: text.to_string(),
                    })?;
                    if let Some(c) = cursor.peek() {
                        return Err(cursor.unexpected(c));
                    }
                    break;
                }
                Some(c) => return Err(cursor.unexpected(c)),
            }
        }

        Self::new(levels, aux_budget)
    }
}

/// `HEIGHT/WIDTH` of every level, comma separated, without an aux clause.
pub fn format_levels(levels: &[Level]) -> String {
    levels
        .iter()
        .map(|level| format!("{}/{}", level.height(), level.width()))
        .collect::<Vec<_>>()
        .join(",")
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", format_levels(&self.levels), self.aux_budget)
    }
}

impl TryFrom<String> for ParameterSet {
    type Error = ParameterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ParameterSet> for String {
    fn from(params: ParameterSet) -> Self {
        params.to_string()
    }
}
