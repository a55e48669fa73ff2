//! Guest record types
//!
//! The remote sheet labels its columns in Portuguese (`Nome`, `Respondeu`,
//! `Confirmado`, `Data`) but older rows and some deployments use the English
//! names. [`RawGuestRecord`] carries every key the remote may send and
//! [`RawGuestRecord::normalize`] folds them into a [`GuestRecord`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// A guest as the rest of the crate sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestRecord {
    pub id: i64,
    pub name: String,
    pub has_responded: bool,
    /// Only meaningful when `has_responded` is set; not enforced.
    pub is_attending: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_date: Option<String>,
}

/// Where a guest stands on the invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestStatus {
    Attending,
    Declined,
    Pending,
}

impl GuestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuestStatus::Attending => "attending",
            GuestStatus::Declined => "declined",
            GuestStatus::Pending => "pending",
        }
    }
}

impl std::fmt::Display for GuestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl GuestRecord {
    pub fn status(&self) -> GuestStatus {
        match (self.has_responded, self.is_attending) {
            (false, _) => GuestStatus::Pending,
            (true, true) => GuestStatus::Attending,
            (true, false) => GuestStatus::Declined,
        }
    }
}

/// Headcount over a fetched guest list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuestSummary {
    pub total: usize,
    pub attending: usize,
    pub declined: usize,
    pub pending: usize,
}

impl GuestSummary {
    pub fn from_guests(guests: &[GuestRecord]) -> Self {
        let mut summary = GuestSummary {
            total: guests.len(),
            ..Default::default()
        };
        for guest in guests {
            match guest.status() {
                GuestStatus::Attending => summary.attending += 1,
                GuestStatus::Declined => summary.declined += 1,
                GuestStatus::Pending => summary.pending += 1,
            }
        }
        summary
    }
}

/// Ids that occur more than once, in first-repeat order
pub fn duplicate_ids(guests: &[GuestRecord]) -> Vec<i64> {
    let mut seen = HashSet::new();
    let mut repeated = Vec::new();
    for guest in guests {
        if !seen.insert(guest.id) && !repeated.contains(&guest.id) {
            repeated.push(guest.id);
        }
    }
    repeated
}

// ============================================
// Raw wire shape
// ============================================

/// A boolean-ish cell value. Sheet-backed endpoints return checkboxes as
/// booleans, but hand-edited cells come back as numbers or text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Flag {
    /// `true`, non-zero numbers, and non-empty text other than "false"/"0"
    pub fn is_truthy(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Number(n) => *n != 0.0 && !n.is_nan(),
            Flag::Text(s) => {
                let s = s.trim();
                !(s.is_empty() || s.eq_ignore_ascii_case("false") || s == "0")
            }
        }
    }
}

/// Guest id as sent by the remote: a number, or a number in a string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(i64),
    Text(String),
}

/// A date cell: text as typed, or a raw number when the sheet stores the
/// date as a serial value. Numbers pass through as their decimal text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(serde_json::Number),
}

impl Cell {
    fn into_text(self) -> Option<String> {
        match self {
            Cell::Text(text) if text.is_empty() => None,
            Cell::Text(text) => Some(text),
            Cell::Number(n) => Some(n.to_string()),
        }
    }
}

/// One element of the remote `guests` array, every known key optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawGuestRecord {
    #[serde(default)]
    pub id: Option<RawId>,

    #[serde(rename = "Nome", default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "Respondeu", default)]
    pub respondeu: Option<Flag>,
    #[serde(rename = "hasResponded", default)]
    pub has_responded: Option<Flag>,

    #[serde(rename = "Confirmado", default)]
    pub confirmado: Option<Flag>,
    #[serde(rename = "isAttending", default)]
    pub is_attending: Option<Flag>,

    #[serde(rename = "Data", default)]
    pub data: Option<Cell>,
    #[serde(rename = "responseDate", default)]
    pub response_date: Option<Cell>,
}

/// Why a raw record could not become a [`GuestRecord`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("missing id")]
    MissingId,

    #[error("id is not an integer: {0:?}")]
    InvalidId(String),

    #[error("missing name (neither 'Nome' nor 'name' is set)")]
    MissingName,
}

impl RawGuestRecord {
    /// Fold localized and English keys into a canonical record.
    ///
    /// Each field is resolved on its own: the localized key wins when it holds
    /// a usable value, otherwise the English key is used.
    pub fn normalize(self) -> Result<GuestRecord, NormalizeError> {
        let id = match self.id {
            Some(RawId::Number(id)) => id,
            Some(RawId::Text(text)) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| NormalizeError::InvalidId(text))?,
            None => return Err(NormalizeError::MissingId),
        };

        let name = first_text(self.nome, self.name).ok_or(NormalizeError::MissingName)?;

        Ok(GuestRecord {
            id,
            name,
            has_responded: either_flag(self.respondeu.as_ref(), self.has_responded.as_ref()),
            is_attending: either_flag(self.confirmado.as_ref(), self.is_attending.as_ref()),
            response_date: self
                .data
                .and_then(Cell::into_text)
                .or_else(|| self.response_date.and_then(Cell::into_text)),
        })
    }
}

fn first_text(localized: Option<String>, english: Option<String>) -> Option<String> {
    localized
        .filter(|s| !s.is_empty())
        .or_else(|| english.filter(|s| !s.is_empty()))
}

fn either_flag(localized: Option<&Flag>, english: Option<&Flag>) -> bool {
    localized.map_or(false, Flag::is_truthy) || english.map_or(false, Flag::is_truthy)
}
