/**
 * Album folder name parsing
 *
 * Exported album folders are named `<area> - <street>, <year>年<month>月<day>日`,
 * with area and street optional. The date part normalizes to `YYYY-MM-DD`.
 */

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::error::{OrganizeError, Result};

static FOLDER_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?<area>.* - )?(?<street>.*, )?(?<date>.*)$").expect("valid folder name regex")
});

static DATE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?<year>[0-9]+)年(?<month>[0-9]+)月(?<day>[0-9]+)日").expect("valid date regex")
});

/// Components of an album folder name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFolderName {
    pub area: Option<String>,
    pub street: Option<String>,
    pub date_token: String,
}

/// Calendar date taken from a folder name. Month and day are range-checked
/// but not validated against the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResolvedDate {
    pub year: u32,
    pub month: u32,
    pub day: u32,
}

impl ResolvedDate {
    /// Extract the date from a token such as `2021年3月9日`.
    pub fn from_token(token: &str) -> Result<Self> {
        let caps = DATE_TOKEN_RE
            .captures(token)
            .ok_or_else(|| OrganizeError::NoDateMatch(token.to_string()))?;

        let number = |name: &str| -> Result<u32> {
            caps[name].parse().map_err(|e| OrganizeError::DateOutOfRange {
                token: token.to_string(),
                detail: format!("{}: {}", name, e),
            })
        };

        let date = Self {
            year: number("year")?,
            month: number("month")?,
            day: number("day")?,
        };

        if !(1..=12).contains(&date.month) {
            return Err(OrganizeError::DateOutOfRange {
                token: token.to_string(),
                detail: format!("month {}", date.month),
            });
        }
        if !(1..=31).contains(&date.day) {
            return Err(OrganizeError::DateOutOfRange {
                token: token.to_string(),
                detail: format!("day {}", date.day),
            });
        }

        Ok(date)
    }
}

impl fmt::Display for ResolvedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Split a folder name into area, street and date token.
pub fn parse_folder_name(name: &str) -> Option<ParsedFolderName> {
    let caps = FOLDER_NAME_RE.captures(name)?;

    let segment = |group: &str, separator: &str| {
        caps.name(group)
            .map(|m| m.as_str().trim_end_matches(separator).to_string())
    };

    Some(ParsedFolderName {
        area: segment("area", " - "),
        street: segment("street", ", "),
        date_token: caps["date"].to_string(),
    })
}

/// Parse a folder name all the way to its date.
pub fn resolve_folder_name(name: &str) -> Result<(ParsedFolderName, ResolvedDate)> {
    let parsed =
        parse_folder_name(name).ok_or_else(|| OrganizeError::NoDateMatch(name.to_string()))?;
    let date = ResolvedDate::from_token(&parsed.date_token)?;
    Ok((parsed, date))
}
