//! Two-Line Element (TLE) set parser.
//!
//! Parses standard NORAD/Space-Track TLE format (2-line and 3-line with name)
//! into a validated [`ElementSet`]. Supports batch parsing of multi-TLE files,
//! where a bad record only invalidates itself.
//!
//! # TLE Format Reference
//! ```text
//! Line 0 (optional): Satellite Name (up to 24 chars)
//! Line 1: 1 NNNNNC NNNNNAAA NNNNN.NNNNNNNN +.NNNNNNNN +NNNNN-N +NNNNN-N N NNNNN
//! Line 2: 2 NNNNN NNN.NNNN NNN.NNNN NNNNNNN NNN.NNNN NNN.NNNN NN.NNNNNNNNNNNNNN
//! ```
//!
//! # Example
//! ```
//! use conjunction_screen::tle;
//!
//! let record = "ISS (ZARYA)
//! 1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927
//! 2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";
//!
//! let elements = tle::parse(record).unwrap();
//! assert_eq!(elements.catalog_number(), 25544);
//! assert_eq!(elements.name(), Some("ISS (ZARYA)"));
//! ```

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::*;
use crate::elements::{ElementError, ElementFields, ElementSet};

/// Column count of a data line including the checksum digit.
const LINE_LEN: usize = 69;

/// TLE parsing errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TleError {
    #[error("record needs two data lines, found {0} non-empty lines")]
    MissingLines(usize),

    #[error("line {0} contains non-ASCII characters")]
    NonAscii(u8),

    #[error("first data line starts with '{0}' instead of '1'")]
    InvalidLine1Start(char),

    #[error("second data line starts with '{0}' instead of '2'")]
    InvalidLine2Start(char),

    #[error("line {line} has {len} columns, needs 69")]
    InvalidLineLength { line: u8, len: usize },

    #[error("catalog number {0} on line 1 but {1} on line 2")]
    NoradIdMismatch(u32, u32),

    #[error("line {line} checksum column holds '{found}', not a digit")]
    InvalidChecksumCharacter { line: u8, found: char },

    #[error("line {line} checksum digit is {expected} but the line sums to {computed}")]
    ChecksumFailed {
        line: u8,
        expected: u8,
        computed: u8,
    },

    #[error("bad number in {field}: {source}")]
    ParseField {
        field: &'static str,
        source: std::num::ParseFloatError,
    },

    #[error("bad integer in {field}: {source}")]
    ParseIntField {
        field: &'static str,
        source: std::num::ParseIntError,
    },

    #[error("bad implied-decimal value '{0}'")]
    ImpliedDecimal(String),

    #[error("epoch day {day} is not valid for {year}")]
    InvalidEpoch { year: u16, day: f64 },

    #[error("element values rejected: {0}")]
    InvalidElements(#[from] ElementError),

    #[error("input contains no element records")]
    Empty,
}

impl TleError {
    /// A checksum digit disagreed with the line contents.
    pub fn is_checksum(&self) -> bool {
        matches!(self, TleError::ChecksumFailed { .. })
    }

    /// The record is structurally unusable (anything but a checksum mismatch).
    pub fn is_malformed(&self) -> bool {
        !self.is_checksum()
    }
}

/// A decoded TLE in its native units (degrees, rev/day).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tle {
    /// Name line, when the record has one.
    pub name: Option<String>,
    /// NORAD catalog number.
    pub norad_id: u32,
    /// COSPAR designator, e.g. "98067A".
    pub intl_designator: String,
    /// Security classification letter, normally 'U'.
    pub classification: char,
    /// Four-digit epoch year.
    pub epoch_year: u16,
    /// Fractional day of year, 1.0 = Jan 1 00:00 UTC.
    pub epoch_day: f64,
    /// ṅ/2 (rev/day²).
    pub mean_motion_dot: f64,
    /// n̈/6 (rev/day³).
    pub mean_motion_ddot: f64,
    /// B* (1/earth radii).
    pub bstar: f64,
    pub ephemeris_type: u8,
    /// Element set number.
    pub element_set: u16,
    /// Degrees.
    pub inclination_deg: f64,
    /// Degrees.
    pub raan_deg: f64,
    pub eccentricity: f64,
    /// Degrees.
    pub arg_perigee_deg: f64,
    /// Degrees.
    pub mean_anomaly_deg: f64,
    /// Revolutions per day.
    pub mean_motion_rev_day: f64,
    pub rev_number: u32,
}

/// Parse one record (optional name line plus two data lines) into elements.
///
/// Blank lines and trailing whitespace are ignored.
pub fn parse(raw: &str) -> Result<ElementSet, TleError> {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();

    let tle = match lines.as_slice() {
        [line1, line2] => Tle::parse(line1, line2)?,
        [name, line1, line2, ..] if line1.starts_with('1') => Tle::parse_3line(name, line1, line2)?,
        [line1, line2, ..] => Tle::parse(line1, line2)?,
        other => return Err(TleError::MissingLines(other.len())),
    };
    tle.to_element_set()
}

/// Parse every record in a multi-TLE text.
///
/// Each record yields its own result so one corrupt entry does not hide the
/// others. Fails only when the text contains no recognizable record at all.
pub fn parse_batch(input: &str) -> Result<Vec<Result<ElementSet, TleError>>, TleError> {
    let records = split_records(input);
    if records.is_empty() {
        return Err(TleError::Empty);
    }
    Ok(records.iter().map(|r| parse(&r.to_text())).collect())
}

/// The raw lines of one record inside a multi-TLE text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    pub name: Option<&'a str>,
    pub line1: &'a str,
    pub line2: &'a str,
}

impl RawRecord<'_> {
    /// Catalog number from columns 3-7 of line 1, if readable.
    pub fn catalog_number(&self) -> Option<u32> {
        self.line1.get(2..7)?.trim().parse().ok()
    }

    /// Reassemble the record as newline-separated text.
    pub fn to_text(&self) -> String {
        match self.name {
            Some(name) => format!("{name}\n{}\n{}", self.line1, self.line2),
            None => format!("{}\n{}", self.line1, self.line2),
        }
    }
}

/// Split a multi-TLE text into records without validating them.
///
/// Handles mixed formats: lines starting with '1' followed by a line starting
/// with '2' form a 2-line record, any other non-empty line directly before such
/// a pair is taken as its name. Unrecognized lines are skipped.
pub fn split_records(input: &str) -> Vec<RawRecord<'_>> {
    let lines: Vec<&str> = input
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();

    let mut records = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].starts_with('1') && i + 1 < lines.len() && lines[i + 1].starts_with('2') {
            records.push(RawRecord { name: None, line1: lines[i], line2: lines[i + 1] });
            i += 2;
        } else if i + 2 < lines.len()
            && lines[i + 1].starts_with('1')
            && lines[i + 2].starts_with('2')
        {
            records.push(RawRecord {
                name: Some(lines[i].trim()),
                line1: lines[i + 1],
                line2: lines[i + 2],
            });
            i += 3;
        } else {
            log::debug!("skipping unrecognized TLE line: {:?}", lines[i]);
            i += 1;
        }
    }

    records
}

impl Tle {
    /// Decode a bare pair of data lines.
    pub fn parse(line1: &str, line2: &str) -> Result<Self, TleError> {
        Self::parse_with_name(None, line1, line2)
    }

    /// Decode a name line plus data lines.
    ///
    /// A leading `"0 "` marker, as used in 3LE catalog dumps, is stripped.
    pub fn parse_3line(line0: &str, line1: &str, line2: &str) -> Result<Self, TleError> {
        let name = line0.trim();
        let name = name.strip_prefix("0 ").unwrap_or(name).trim().to_string();
        Self::parse_with_name(Some(name), line1, line2)
    }

    fn parse_with_name(name: Option<String>, line1: &str, line2: &str) -> Result<Self, TleError> {
        let l1 = line1.trim();
        let l2 = line2.trim();

        if !l1.is_ascii() {
            return Err(TleError::NonAscii(1));
        }
        if !l2.is_ascii() {
            return Err(TleError::NonAscii(2));
        }
        if l1.len() < LINE_LEN {
            return Err(TleError::InvalidLineLength { line: 1, len: l1.len() });
        }
        if l2.len() < LINE_LEN {
            return Err(TleError::InvalidLineLength { line: 2, len: l2.len() });
        }

        let c1 = l1.as_bytes()[0] as char;
        let c2 = l2.as_bytes()[0] as char;
        if c1 != '1' {
            return Err(TleError::InvalidLine1Start(c1));
        }
        if c2 != '2' {
            return Err(TleError::InvalidLine2Start(c2));
        }

        verify_checksum(1, l1)?;
        verify_checksum(2, l2)?;

        // ── Line 1 ──
        let norad_id_1 = parse_int::<u32>(&l1[2..7], "norad_id (line 1)")?;
        let classification = l1.as_bytes()[7] as char;
        let intl_designator = l1[9..17].trim().to_string();

        let epoch_year_2d = parse_int::<u16>(&l1[18..20], "epoch_year")?;
        let epoch_year = if epoch_year_2d >= 57 {
            1900 + epoch_year_2d
        } else {
            2000 + epoch_year_2d
        };
        let epoch_day = parse_float(&l1[20..32], "epoch_day")?;
        let mean_motion_dot = parse_float(&l1[33..43], "mean_motion_dot")?;
        let mean_motion_ddot = parse_implied_decimal(&l1[44..52])?;
        let bstar = parse_implied_decimal(&l1[53..61])?;
        let ephemeris_type = l1[62..63].trim().parse::<u8>().unwrap_or(0);
        let element_set = l1[64..68].trim().parse::<u16>().unwrap_or(0);

        // ── Line 2 ──
        let norad_id_2 = parse_int::<u32>(&l2[2..7], "norad_id (line 2)")?;
        if norad_id_1 != norad_id_2 {
            return Err(TleError::NoradIdMismatch(norad_id_1, norad_id_2));
        }

        let inclination_deg = parse_float(&l2[8..16], "inclination")?;
        let raan_deg = parse_float(&l2[17..25], "raan")?;
        // Implied leading decimal point
        let eccentricity = parse_float(&format!("0.{}", l2[26..33].trim()), "eccentricity")?;
        let arg_perigee_deg = parse_float(&l2[34..42], "arg_perigee")?;
        let mean_anomaly_deg = parse_float(&l2[43..51], "mean_anomaly")?;
        let mean_motion_rev_day = parse_float(&l2[52..63], "mean_motion")?;
        let rev_number = l2[63..68].trim().parse::<u32>().unwrap_or(0);

        Ok(Tle {
            name,
            norad_id: norad_id_1,
            intl_designator,
            classification,
            epoch_year,
            epoch_day,
            mean_motion_dot,
            mean_motion_ddot,
            bstar,
            ephemeris_type,
            element_set,
            inclination_deg,
            raan_deg,
            eccentricity,
            arg_perigee_deg,
            mean_anomaly_deg,
            mean_motion_rev_day,
            rev_number,
        })
    }

    /// Epoch as a UTC instant.
    pub fn epoch(&self) -> Result<DateTime<Utc>, TleError> {
        let invalid = || TleError::InvalidEpoch { year: self.epoch_year, day: self.epoch_day };
        if !(1.0..367.0).contains(&self.epoch_day) {
            return Err(invalid());
        }
        let jan1 = Utc
            .with_ymd_and_hms(i32::from(self.epoch_year), 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(invalid)?;
        let offset_us = ((self.epoch_day - 1.0) * SOLAR_DAY * 1e6).round() as i64;
        Ok(jan1 + TimeDelta::microseconds(offset_us))
    }

    /// Convert to a validated element set (radians, rad/min).
    pub fn to_element_set(&self) -> Result<ElementSet, TleError> {
        let rev_day_to_rad_min = TAU / MINUTES_PER_DAY;
        let fields = ElementFields {
            catalog_number: self.norad_id,
            name: self.name.clone(),
            intl_designator: self.intl_designator.clone(),
            epoch: self.epoch()?,
            mean_motion_dot: self.mean_motion_dot * rev_day_to_rad_min / MINUTES_PER_DAY,
            mean_motion_ddot: self.mean_motion_ddot * rev_day_to_rad_min
                / (MINUTES_PER_DAY * MINUTES_PER_DAY),
            bstar: self.bstar,
            inclination: self.inclination_deg * DEG2RAD,
            raan: self.raan_deg * DEG2RAD,
            eccentricity: self.eccentricity,
            arg_perigee: self.arg_perigee_deg * DEG2RAD,
            mean_anomaly: self.mean_anomaly_deg * DEG2RAD,
            mean_motion: self.mean_motion_rev_day * rev_day_to_rad_min,
            rev_number: self.rev_number,
        };
        Ok(ElementSet::new(fields)?)
    }
}

fn parse_float(s: &str, field: &'static str) -> Result<f64, TleError> {
    s.trim().parse::<f64>().map_err(|source| TleError::ParseField { field, source })
}

fn parse_int<T>(s: &str, field: &'static str) -> Result<T, TleError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    s.trim().parse::<T>().map_err(|source| TleError::ParseIntField { field, source })
}

/// Decode an implied-decimal field with exponent, e.g. "-11606-4" is -0.11606e-4.
fn parse_implied_decimal(s: &str) -> Result<f64, TleError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0.0);
    }

    // Exponent sign is the last + or - that isn't the leading sign
    let exp_pos = s
        .char_indices()
        .skip(1)
        .filter(|&(_, c)| c == '+' || c == '-')
        .map(|(i, _)| i)
        .last();

    let (mantissa, exponent) = match exp_pos {
        Some(pos) => (&s[..pos], &s[pos..]),
        None => (s, "+0"),
    };

    let sign = if mantissa.starts_with('-') { "-" } else { "" };
    let digits = mantissa.trim_start_matches(['+', '-', ' ']);
    format!("{sign}0.{digits}e{exponent}")
        .parse::<f64>()
        .map_err(|_| TleError::ImpliedDecimal(s.to_string()))
}

fn verify_checksum(line: u8, text: &str) -> Result<(), TleError> {
    let found = text.as_bytes()[LINE_LEN - 1];
    let expected = match found {
        b'0'..=b'9' => found - b'0',
        _ => return Err(TleError::InvalidChecksumCharacter { line, found: found as char }),
    };
    let computed = compute_checksum(&text[..LINE_LEN - 1]);
    if expected != computed {
        return Err(TleError::ChecksumFailed { line, expected, computed });
    }
    Ok(())
}

/// Modulo-10 checksum: digits count at face value, each '-' counts 1.
pub fn compute_checksum(line: &str) -> u8 {
    let sum: u32 = line
        .bytes()
        .map(|b| match b {
            b'0'..=b'9' => u32::from(b - b'0'),
            b'-' => 1,
            _ => 0,
        })
        .sum();
    (sum % 10) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Datelike, Timelike};

    const ISS_LINE1: &str = "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
    const ISS_LINE2: &str = "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";
    const HST_LINE1: &str = "1 20580U 90037B   24001.50000000  .00000764  00000-0  34340-4 0  9991";
    const HST_LINE2: &str = "2 20580  28.4700 100.2000 0002500 300.0000  60.0000 15.09000000400006";

    #[test]
    fn test_parse_iss() {
        let tle = Tle::parse(ISS_LINE1, ISS_LINE2).unwrap();
        assert_eq!(tle.norad_id, 25544);
        assert_eq!(tle.epoch_year, 2008);
        assert_eq!(tle.intl_designator, "98067A");
        assert_relative_eq!(tle.epoch_day, 264.51782528, epsilon = 1e-8);
        assert_relative_eq!(tle.mean_motion_dot, -0.00002182, epsilon = 1e-12);
        assert_relative_eq!(tle.bstar, -0.11606e-4, epsilon = 1e-12);
        assert_relative_eq!(tle.inclination_deg, 51.6416, epsilon = 1e-4);
        assert_relative_eq!(tle.raan_deg, 247.4627, epsilon = 1e-4);
        assert_relative_eq!(tle.eccentricity, 0.0006703, epsilon = 1e-10);
        assert_relative_eq!(tle.mean_anomaly_deg, 325.0288, epsilon = 1e-4);
        assert_relative_eq!(tle.mean_motion_rev_day, 15.72125391, epsilon = 1e-8);
        assert_eq!(tle.rev_number, 56353);
    }

    #[test]
    fn test_epoch_conversion() {
        let tle = Tle::parse(ISS_LINE1, ISS_LINE2).unwrap();
        let epoch = tle.epoch().unwrap();
        // Day 264 of 2008 (leap year) is 20 September
        assert_eq!((epoch.year(), epoch.month(), epoch.day()), (2008, 9, 20));
        assert_eq!((epoch.hour(), epoch.minute()), (12, 25));
    }

    #[test]
    fn test_parse_record_with_name() {
        let record = format!("ISS (ZARYA)\n{ISS_LINE1}\n{ISS_LINE2}\n");
        let set = parse(&record).unwrap();
        assert_eq!(set.name(), Some("ISS (ZARYA)"));
        assert_relative_eq!(set.mean_motion_rev_day(), 15.72125391, epsilon = 1e-8);
        assert_relative_eq!(set.inclination() * RAD2DEG, 51.6416, epsilon = 1e-9);
    }

    #[test]
    fn test_parse_record_without_name() {
        let set = parse(&format!("{ISS_LINE1}\n{ISS_LINE2}")).unwrap();
        assert_eq!(set.name(), None);
        assert_eq!(set.display_name(), "NORAD 25544");
    }

    #[test]
    fn test_3le_name_marker_stripped() {
        let tle = Tle::parse_3line("0 ISS (ZARYA)", ISS_LINE1, ISS_LINE2).unwrap();
        assert_eq!(tle.name.as_deref(), Some("ISS (ZARYA)"));
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let corrupted = ISS_LINE2.replace("51.6416", "51.6417");
        let err = Tle::parse(ISS_LINE1, &corrupted).unwrap_err();
        assert!(err.is_checksum(), "got {err}");
        assert!(matches!(err, TleError::ChecksumFailed { line: 2, expected: 7, computed: 8 }));
    }

    #[test]
    fn test_short_input_is_malformed() {
        let err = parse(ISS_LINE1).unwrap_err();
        assert_eq!(err, TleError::MissingLines(1));
        assert!(err.is_malformed());

        let err = Tle::parse(&ISS_LINE1[..60], ISS_LINE2).unwrap_err();
        assert_eq!(err, TleError::InvalidLineLength { line: 1, len: 60 });

        assert_eq!(parse("").unwrap_err(), TleError::MissingLines(0));
    }

    #[test]
    fn test_non_digit_checksum_is_malformed() {
        let line = format!("{}X", &ISS_LINE1[..68]);
        let err = Tle::parse(&line, ISS_LINE2).unwrap_err();
        assert_eq!(err, TleError::InvalidChecksumCharacter { line: 1, found: 'X' });
        assert!(err.is_malformed());
    }

    #[test]
    fn test_swapped_lines_rejected() {
        let err = Tle::parse(ISS_LINE2, ISS_LINE1).unwrap_err();
        assert_eq!(err, TleError::InvalidLine1Start('2'));
    }

    #[test]
    fn test_norad_mismatch() {
        let err = Tle::parse(ISS_LINE1, HST_LINE2).unwrap_err();
        assert_eq!(err, TleError::NoradIdMismatch(25544, 20580));
    }

    #[test]
    fn test_parse_batch_isolates_bad_records() {
        let corrupted = HST_LINE2.replace("28.4700", "28.4701");
        let input = format!("ISS (ZARYA)\n{ISS_LINE1}\n{ISS_LINE2}\nHUBBLE\n{HST_LINE1}\n{corrupted}\n");
        let results = parse_batch(&input).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().catalog_number(), 25544);
        assert!(results[1].as_ref().unwrap_err().is_checksum());
    }

    #[test]
    fn test_parse_batch_empty() {
        assert_eq!(parse_batch("\n\n  \n").unwrap_err(), TleError::Empty);
    }

    #[test]
    fn test_split_records_mixed_formats() {
        let input = format!("{ISS_LINE1}\n{ISS_LINE2}\nHUBBLE\n{HST_LINE1}\n{HST_LINE2}\n");
        let records = split_records(&input);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, None);
        assert_eq!(records[0].catalog_number(), Some(25544));
        assert_eq!(records[1].name, Some("HUBBLE"));
        assert_eq!(records[1].catalog_number(), Some(20580));
    }

    #[test]
    fn test_implied_decimal() {
        assert_relative_eq!(parse_implied_decimal("10270-3").unwrap(), 0.10270e-3, epsilon = 1e-12);
        assert_relative_eq!(parse_implied_decimal("00000-0").unwrap(), 0.0, epsilon = 1e-15);
        assert_relative_eq!(parse_implied_decimal("-11606-4").unwrap(), -0.11606e-4, epsilon = 1e-12);
        assert_relative_eq!(parse_implied_decimal(" 16538-4").unwrap(), 0.16538e-4, epsilon = 1e-12);
        assert_relative_eq!(parse_implied_decimal("+13844-3").unwrap(), 0.13844e-3, epsilon = 1e-12);
        assert!(parse_implied_decimal("ab-3").is_err());
    }

    #[test]
    fn test_checksum() {
        assert_eq!(compute_checksum(&ISS_LINE1[..68]), 7);
        assert_eq!(compute_checksum(&ISS_LINE2[..68]), 7);
    }
}
