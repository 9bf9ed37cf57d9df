//! Timestamp canonicalization.
//!
//! Filenames carry a local date/time token (`2023-04-15_at_09-30`) with an
//! optional explicit `_UTC` suffix. Normalization rewrites the token to
//! canonical UTC exactly once; the operation is idempotent.

use crate::tags::{extract_hash2, extract_legacy_hash};
use regex::Regex;
use std::sync::LazyLock;
use time::{Date, Month, PrimitiveDateTime, Time, UtcDateTime, UtcOffset};

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})_at_(\d{2})-(\d{2})(_UTC)?").unwrap());

/// The originating deployment ran in US-Eastern time and wrote local
/// timestamps with no zone marker. Unlabeled tokens are assumed to sit at
/// this fixed offset. This is a recorded assumption about historical data,
/// not a derived fact; it deliberately ignores daylight saving.
const ASSUMED_LOCAL_OFFSET: UtcOffset = time::macros::offset!(-5);

/// Rewrites the filename's date/time token to `YYYY-MM-DD_at_HH-MM_UTC`.
///
/// - A token already suffixed `_UTC` is returned unchanged.
/// - With an `authoritative` creation time (the matched record's canonical
///   timestamp), the token is rewritten from that time.
/// - Otherwise the token is interpreted at the fixed historical US-Eastern
///   offset and converted.
/// - Hash-tagged filenames are never altered, whatever their timestamp.
pub fn normalize_timestamp(filename: &str, authoritative: Option<UtcDateTime>) -> String {
    if extract_hash2(filename).is_some() || extract_legacy_hash(filename).is_some() {
        return filename.to_string();
    }
    let Some(caps) = TIMESTAMP.captures(filename) else {
        return filename.to_string();
    };
    if caps.get(6).is_some() {
        return filename.to_string();
    }

    let replacement = match authoritative {
        Some(known) => format_token(known),
        None => match parse_local_token(&caps) {
            Some(local) => format_token(local.assume_offset(ASSUMED_LOCAL_OFFSET).to_utc()),
            // A structurally matching but impossible date (month 13, hour
            // 25). Leave the filename alone rather than invent a time.
            None => return filename.to_string(),
        },
    };

    let token = caps.get(0).unwrap();
    let mut out = String::with_capacity(filename.len() + 4);
    out.push_str(&filename[..token.start()]);
    out.push_str(&replacement);
    out.push_str(&filename[token.end()..]);
    out
}

fn parse_local_token(caps: &regex::Captures<'_>) -> Option<PrimitiveDateTime> {
    let year = caps[1].parse::<i32>().ok()?;
    let month = Month::try_from(caps[2].parse::<u8>().ok()?).ok()?;
    let day = caps[3].parse::<u8>().ok()?;
    let hour = caps[4].parse::<u8>().ok()?;
    let minute = caps[5].parse::<u8>().ok()?;
    let date = Date::from_calendar_date(year, month, day).ok()?;
    let time = Time::from_hms(hour, minute, 0).ok()?;
    Some(PrimitiveDateTime::new(date, time))
}

fn format_token(at: UtcDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}_at_{:02}-{:02}_UTC",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::utc_datetime;

    #[rstest]
    // Already canonical: returned unchanged.
    #[case("2023-04-15_at_09-30_UTC_id_1234567.jpg", "2023-04-15_at_09-30_UTC_id_1234567.jpg")]
    // Unlabeled: interpreted at the fixed -5 offset.
    #[case("2023-04-15_at_09-30_id_1234567.jpg", "2023-04-15_at_14-30_UTC_id_1234567.jpg")]
    // Conversion may roll the date over.
    #[case("2023-12-31_at_20-00_id_7.mp4", "2024-01-01_at_01-00_UTC_id_7.mp4")]
    // Preview marker survives untouched.
    #[case(
        "2023-04-15_at_09-30_preview_id_1234567.jpg",
        "2023-04-15_at_14-30_UTC_preview_id_1234567.jpg"
    )]
    // No timestamp token at all.
    #[case("plain_id_55.jpg", "plain_id_55.jpg")]
    fn test_normalize(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_timestamp(input, None), expected);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_timestamp("2023-04-15_at_09-30_id_1.jpg", None);
        let twice = normalize_timestamp(&once, None);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_authoritative_time_wins() {
        let created = utc_datetime!(2023-04-15 11:05);
        assert_eq!(
            normalize_timestamp("2023-04-15_at_09-30_id_9.jpg", Some(created)),
            "2023-04-15_at_11-05_UTC_id_9.jpg",
        );
    }

    #[rstest]
    #[case("2023-04-15_at_09-30_hash2_abc123.jpg")]
    #[case("2023-04-15_at_09-30_hash_abc123.jpg")]
    #[case("2023-04-15_at_09-30_hash1_abc123.jpg")]
    fn test_hash_tagged_filenames_are_never_altered(#[case] filename: &str) {
        assert_eq!(normalize_timestamp(filename, None), filename);
    }

    #[test]
    fn test_impossible_date_is_left_alone() {
        let filename = "2023-13-45_at_99-99_id_1.jpg";
        assert_eq!(normalize_timestamp(filename, None), filename);
    }
}
