//! Parser for the plaintext status feed.
//!
//! The feed looks like:
//!
//! ```text
//! Online: 5 / Today: 12 / New Users: 2 / All Time: 900 / Countries: Mexico : 3 / Brazil : 1
//! ```
//!
//! Parsing never fails. Segments that do not look like `key : value` are
//! skipped, unparsable numbers become `0`, and countries without a positive
//! count are dropped. The worst case is an all-zero [`Snapshot`].

use std::num::IntErrorKind;

use chrono::{DateTime, Utc};

use crate::model::{CountryStat, Snapshot};

/// Token that must appear in a payload for it to be worth parsing.
pub const VALIDITY_MARKER: &str = "Online:";

/// Keyword that starts the per-country section.
const COUNTRIES_KEYWORD: &str = "Countries:";

const SEGMENT_SEPARATOR: char = '/';
const PAIR_SEPARATOR: char = ':';

/// Whether a fetched payload is usable at all.
pub fn has_validity_marker(text: &str) -> bool {
    text.contains(VALIDITY_MARKER)
}

/// Parse a feed payload, stamping the snapshot with the current time.
pub fn parse_stats_text(text: &str) -> Snapshot {
    parse_stats_text_at(text, Utc::now())
}

/// Parse a feed payload with an explicit capture time.
pub fn parse_stats_text_at(text: &str, captured_at: DateTime<Utc>) -> Snapshot {
    let mut snapshot = Snapshot::empty(captured_at);

    let (main, countries) = match text.find(COUNTRIES_KEYWORD) {
        Some(idx) => (&text[..idx], &text[idx + COUNTRIES_KEYWORD.len()..]),
        None => (text, ""),
    };

    for (key, value) in pairs(main) {
        let value = leading_count(value);
        match key {
            "Online" => snapshot.online = value,
            "Today" => snapshot.today = value,
            "New Users" => snapshot.new_users = value,
            "All Time" => snapshot.all_time = value,
            _ => {}
        }
    }

    for (name, value) in pairs(countries) {
        let count = leading_count(value);
        if !name.is_empty() && count > 0 {
            snapshot.countries.push(CountryStat {
                name: name.to_string(),
                count,
                percentage: 0,
            });
        }
    }

    assign_percentages(&mut snapshot.countries);
    // `sort_by` is stable, so ties keep parse order.
    snapshot.countries.sort_by(|a, b| b.count.cmp(&a.count));

    snapshot
}

/// Trimmed `(key, value)` pairs from segments holding exactly one `:`.
fn pairs(region: &str) -> impl Iterator<Item = (&str, &str)> {
    region
        .split(SEGMENT_SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| {
            let mut parts = segment.split(PAIR_SEPARATOR);
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) => Some((key.trim(), value.trim())),
                _ => None,
            }
        })
}

/// Parse the integer prefix of `value` as a count, ignoring anything after the digits.
///
/// Returns 0 when there are no digits or the number is negative. Numbers too
/// large for a `u64` saturate at `u64::MAX`.
fn leading_count(value: &str) -> u64 {
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    match digits[..end].parse::<u64>() {
        Ok(_) if negative => 0,
        Ok(n) => n,
        Err(e) if !negative && *e.kind() == IntErrorKind::PosOverflow => u64::MAX,
        Err(_) => 0,
    }
}

/// Fill in each country's rounded share of the total. All zero if the total is zero.
fn assign_percentages(countries: &mut [CountryStat]) {
    let total: u128 = countries.iter().map(|c| u128::from(c.count)).sum();
    if total == 0 {
        return;
    }

    for country in countries.iter_mut() {
        // round-half-up of 100 * count / total, in integers
        let share = (200 * u128::from(country.count) + total) / (2 * total);
        country.percentage = u8::try_from(share.min(100)).unwrap_or(100);
    }
}
