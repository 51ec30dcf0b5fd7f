//! Record normalization
//!
//! Turns a [`RawRecord`] into a [`NormalizedRecord`] whose name, address
//! and phone can be compared across sources. Normalization never fails:
//! unparseable fields are kept in raw form and flagged with a
//! [`ParseWarning`], which [`normalize_all`] forwards to the run report.

use dishx_core::{NormalizedRecord, ParseField, ParseWarning, ParsedAddress, RawRecord, RunContext, RunIssue};
use rayon::prelude::*;
use tracing::debug;

/// Trailing legal-entity words dropped from names.
const LEGAL_SUFFIXES: &[&str] = &["inc", "llc", "corp", "co", "ltd"];

/// Minimum digits for a phone number to be trusted as an identifier.
pub const MIN_PHONE_DIGITS: usize = 7;

/// Digits kept from a longer phone number (drops country prefixes).
const PHONE_DIGITS: usize = 10;

/// Street-type and directional abbreviations, expanded to their long form.
const ADDRESS_ABBREVIATIONS: &[(&str, &str)] = &[
    ("st", "street"),
    ("str", "street"),
    ("ave", "avenue"),
    ("av", "avenue"),
    ("blvd", "boulevard"),
    ("rd", "road"),
    ("dr", "drive"),
    ("ln", "lane"),
    ("pl", "place"),
    ("sq", "square"),
    ("ct", "court"),
    ("hwy", "highway"),
    ("pkwy", "parkway"),
    ("ter", "terrace"),
    ("e", "east"),
    ("w", "west"),
    ("n", "north"),
    ("s", "south"),
];

/// Normalize one record. Pure: the same input always yields the same output.
pub fn normalize(raw: RawRecord) -> NormalizedRecord {
    let mut warnings = Vec::new();

    let name_tokens = name_tokens(&raw.name);
    let normalized_name = name_tokens.join(" ");

    let (address, street_tokens, normalized_address) =
        match parse_address(&raw.address_text, raw.neighborhood.as_deref()) {
            Ok(parsed) => parsed,
            Err(fallback) => {
                warnings.push(ParseWarning {
                    field: ParseField::Address,
                    raw: raw.address_text.clone(),
                });
                fallback
            }
        };

    let normalized_phone = match raw.phone.as_deref() {
        Some(phone) => {
            let (digits, valid) = normalize_phone(phone);
            if !valid {
                warnings.push(ParseWarning {
                    field: ParseField::Phone,
                    raw: phone.to_string(),
                });
            }
            digits
        }
        None => None,
    };

    if let Some(coords) = raw.coordinates {
        if !coords.is_valid() {
            warnings.push(ParseWarning {
                field: ParseField::Coordinates,
                raw: format!("{},{}", coords.lat, coords.lon),
            });
        }
    }

    let cuisine_tags = normalize_tags(&raw.cuisine_tags);

    NormalizedRecord {
        raw,
        normalized_name,
        name_tokens,
        normalized_address,
        address,
        street_tokens,
        normalized_phone,
        cuisine_tags,
        warnings,
    }
}

/// Normalize a batch in parallel, keeping input order, and record every
/// parse warning as a `ParseFailure` issue.
pub fn normalize_all(ctx: &RunContext, raws: Vec<RawRecord>) -> Vec<NormalizedRecord> {
    let records: Vec<NormalizedRecord> = raws.into_par_iter().map(normalize).collect();

    let issues: Vec<RunIssue> = records
        .iter()
        .flat_map(|record| {
            let key = record.key();
            record.warnings.iter().map(move |w| RunIssue::ParseFailure {
                record: key.clone(),
                field: w.field,
                raw: w.raw.clone(),
            })
        })
        .collect();

    if !issues.is_empty() {
        debug!(count = issues.len(), "parse warnings during normalization");
    }
    ctx.record_all(issues);
    records
}

/// Lowercase, drop apostrophes, turn other punctuation into spaces and
/// collapse whitespace.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        match c {
            '\'' | '\u{2019}' | '\u{2018}' | '`' => {}
            '&' => out.push_str(" and "),
            c if c.is_alphanumeric() => out.push(c),
            _ => out.push(' '),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleaned name tokens with trailing legal suffixes removed.
///
/// A name made only of a suffix word keeps it, so the name never
/// normalizes to nothing.
pub fn name_tokens(name: &str) -> Vec<String> {
    let mut tokens: Vec<String> = clean_text(name).split(' ').filter(|t| !t.is_empty()).map(str::to_string).collect();
    while tokens.len() > 1 && tokens.last().is_some_and(|t| LEGAL_SUFFIXES.contains(&t.as_str())) {
        tokens.pop();
    }
    tokens
}

pub fn normalize_name(name: &str) -> String {
    name_tokens(name).join(" ")
}

/// Digits-only phone. Returns the digits (if any) and whether they are
/// long enough to serve as an identifier.
pub fn normalize_phone(phone: &str) -> (Option<String>, bool) {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return (None, phone.trim().is_empty());
    }
    let digits = if digits.len() > PHONE_DIGITS {
        digits[digits.len() - PHONE_DIGITS..].to_string()
    } else {
        digits
    };
    let valid = digits.len() >= MIN_PHONE_DIGITS;
    (Some(digits), valid)
}

fn expand_abbreviation(token: &str) -> String {
    ADDRESS_ABBREVIATIONS
        .iter()
        .find(|(short, _)| *short == token)
        .map(|(_, long)| (*long).to_string())
        .unwrap_or_else(|| token.to_string())
}

fn street_tokens_of(text: &str) -> Vec<String> {
    clean_text(text).split(' ').filter(|t| !t.is_empty()).map(expand_abbreviation).collect()
}

/// `7`, `7a` or a hyphenated range such as `35-37`. Ordinals like `1st`
/// are street names, not numbers.
fn is_street_number(token: &str) -> bool {
    fn digits_then_letter(part: &str) -> bool {
        let digits = part.trim_end_matches(|c: char| c.is_ascii_alphabetic());
        !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) && part.len() - digits.len() <= 1
    }

    match token.split_once('-') {
        Some((low, high)) => !low.is_empty() && low.chars().all(|c| c.is_ascii_digit()) && digits_then_letter(high),
        None => digits_then_letter(token),
    }
}

type AddressParts = (ParsedAddress, Vec<String>, Option<String>);

/// Split `"<number> <street>, <locality>, ..."` into its parts.
///
/// `Err` carries the best-effort fallback (original text as street name)
/// for addresses that do not start with a street number.
fn parse_address(text: &str, neighborhood: Option<&str>) -> Result<AddressParts, AddressParts> {
    let fallback_locality = neighborhood.map(clean_text).filter(|l| !l.is_empty());
    let segments: Vec<&str> = text.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();

    let Some(first) = segments.first() else {
        let address = ParsedAddress {
            locality: fallback_locality,
            ..Default::default()
        };
        return Ok((address, Vec::new(), None));
    };

    let locality = segments
        .get(1)
        .map(|s| clean_text(s))
        .filter(|l| !l.is_empty())
        .or(fallback_locality);

    let mut words = first.split_whitespace();
    let number = words.next().filter(|w| is_street_number(w)).map(|w| w.to_lowercase());

    let Some(street_number) = number else {
        let original = text.trim().to_string();
        let street_tokens = street_tokens_of(text);
        let normalized = Some(street_tokens.join(" ")).filter(|s| !s.is_empty());
        let address = ParsedAddress {
            street_number: None,
            street_name: Some(original),
            locality,
        };
        return Err((address, street_tokens, normalized));
    };

    let rest = words.collect::<Vec<_>>().join(" ");
    let street_tokens = street_tokens_of(&rest);
    let street_name = Some(street_tokens.join(" ")).filter(|s| !s.is_empty());

    let mut normalized = street_number.clone();
    if let Some(street) = &street_name {
        normalized.push(' ');
        normalized.push_str(street);
    }
    if let Some(locality) = &locality {
        normalized.push_str(", ");
        normalized.push_str(locality);
    }

    let address = ParsedAddress {
        street_number: Some(street_number),
        street_name,
        locality,
    };
    Ok((address, street_tokens, Some(normalized)))
}

fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
