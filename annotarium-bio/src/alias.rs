//! Chromosome alias expansion and contig-name normalization
//!
//! Assembly reports name the same molecule many ways (INSDC accession,
//! RefSeq accession, UCSC name, bare number). The alias set precomputed here
//! is the lookup key set the pipeline uses to map GFF contig names onto
//! chromosomes.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    static ref TRAILING_DIGITS: Regex = Regex::new(r"(\d+)$").unwrap();
    static ref CHR_PADDED: Regex = Regex::new(r"^chr0*(\w+)$").unwrap();
}

/// Expand the canonical identifiers of one assembled molecule into its full
/// alias set.
///
/// `accession_like` values (INSDC / RefSeq accessions) contribute the raw
/// value, a whitespace-normalized variant, and a version-stripped variant.
/// `chromosome_like` values (assigned molecule, sequence name, UCSC name)
/// additionally contribute trailing-digit forms: unpadded, zero-padded, and
/// `chr`/`chr_` prefixings of both.
pub fn expand_aliases<'a, A, C>(accession_like: A, chromosome_like: C) -> BTreeSet<String>
where
    A: IntoIterator<Item = &'a str>,
    C: IntoIterator<Item = &'a str>,
{
    let mut aliases = BTreeSet::new();

    for value in accession_like {
        let value = value.trim();
        if is_missing(value) {
            continue;
        }
        insert_with_ws_variant(&mut aliases, value);
        if let Some(base) = strip_version(value) {
            insert_with_ws_variant(&mut aliases, base);
        }
    }

    for value in chromosome_like {
        let value = value.trim();
        if is_missing(value) {
            continue;
        }
        insert_with_ws_variant(&mut aliases, value);
        if let Some(caps) = TRAILING_DIGITS.captures(value) {
            let digits = &caps[1];
            let unpadded = digits.trim_start_matches('0');
            let unpadded = if unpadded.is_empty() { "0" } else { unpadded };
            let padded = format!("{unpadded:0>2}");
            for form in [unpadded, padded.as_str()] {
                aliases.insert(form.to_string());
                aliases.insert(format!("chr{form}"));
                aliases.insert(format!("chr_{form}"));
            }
        }
    }

    aliases
}

fn is_missing(value: &str) -> bool {
    value.is_empty() || value == "na" || value == "Na" || value == "NA"
}

fn insert_with_ws_variant(aliases: &mut BTreeSet<String>, value: &str) {
    aliases.insert(value.to_string());
    if value.contains(char::is_whitespace) {
        aliases.insert(
            value
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("_"),
        );
    }
}

/// `ACC.3` → `ACC`, when the suffix is purely numeric.
fn strip_version(value: &str) -> Option<&str> {
    match value.rsplit_once('.') {
        Some((base, version))
            if !version.is_empty() && version.chars().all(|c| c.is_ascii_digit()) =>
        {
            Some(base)
        }
        _ => None,
    }
}

/// Coerce an all-digit contig name to its canonical unpadded form.
pub fn coerce_numeric(name: &str) -> Option<String> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let unpadded = name.trim_start_matches('0');
    Some(if unpadded.is_empty() {
        "0".to_string()
    } else {
        unpadded.to_string()
    })
}

/// Normalize a `chr…` token: strip one trailing underscore, reduce
/// `chr0N` → `chrN`. Returns `None` for names that are not `chr`-prefixed
/// or that normalize to themselves.
pub fn normalize_chr_token(name: &str) -> Option<String> {
    if !name.starts_with("chr") {
        return None;
    }
    let stripped = name.strip_suffix('_').unwrap_or(name);
    let normalized = match CHR_PADDED.captures(stripped) {
        Some(caps) => format!("chr{}", caps[1].trim_start_matches('0')),
        None => stripped.to_string(),
    };
    if normalized == name {
        None
    } else {
        Some(normalized)
    }
}
