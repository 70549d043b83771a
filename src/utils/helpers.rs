// src/utils/helpers.rs - Input cleaning shared by the entity writers
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

/// Titles shorter than this are only used when nothing better is available.
const MIN_TITLE_LENGTH: usize = 10;

static NON_WORD_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\W_]+").expect("valid regex"));
static LEADING_WORD_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\s+").expect("valid regex"));
static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("valid regex"));

/// Registry identifier formats, keyed by source.
static IDENTIFIER_PATTERNS: Lazy<BTreeMap<&'static str, Regex>> = Lazy::new(|| {
    [
        ("actrn", r"^ACTRN\d{14}p?$"),
        ("chictr", r"^ChiCTR"),
        ("drks", r"^DRKS"),
        ("euctr", r"^EUCTR\d{4}-\d{6}-\d{2}$"),
        ("gsk", r"^GSK"),
        ("irct", r"^IRCT"),
        ("isrctn", r"^ISRCTN\d{8}$"),
        ("jprn", r"^(JPRN-)?(C\d{9}|JapicCTI-\d{6}|JMA-IIA\d{5}|UMIN\d{9})$"),
        ("kct", r"^KCT"),
        ("nct", r"^NCT\d{8}$"),
        ("ntr", r"^NTR"),
        ("pactr", r"^PACTR"),
        ("per", r"^PER"),
        ("rbr", r"^RBR"),
        ("rpcec", r"^RPCEC"),
        ("takeda", r"^TAKEDA"),
        ("tctr", r"^TCTR"),
        ("who", r"^U\d{4}-\d{4}-\d{4}$"),
    ]
    .into_iter()
    .map(|(source, pattern)| {
        let regex = Regex::new(&format!("(?i){}", pattern)).expect("valid identifier regex");
        (source, regex)
    })
    .collect()
});

/// Prefixes recognised when scanning free text: (source, prefixes).
const TEXT_IDENTIFIER_PREFIXES: [(&str, &[&str]); 7] = [
    ("actrn", &["actrn"]),
    ("euctr", &["euctr"]),
    ("gsk", &["gsk"]),
    ("isrctn", &["isrctn"]),
    ("jprn", &["jprn", "umin"]),
    ("nct", &["nct"]),
    ("takeda", &["takeda"]),
];

/// Strips whitespace, dots and double quotes from both ends.
pub fn clean_string(value: Option<&str>) -> String {
    value
        .unwrap_or("")
        .trim_matches(|c: char| c.is_whitespace() || c == '.' || c == '"')
        .to_string()
}

pub fn slugify_string(value: &str) -> String {
    NON_WORD_RUN
        .replace_all(value, "_")
        .trim_matches('_')
        .to_lowercase()
}

/// Slugifies every value, dropping empties and duplicates. Output is sorted.
pub fn slugify_array<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values
        .iter()
        .map(|v| slugify_string(v.as_ref()))
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// URLs without scheme or host, or using the file scheme, are invalid.
pub fn validate_remote_url(url: Option<&str>) -> bool {
    match url.map(Url::parse) {
        Some(Ok(parsed)) => {
            !parsed.scheme().is_empty() && parsed.host_str().is_some() && parsed.scheme() != "file"
        }
        _ => false,
    }
}

/// Empty identifiers and identifiers whose digits are all zero are invalid.
pub fn validate_identifier(identifier: &str) -> bool {
    let digits = NON_DIGIT.replace_all(identifier, "");
    !digits.is_empty() && digits.chars().any(|c| c != '0')
}

/// Drops identifiers that are invalid or don't match their registry format.
pub fn clean_identifiers(identifiers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    for (source, raw) in identifiers {
        let value = LEADING_WORD_SPACE.replace(raw, "$1").into_owned();
        if value != *raw {
            debug!("Removed whitespace from identifier \"{}\" to \"{}\"", raw, value);
        }
        if !validate_identifier(&value) {
            warn!("Ignoring invalid identifier {}:{}", source, value);
            continue;
        }
        match IDENTIFIER_PATTERNS.get(source.as_str()) {
            Some(pattern) if pattern.is_match(&value) => {
                result.insert(source.clone(), value);
            }
            _ => warn!("Identifier \"{}:{}\" is not recognized", source, value),
        }
    }
    result
}

/// Finds valid registry identifiers mentioned in free text, as (source, id).
pub fn find_list_of_identifiers(text: &str) -> Vec<(String, String)> {
    let mut found = Vec::new();
    for (source, prefixes) in TEXT_IDENTIFIER_PREFIXES {
        for prefix in prefixes {
            let pattern = match Regex::new(&format!(r"(?i)({}\s*[\w-]{{3,}})", prefix)) {
                Ok(re) => re,
                Err(e) => {
                    warn!("Invalid identifier prefix pattern '{}': {}", prefix, e);
                    continue;
                }
            };
            for capture in pattern.find_iter(text) {
                let candidate = BTreeMap::from([(source.to_string(), capture.as_str().to_string())]);
                found.extend(clean_identifiers(&candidate));
            }
        }
    }
    found
}

/// Returns the first cleaned title long enough to be useful, otherwise the
/// last cleaned title.
pub fn get_optimal_title(titles: &[Option<&str>]) -> String {
    let mut last = String::new();
    for title in titles {
        last = clean_string(*title);
        if last.chars().count() >= MIN_TITLE_LENGTH {
            return last;
        }
    }
    last
}

/// Prepends `prefix` unless `value` already starts with it.
pub fn safe_prepend(prefix: &str, value: Option<&str>) -> Option<String> {
    value.map(|v| {
        if v.starts_with(prefix) {
            v.to_string()
        } else {
            format!("{}{}", prefix, v)
        }
    })
}
