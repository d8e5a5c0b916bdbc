//! Union committees and their lookup rules.
//!
//! # Invariants
//! - Committee keys are lowercase ASCII and never change.
//! - Lookups accept keys, names, aliases and page-style paths
//!   (`/sports-committee.html`).

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Committee {
    pub key: &'static str,
    pub name: &'static str,
    pub summary: &'static str,
    #[serde(skip)]
    pub aliases: &'static [&'static str],
}

pub const COMMITTEES: [Committee; 5] = [
    Committee {
        key: "sports",
        name: "Sports Committee",
        summary: "Leads athletics, intramurals, and campus spirit events.",
        aliases: &["athletics", "sports committee"],
    },
    Committee {
        key: "social",
        name: "Social Committee",
        summary: "Plans mixers, welcome events, and cohort traditions.",
        aliases: &["social committee"],
    },
    Committee {
        key: "cultural",
        name: "Cultural Committee",
        summary: "Celebrates heritage nights, arts showcases, and shared identities.",
        aliases: &["culture", "cultral", "cultural committee"],
    },
    Committee {
        key: "science",
        name: "Science Committee",
        summary: "Hosts innovation labs, research spotlights, and STEM outreach.",
        aliases: &["stem", "science committee"],
    },
    Committee {
        key: "art",
        name: "Art Committee",
        summary: "Curates galleries, performances, and creative workshops.",
        aliases: &["arts", "art committee"],
    },
];

pub fn iter_committees() -> impl Iterator<Item = &'static Committee> {
    COMMITTEES.iter()
}

/// Resolves free-form input to a committee key, or `None` when nothing matches.
pub fn normalize_committee_key(raw: &str) -> Option<&'static str> {
    let mut token = raw.trim().to_lowercase();
    token = token.trim_start_matches('/').to_string();
    token = token.trim_end_matches('/').to_string();
    if let Some(stripped) = token.strip_suffix(".html") {
        token = stripped.to_string();
    }
    token = collapse_whitespace(&token.replace(['_', '-'], " "));
    if token.ends_with("committee") && !token.ends_with(" committee") {
        token = token.replace("committee", " committee");
    }

    let bare = token.replace(" committee", "");
    let candidates = [token.as_str(), bare.as_str()];

    for committee in COMMITTEES.iter() {
        let name = committee.name.to_lowercase();
        if candidates.contains(&committee.key) || candidates.contains(&name.as_str()) {
            return Some(committee.key);
        }
        for alias in committee.aliases {
            let alias_token = collapse_whitespace(&alias.to_lowercase().replace(['_', '-'], " "));
            if candidates.contains(&alias_token.as_str()) {
                return Some(committee.key);
            }
        }
    }
    None
}

pub fn committee_by_key(raw: &str) -> Option<&'static Committee> {
    let key = normalize_committee_key(raw)?;
    COMMITTEES.iter().find(|committee| committee.key == key)
}

/// Human label for a stored committee value.
///
/// Known committees use their display name; anything else is title-cased.
pub fn committee_label(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    if let Some(committee) = committee_by_key(raw) {
        return committee.name.to_string();
    }
    title_case(&raw.replace(['-', '_'], " "))
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut previous_is_letter = false;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(ch);
            previous_is_letter = false;
        }
    }
    out
}
