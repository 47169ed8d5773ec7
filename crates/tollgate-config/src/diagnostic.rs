// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment failures and tier lookups into miette reports.
//!
//! Unknown keys and unknown tier names both go through [`suggest_key`], so a
//! typo in `tollgate.toml` and a typo in `--tier` produce the same hint.

#![allow(unused_assignments)] // false positive from the Diagnostic derive

use figment::error::{Error as FigmentError, Kind};
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a candidate must beat to be offered as a correction.
const MIN_SIMILARITY: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("`{key}` is not a recognized setting")]
    #[diagnostic(
        code(tollgate::config::unknown_key),
        help("{}", correction_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("unrecognized here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: {detail}")]
    #[diagnostic(code(tollgate::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("`{key}` is required")]
    #[diagnostic(
        code(tollgate::config::missing_key),
        help("add `{key} = <value>` to your tollgate.toml")
    )]
    MissingKey { key: String },

    /// A tier name that is not declared under `[tiers]`.
    #[error("{location} refers to unknown tier `{tier}`")]
    #[diagnostic(
        code(tollgate::config::unknown_tier),
        help("{}", correction_help(suggestion.as_deref(), valid_tiers))
    )]
    UnknownTier {
        location: String,
        tier: String,
        suggestion: Option<String>,
        valid_tiers: String,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(tollgate::config::validation))]
    Validation { message: String },

    #[error("could not load configuration: {0}")]
    #[diagnostic(code(tollgate::config::other))]
    Other(String),
}

fn correction_help(suggestion: Option<&str>, candidates: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Known names: {candidates}"),
        None => format!("known names: {candidates}"),
    }
}

/// Splits an aggregated figment error into one diagnostic per failure.
///
/// `toml_sources` pairs each loaded file path with its text so unknown keys
/// can be underlined in place.
pub fn figment_to_config_errors(
    err: FigmentError,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let (span, src) = locate(&error, field, toml_sources).unzip();
                ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion: suggest_key(field, *expected),
                    valid_keys: expected.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: qualified(&error.path, field),
            },
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                key: error.path.join("."),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.to_string(),
            },
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

fn qualified(path: &[String], field: &str) -> String {
    path.iter()
        .map(String::as_str)
        .chain(std::iter::once(field))
        .collect::<Vec<_>>()
        .join(".")
}

fn locate(
    error: &FigmentError,
    field: &str,
    toml_sources: &[(String, String)],
) -> Option<(SourceSpan, NamedSource<String>)> {
    let figment::Source::File(file) = error.metadata.as_ref()?.source.as_ref()? else {
        return None;
    };
    let file = file.display().to_string();
    let (name, content) = toml_sources.iter().find(|(p, _)| *p == file)?;
    let offset = find_key_offset(content, &error.path, field)?;
    Some((
        SourceSpan::new(offset.into(), field.len()),
        NamedSource::new(name, content.clone()),
    ))
}

/// Byte offset of `field` as a key inside the table named by `path`.
///
/// For `path = ["tiers", "fast"]` the scan starts after `[tiers.fast]`; an
/// empty path scans from the top of the file.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let start = match path {
        [] => 0,
        _ => {
            let header = format!("[{}]", path.join("."));
            content.find(&header)? + header.len()
        }
    };

    let mut line_start = start;
    for line in content[start..].split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let is_key = line[indent..]
            .strip_prefix(field)
            .is_some_and(|rest| rest.starts_with([' ', '\t', '=']));
        if is_key {
            return Some(line_start + indent);
        }
        line_start += line.len();
    }
    None
}

/// Closest candidate by Jaro-Winkler similarity, if any clears the threshold.
pub fn suggest_key<S: AsRef<str>>(unknown: &str, candidates: &[S]) -> Option<String> {
    candidates
        .iter()
        .map(|c| (strsim::jaro_winkler(unknown, c.as_ref()), c.as_ref()))
        .filter(|(score, _)| *score > MIN_SIMILARITY)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.to_string())
}

pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut report = String::new();
        match handler.render_report(&mut report, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{report}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggest_tier_typo() {
        let valid = ["whisper", "workhorse", "coder", "thinker"];
        assert_eq!(suggest_key("thinkr", &valid), Some("thinker".to_string()));
    }

    #[test]
    fn far_off_names_get_no_suggestion() {
        let valid = ["whisper", "workhorse", "coder"];
        assert_eq!(suggest_key("qqqq", &valid), None);
    }

    #[test]
    fn find_key_offset_in_nested_table() {
        let content = "[tiers.fast]\nbackend = \"local\"\nmodle = \"x\"\n";
        let path = vec!["tiers".to_string(), "fast".to_string()];
        let o = find_key_offset(content, &path, "modle").unwrap();
        assert_eq!(&content[o..o + 5], "modle");
    }

    #[test]
    fn unknown_tier_help_lists_valid_tiers() {
        let err = ConfigError::UnknownTier {
            location: "escalation.coder".into(),
            tier: "cloud_standrd".into(),
            suggestion: Some("cloud_standard".into()),
            valid_tiers: "cloud_fast, cloud_standard".into(),
        };
        let help = err.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("did you mean `cloud_standard`"));
    }
}
