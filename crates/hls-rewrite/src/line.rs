//! Playlist line classification and per-line outcomes.

use thiserror::Error;

const KEY_TAG: &str = "#EXT-X-KEY";
const URI_ATTR: &str = "URI=";

/// One line of an HLS playlist, classified by how the rewriter treats it.
///
/// Classification trims surrounding whitespace; the borrowed text of
/// `Key`, `Directive` and `Uri` is the trimmed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestLine<'a> {
    Blank,
    /// `#EXT-X-KEY` directive carrying a `URI=` attribute.
    Key(&'a str),
    /// Any other `#` line (tags and comments).
    Directive(&'a str),
    /// Segment or playlist reference.
    Uri(&'a str),
}

impl<'a> ManifestLine<'a> {
    pub fn classify(line: &'a str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            ManifestLine::Blank
        } else if trimmed.starts_with(KEY_TAG) && trimmed.contains(URI_ATTR) {
            ManifestLine::Key(trimmed)
        } else if trimmed.starts_with('#') {
            ManifestLine::Directive(trimmed)
        } else {
            ManifestLine::Uri(trimmed)
        }
    }
}

/// Why a line that should have been rewritten was passed through instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedManifestLine {
    #[error("key directive has no URI attribute")]
    MissingUri,
    #[error("key directive has an unterminated quoted URI")]
    UnterminatedQuote,
    #[error("key directive has an empty URI")]
    EmptyUri,
    #[error("cannot resolve {uri:?} against the playlist URL: {reason}")]
    Unresolvable { uri: String, reason: String },
}

/// Result of rewriting a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Rewritten(String),
    /// The line is emitted unchanged. `reason` is set when the line was a
    /// rewrite candidate that could not be handled.
    PassedThrough {
        line: String,
        reason: Option<MalformedManifestLine>,
    },
}

impl LineOutcome {
    pub(crate) fn unchanged(line: &str) -> Self {
        LineOutcome::PassedThrough {
            line: line.to_string(),
            reason: None,
        }
    }

    pub(crate) fn malformed(line: &str, reason: MalformedManifestLine) -> Self {
        LineOutcome::PassedThrough {
            line: line.to_string(),
            reason: Some(reason),
        }
    }

    pub fn line(&self) -> &str {
        match self {
            LineOutcome::Rewritten(line) | LineOutcome::PassedThrough { line, .. } => line,
        }
    }

    pub fn into_line(self) -> String {
        match self {
            LineOutcome::Rewritten(line) | LineOutcome::PassedThrough { line, .. } => line,
        }
    }

    pub fn is_rewritten(&self) -> bool {
        matches!(self, LineOutcome::Rewritten(_))
    }

    pub fn malformed_reason(&self) -> Option<&MalformedManifestLine> {
        match self {
            LineOutcome::PassedThrough { reason, .. } => reason.as_ref(),
            LineOutcome::Rewritten(_) => None,
        }
    }
}

/// A key directive split around the value of its `URI` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyUri<'a> {
    /// Everything up to and including `URI=`.
    pub prefix: &'a str,
    pub value: &'a str,
    /// Everything after the value (and its closing quote).
    pub suffix: &'a str,
    pub quoted: bool,
}

impl KeyUri<'_> {
    pub fn replace_value(&self, value: &str) -> String {
        if self.quoted {
            format!("{}\"{}\"{}", self.prefix, value, self.suffix)
        } else {
            format!("{}{}{}", self.prefix, value, self.suffix)
        }
    }
}

/// Locates the `URI` attribute of a key directive.
///
/// Only a `URI=` that starts an attribute (after `:` or `,`) counts, so
/// vendor attributes ending in `URI` are not mistaken for it.
pub(crate) fn split_key_uri(line: &str) -> Result<KeyUri<'_>, MalformedManifestLine> {
    let start = line
        .match_indices(URI_ATTR)
        .map(|(idx, _)| idx)
        .find(|&idx| matches!(line[..idx].chars().last(), Some(':' | ',')))
        .ok_or(MalformedManifestLine::MissingUri)?;
    let value_start = start + URI_ATTR.len();
    let (prefix, rest) = line.split_at(value_start);

    let (value, suffix, quoted) = if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted
            .find('"')
            .ok_or(MalformedManifestLine::UnterminatedQuote)?;
        (&quoted[..end], &quoted[end + 1..], true)
    } else {
        let end = rest.find(',').unwrap_or(rest.len());
        (&rest[..end], &rest[end..], false)
    };

    if value.trim().is_empty() {
        return Err(MalformedManifestLine::EmptyUri);
    }

    Ok(KeyUri {
        prefix,
        value,
        suffix,
        quoted,
    })
}
