use std::fmt::{self, Display};
use std::sync::OnceLock;

use chrono::{Local, NaiveDateTime};
use regex::Regex;

use crate::domain::registry::ConditionRegistry;

/// Sentinel edge value marking an open (and therefore unusable) range end.
pub const UNLIMITED: &str = "UNLIMITED";

/// Placement of ` and ` glue around a rendered condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AndState {
    Neither,
    OnlyHead,
    OnlyTail,
    BothEnds,
}

impl AndState {
    fn leading(self) -> bool {
        matches!(self, AndState::OnlyHead | AndState::BothEnds)
    }

    fn trailing(self) -> bool {
        matches!(self, AndState::OnlyTail | AndState::BothEnds)
    }
}

/// Whether selected records must, must not, or may carry a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStatus {
    WithoutOnly,
    WithOnly,
    Unlimited,
}

impl CommentStatus {
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(CommentStatus::WithoutOnly),
            1 => Some(CommentStatus::WithOnly),
            2 => Some(CommentStatus::Unlimited),
            _ => None,
        }
    }
}

/// The fixed comment/quality predicate; independent of user-supplied edges.
pub fn comment_predicate(status: CommentStatus) -> String {
    match status {
        CommentStatus::Unlimited => String::new(),
        CommentStatus::WithoutOnly => {
            "error_code = '0' and comment in ('NULL', 'NONE', '') and good = '1'".to_string()
        }
        CommentStatus::WithOnly => {
            " (error_code <> '0' or comment not in ('NULL', 'NONE', '') or good = '0') "
                .to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    EmptyHint,
    MissingSeparator(String),
    UnknownTitle(String),
    AmbiguousRange(String),
}

impl Display for ConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionError::EmptyHint => f.write_str("Empty condition hint"),
            ConditionError::MissingSeparator(hint) => {
                write!(f, "No field/value separator in `{hint}`")
            }
            ConditionError::UnknownTitle(title) => {
                write!(f, "Condition title `{title}` is not registered")
            }
            ConditionError::AmbiguousRange(value) => {
                write!(f, "Unresolvable hyphen layout in `{value}`")
            }
        }
    }
}

impl std::error::Error for ConditionError {}

/// Per-title normalization applied to both edges of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTransform {
    /// Input is mebibytes, the column stores bytes.
    MebibytesToBytes,
    /// Flexible date/time input, the column stores `YYYY-MM-DD HH:MM:SS`.
    DateTime,
}

impl ValueTransform {
    fn apply(self, edge: &mut String, now: NaiveDateTime) {
        match self {
            ValueTransform::MebibytesToBytes => scale_mebibytes(edge),
            ValueTransform::DateTime => match normalize_date(edge, now) {
                Some(stamp) => *edge = stamp,
                None => {
                    tracing::warn!(value = %edge, "illegal date received, dropping this edge");
                    *edge = UNLIMITED.to_string();
                }
            },
        }
    }
}

fn scale_mebibytes(edge: &mut String) {
    match edge.trim().parse::<f64>() {
        Ok(value) => {
            let bytes = value * f64::from(1u32 << 20);
            // Whole results serialize as plain integers, the form the
            // catalog stores.
            if bytes.fract() == 0.0 && bytes.abs() < 9.0e15 {
                *edge = format!("{}", bytes as i64);
            } else {
                *edge = format!("{bytes}");
            }
        }
        Err(_) => {
            tracing::warn!(value = %edge, "size edge is not numeric, dropping this edge");
            *edge = UNLIMITED.to_string();
        }
    }
}

static COMPACT_STAMP: OnceLock<Regex> = OnceLock::new();

fn compact_stamp_pattern() -> &'static Regex {
    COMPACT_STAMP.get_or_init(|| {
        Regex::new(r"^\d{8}_\d{6}$").expect("compact stamp pattern is a fixed literal")
    })
}

/// Reconcile flexible date/time input into a quoted 19-character
/// `'YYYY-MM-DD HH:MM:SS'` literal.
///
/// Accepted shapes: `YYYYmmDD`, an even run of up to six time digits, or
/// `[[YYYY]mm]DD<sep>HH[MM[SS]]`. Missing leading date digits and missing
/// trailing time digits are filled in from `now`.
fn normalize_date(raw: &str, now: NaiveDateTime) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| *c != '\'').collect();
    if cleaned.is_empty() {
        return None;
    }

    let now_stamp = now.format("%Y%m%d_%H%M%S").to_string();
    let stamp = if cleaned.bytes().all(|b| b.is_ascii_digit()) {
        match cleaned.len() {
            8 => format!("{cleaned}_000000"),
            n if n <= 6 && n % 2 == 0 => {
                let mut time = cleaned;
                while time.len() < 6 {
                    time.push_str("00");
                }
                format!("{}_{time}", &now_stamp[..8])
            }
            _ => return None,
        }
    } else {
        let mut unified = cleaned.replace('-', "_");
        let underline = unified.find('_')?;
        if unified.len() != 15 {
            let tail = unified.len() - underline;
            if tail > 7 || underline > 8 {
                return None;
            }
            if tail != 7 {
                unified.push_str(&now_stamp[8 + tail..]);
            }
            if underline != 8 {
                unified.insert_str(0, &now_stamp[..8 - underline]);
            }
        }
        unified
    };

    if !compact_stamp_pattern().is_match(&stamp) {
        return None;
    }

    Some(format!(
        "'{}-{}-{} {}:{}:{}'",
        &stamp[..4],
        &stamp[4..6],
        &stamp[6..8],
        &stamp[9..11],
        &stamp[11..13],
        &stamp[13..15],
    ))
}

/// A closed predicate over one catalog column.
///
/// Four shapes are expressible: exact match (`low == high`), a two-sided
/// range, and the two open-ended forms, which keep an `UNLIMITED` edge and
/// therefore never become ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    title: String,
    low_edge: String,
    high_edge: String,
    ready: bool,
}

impl Condition {
    /// The explicit not-ready sentinel value.
    pub fn not_ready() -> Self {
        Self {
            title: String::new(),
            low_edge: String::new(),
            high_edge: String::new(),
            ready: false,
        }
    }

    /// Parse a `title=value` hint, `value` optionally hyphen-ranged.
    pub fn parse(hint: &str, registry: &ConditionRegistry) -> Result<Self, ConditionError> {
        Self::parse_at(hint, registry, Local::now().naive_local())
    }

    fn parse_at(
        hint: &str,
        registry: &ConditionRegistry,
        now: NaiveDateTime,
    ) -> Result<Self, ConditionError> {
        if hint.is_empty() {
            return Err(ConditionError::EmptyHint);
        }
        if hint == "UNDEFINED" {
            return Ok(Self::not_ready());
        }

        let Some(equal_mark) = hint.find('=') else {
            return Err(ConditionError::MissingSeparator(hint.to_string()));
        };

        let mut title = &hint[..equal_mark];
        if let Some(stripped) = title.strip_prefix("--") {
            title = stripped;
        } else if let Some(stripped) = title.strip_prefix('-') {
            title = stripped;
        }
        if !registry.is_allowed(title) {
            return Err(ConditionError::UnknownTitle(title.to_string()));
        }

        let value = &hint[equal_mark + 1..];
        let (low, high) = if !value.contains('-') {
            (value.to_string(), value.to_string())
        } else {
            if value.bytes().all(|b| b == b'-') {
                tracing::info!(title, "no limitation received");
                return Ok(Self::not_ready());
            }
            let hyphens = value.matches('-').count();
            let pivot = if hyphens == 1 {
                value.find('-').unwrap_or(0)
            } else if value.starts_with('-') {
                0
            } else if value.ends_with('-') {
                value.len()
            } else if hyphens % 2 == 1 {
                // Hyphens embedded in both halves plus one separator: the
                // separator is the middle hyphen.
                nth_hyphen(value, (hyphens - 1) / 2)
            } else {
                return Err(ConditionError::AmbiguousRange(value.to_string()));
            };

            if pivot == 0 {
                (UNLIMITED.to_string(), value[1..].to_string())
            } else if pivot == value.len() {
                (value[..value.len() - 1].to_string(), UNLIMITED.to_string())
            } else {
                (value[..pivot].to_string(), value[pivot + 1..].to_string())
            }
        };

        Ok(Self::assemble(title, low, high, registry, now))
    }

    fn assemble(
        title: &str,
        mut low: String,
        mut high: String,
        registry: &ConditionRegistry,
        now: NaiveDateTime,
    ) -> Self {
        let mut title = title.to_string();

        // Reversed edges are normalized silently. Sentinel edges keep
        // their parsed positions and are never swapped.
        if low != UNLIMITED && high != UNLIMITED && low > high {
            std::mem::swap(&mut low, &mut high);
        }

        if let Some(transform) = registry.get(&title).and_then(|entry| entry.transform) {
            for edge in [&mut low, &mut high] {
                if edge.as_str() != UNLIMITED {
                    transform.apply(edge, now);
                }
            }
            if transform == ValueTransform::DateTime && title.contains('-') {
                // The CLI spelling of the date column is hyphenated, the
                // column itself is not.
                title = title.replace('-', "_");
            }
        }

        let ready = !title.is_empty()
            && !low.is_empty()
            && !high.is_empty()
            && low != UNLIMITED
            && high != UNLIMITED;
        Self {
            title,
            low_edge: low,
            high_edge: high,
            ready,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn low_edge(&self) -> &str {
        &self.low_edge
    }

    pub fn high_edge(&self) -> &str {
        &self.high_edge
    }

    /// Render the predicate fragment, with ` and ` glue per `concatenation`.
    /// A not-ready condition renders as nothing.
    pub fn render(&self, concatenation: AndState) -> String {
        if !self.ready {
            tracing::warn!("condition not ready, nothing to render");
            return String::new();
        }

        let mut fragment = String::new();
        if concatenation.leading() {
            fragment.push_str(" and ");
        }
        fragment.push_str(&self.title);
        if self.low_edge == self.high_edge {
            fragment.push_str(" = ");
            fragment.push_str(&self.low_edge);
        } else {
            fragment.push_str(" between ");
            fragment.push_str(&self.low_edge);
            fragment.push_str(" and ");
            fragment.push_str(&self.high_edge);
        }
        if concatenation.trailing() {
            fragment.push_str(" and ");
        }
        fragment
    }
}

fn nth_hyphen(value: &str, ordinal: usize) -> usize {
    value
        .char_indices()
        .filter(|(_, c)| *c == '-')
        .map(|(index, _)| index)
        .nth(ordinal)
        .unwrap_or(0)
}
