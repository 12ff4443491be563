//! Tooltip and encyclopedia text
//!
//! Game text files hold one `KEY,text` entry per line. When a unit's shield or
//! hull values change, the stat lines its `Encyclopedia_Text` names are
//! rewritten to show the new numbers. Three line shapes are recognised:
//!
//! - shield tooltips: `Shields: 450 / [9/R] (Corvette)`
//! - stat blocks: `Health: 1200 | Shields: 450` or `Health: 1200 | Unshielded`
//! - hull tooltips: `Hull: 1200 (Frigate)`

use crate::document::Document;
use crate::error::Result;
use crate::resolver::{self, AttributeClass};
use regex::{Captures, Regex};

/// Unit tag listing the text keys of the unit's encyclopedia entry
pub const ENCYCLOPEDIA_TAG: &str = "Encyclopedia_Text";

pub const SHIELD_POINTS: &str = "shield_points";
pub const SHIELD_REFRESH_RATE: &str = "shield_refresh_rate";
pub const TACTICAL_HEALTH: &str = "tactical_health";

/// Whether `attribute` is shown in tooltip text
pub fn is_tooltip_attribute(attribute: &str) -> bool {
    [SHIELD_POINTS, SHIELD_REFRESH_RATE, TACTICAL_HEALTH]
        .iter()
        .any(|a| a.eq_ignore_ascii_case(attribute))
}

/// New stat values of one unit, as resolved by the attribute stage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatValues {
    pub shield_points: Option<f64>,
    pub shield_refresh_rate: Option<f64>,
    pub tactical_health: Option<f64>,
}

impl StatValues {
    /// Keep `value` if `attribute` is shown in tooltips
    pub fn record(&mut self, attribute: &str, value: f64) {
        let slot = if attribute.eq_ignore_ascii_case(SHIELD_POINTS) {
            &mut self.shield_points
        } else if attribute.eq_ignore_ascii_case(SHIELD_REFRESH_RATE) {
            &mut self.shield_refresh_rate
        } else if attribute.eq_ignore_ascii_case(TACTICAL_HEALTH) {
            &mut self.tactical_health
        } else {
            return;
        };
        *slot = Some(value);
    }

    pub fn is_empty(&self) -> bool {
        self.shield_points.is_none() && self.shield_refresh_rate.is_none() && self.tactical_health.is_none()
    }
}

/// `TEXT_*` keys listed in a unit's encyclopedia text, in order
pub fn encyclopedia_keys(doc: &Document, unit: &str) -> Vec<String> {
    let Some(text) = doc.find_entity(unit).and_then(|el| el.child(ENCYCLOPEDIA_TAG)) else {
        return Vec::new();
    };
    doc.text_of(text)
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| token.starts_with("TEXT_"))
        .map(str::to_string)
        .collect()
}

/// Whether a text file has an entry for `key`
pub fn defines_key(source: &str, key: &str) -> bool {
    source.lines().any(|line| is_entry(line, key))
}

fn is_entry(line: &str, key: &str) -> bool {
    line.strip_prefix(key).is_some_and(|rest| rest.starts_with(','))
}

/// One rewritten text entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    /// Whole file content after the edit
    pub content: String,
    pub old: String,
    pub new: String,
}

/// Compiled line patterns
#[derive(Debug)]
pub struct TooltipRewriter {
    stat_block_key: Regex,
    shield_label: Regex,
    shield_value: Regex,
    refresh_rate: Regex,
    health_value: Regex,
    hull_value: Regex,
}

impl TooltipRewriter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            stat_block_key: Regex::new(r"^TEXT_STATBLOCK_.*_BASE$")?,
            shield_label: Regex::new(r"Shields?:")?,
            shield_value: Regex::new(r"(Shields?:\s*)(\d+)")?,
            refresh_rate: Regex::new(r"\[(\d+(?:\.\d+)?)/R\]")?,
            health_value: Regex::new(r"(Health:\s*)(\d+)")?,
            hull_value: Regex::new(r"(Hull:\s*)(\d+)")?,
        })
    }

    /// Keys whose lines carry shield or hull stats
    pub fn is_stat_key(&self, key: &str) -> bool {
        key.contains("_SHIELD") || key.contains("_HULL") || self.stat_block_key.is_match(key)
    }

    /// Rewrite the stats in one line of text
    pub fn rewrite(&self, text: &str, stats: &StatValues) -> String {
        let mut text = text.to_string();

        if self.shield_label.is_match(&text) {
            if let Some(points) = stats.shield_points {
                text = self.replace_number(&self.shield_value, &text, whole(points));
            }
            if let Some(rate) = stats.shield_refresh_rate {
                text = self
                    .refresh_rate
                    .replace_all(&text, |caps: &Captures| {
                        if caps[1].contains('.') {
                            format!("[{}/R]", resolver::format_value(AttributeClass::Scalar, rate))
                        } else {
                            format!("[{}/R]", whole(rate))
                        }
                    })
                    .into_owned();
            }
        }

        if self.health_value.is_match(&text) || text.contains("Unshielded") {
            if let Some(health) = stats.tactical_health {
                text = self.replace_number(&self.health_value, &text, whole(health));
            }
            if let Some(points) = stats.shield_points {
                let points = whole(points);
                if points <= 0 {
                    text = self.shield_value.replace_all(&text, "Unshielded").into_owned();
                } else if text.contains("Unshielded") {
                    text = text.replace("Unshielded", &format!("Shields: {points}"));
                } else {
                    text = self.replace_number(&self.shield_value, &text, points);
                }
            }
        }

        if let Some(health) = stats.tactical_health {
            text = self.replace_number(&self.hull_value, &text, whole(health));
        }
        text
    }

    /// Rewrite the first entry for `key` whose text changes
    ///
    /// Line endings and every other line are kept byte for byte. `None` when
    /// the key is absent or already shows the values.
    pub fn update_entry(&self, source: &str, key: &str, stats: &StatValues) -> Option<TextEdit> {
        let mut offset = 0;
        for line in source.split_inclusive('\n') {
            let body = line.trim_end_matches(['\n', '\r']);
            if is_entry(body, key) {
                let value = &body[key.len() + 1..];
                let rewritten = self.rewrite(value, stats);
                if rewritten != value {
                    let start = offset + key.len() + 1;
                    let end = offset + body.len();
                    let mut content = String::with_capacity(source.len() + rewritten.len());
                    content.push_str(&source[..start]);
                    content.push_str(&rewritten);
                    content.push_str(&source[end..]);
                    return Some(TextEdit {
                        content,
                        old: value.to_string(),
                        new: rewritten,
                    });
                }
            }
            offset += line.len();
        }
        None
    }

    fn replace_number(&self, pattern: &Regex, text: &str, value: i64) -> String {
        pattern
            .replace_all(text, |caps: &Captures| format!("{}{value}", &caps[1]))
            .into_owned()
    }
}

fn whole(value: f64) -> i64 {
    value.round() as i64
}
