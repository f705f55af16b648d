//! Plot document model.
//!
//! A plot maps arc names (in story order) to numbered episode summaries. On disk and on
//! the wire it is a JSON object: `{"序章": {"1": "...", "2": "..."}, "第二部": {...}}`.
//! Arc order is kept exactly as written, so it follows the order the model produced.

use crate::error::ApiError;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Episodes of one arc, keyed by episode number
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArcPlot {
    pub name: String,
    pub episodes: BTreeMap<u32, String>,
}

impl ArcPlot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            episodes: BTreeMap::new(),
        }
    }

    pub fn with_episode(mut self, number: u32, plot: impl Into<String>) -> Self {
        self.episodes.insert(number, plot.into());
        self
    }

    pub fn episode_count(&self) -> usize {
        self.episodes.len()
    }

    /// Highest episode number in the arc, 0 when empty.
    pub fn last_episode(&self) -> u32 {
        self.episodes.keys().next_back().copied().unwrap_or(0)
    }

    /// Build an arc from a JSON object of `"number": plot` pairs.
    pub fn from_json(name: &str, value: &Value) -> Result<Self, ApiError> {
        let object = value.as_object().ok_or_else(|| {
            ApiError::PlotParse(format!("Arc '{}' must be a JSON object of episodes", name))
        })?;

        let mut arc = ArcPlot::new(name);
        for (key, plot) in object {
            let number = parse_episode_key(key).ok_or_else(|| {
                ApiError::PlotParse(format!(
                    "Arc '{}' has an episode key without a number: '{}'",
                    name, key
                ))
            })?;
            arc.episodes.insert(number, flatten_episode_value(plot));
        }
        Ok(arc)
    }

    fn to_json(&self) -> Value {
        let map = self
            .episodes
            .iter()
            .map(|(number, plot)| (number.to_string(), Value::String(plot.clone())))
            .collect::<serde_json::Map<String, Value>>();
        Value::Object(map)
    }
}

/// Digits in an episode key: `"3"`, `"第3話"`, `"episode 3"`.
fn parse_episode_key(key: &str) -> Option<u32> {
    let trimmed = key.trim();
    if let Ok(number) = trimmed.parse() {
        return Some(number);
    }
    let digits: String = trimmed
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Structured episode values become `key: value` lines.
fn flatten_episode_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Object(fields) => fields
            .iter()
            .map(|(key, field)| format!("{}: {}", key, flatten_episode_value(field)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Array(items) => items
            .iter()
            .map(flatten_episode_value)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Whole-novel plot: ordered arcs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlotDocument {
    arcs: Vec<ArcPlot>,
}

impl PlotDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    pub fn arcs(&self) -> &[ArcPlot] {
        &self.arcs
    }

    pub fn arc_names(&self) -> Vec<&str> {
        self.arcs.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn arc(&self, name: &str) -> Option<&ArcPlot> {
        self.arcs.iter().find(|a| a.name == name)
    }

    pub fn episode_count(&self, arc: &str) -> usize {
        self.arc(arc).map_or(0, ArcPlot::episode_count)
    }

    pub fn total_episodes(&self) -> usize {
        self.arcs.iter().map(ArcPlot::episode_count).sum()
    }

    /// Plot text for one episode.
    pub fn episode_plot(&self, arc: &str, episode: u32) -> Result<&str, ApiError> {
        let arc_plot = self
            .arc(arc)
            .ok_or_else(|| ApiError::ArcNotFound(arc.to_string()))?;
        arc_plot
            .episodes
            .get(&episode)
            .map(String::as_str)
            .ok_or_else(|| ApiError::EpisodeNotFound {
                arc: arc.to_string(),
                episode,
            })
    }

    /// Replace an arc in place, or append it when new.
    pub fn upsert_arc(&mut self, arc: ArcPlot) {
        match self.arcs.iter_mut().find(|a| a.name == arc.name) {
            Some(existing) => *existing = arc,
            None => self.arcs.push(arc),
        }
    }

    /// Dictionary-update merge: arcs in `other` replace same-named arcs in place, new arcs
    /// are appended in `other`'s order. Arcs only present in `self` are kept untouched.
    pub fn merge(&mut self, other: PlotDocument) {
        for arc in other.arcs {
            self.upsert_arc(arc);
        }
    }

    /// Episode preceding `(arc, episode)` in document order, crossing arc boundaries.
    pub fn previous_episode(&self, arc: &str, episode: u32) -> Option<(&str, u32)> {
        let arc_index = self.arcs.iter().position(|a| a.name == arc)?;
        let current = &self.arcs[arc_index];
        if !current.episodes.contains_key(&episode) {
            return None;
        }
        if let Some((&previous, _)) = current.episodes.range(..episode).next_back() {
            return Some((current.name.as_str(), previous));
        }
        self.arcs[..arc_index]
            .iter()
            .rev()
            .find_map(|a| a.episodes.keys().next_back().map(|&n| (a.name.as_str(), n)))
    }

    /// All `(arc, episode, plot)` triples in document order.
    pub fn iter_episodes(&self) -> impl Iterator<Item = (&str, u32, &str)> {
        self.arcs.iter().flat_map(|arc| {
            arc.episodes
                .iter()
                .map(move |(number, plot)| (arc.name.as_str(), *number, plot.as_str()))
        })
    }

    /// Parse a plot document from model output or file contents.
    pub fn from_json_str(text: &str) -> Result<Self, ApiError> {
        let document: PlotDocument = serde_json::from_str(extract_json(text))
            .map_err(|e| ApiError::PlotParse(format!("Invalid plot JSON: {}", e)))?;
        if document.is_empty() {
            return Err(ApiError::PlotParse("Plot contains no arcs".to_string()));
        }
        Ok(document)
    }

    pub fn to_json_pretty(&self) -> Result<String, ApiError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ApiError::PlotParse(format!("Failed to serialize plot: {}", e)))
    }
}

impl Serialize for PlotDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.arcs.len()))?;
        for arc in &self.arcs {
            map.serialize_entry(&arc.name, &arc.to_json())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PlotDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PlotVisitor;

        impl<'de> Visitor<'de> for PlotVisitor {
            type Value = PlotDocument;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object mapping arc names to episode objects")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut document = PlotDocument::new();
                while let Some((name, value)) = access.next_entry::<String, Value>()? {
                    let arc = ArcPlot::from_json(&name, &value).map_err(de::Error::custom)?;
                    document.upsert_arc(arc);
                }
                Ok(document)
            }
        }

        deserializer.deserialize_map(PlotVisitor)
    }
}

/// The JSON payload of a model response: a ```json fence, any fence, or the outermost braces.
pub fn extract_json(text: &str) -> &str {
    if let Some(body) = fenced_block(text, "```json") {
        return body;
    }
    if let Some(body) = fenced_block(text, "```") {
        if body.trim_start().starts_with('{') {
            return body;
        }
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text.trim(),
    }
}

fn fenced_block<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let rest = &text[start..];
    // Skip the info string ("```json") or language tag up to the newline.
    let body_start = rest.find('\n').map_or(0, |i| i + 1);
    let rest = &rest[body_start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

/// Parse an episode selection like `"1-3,7,9-10"` against `1..=max`.
/// Returns sorted, de-duplicated episode numbers.
pub fn parse_episode_numbers(spec: &str, max: u32) -> Result<Vec<u32>, ApiError> {
    let invalid = |msg: String| ApiError::InvalidEpisodeSpec(msg);
    let parse_number = |raw: &str| -> Result<u32, ApiError> {
        raw.trim()
            .parse::<u32>()
            .map_err(|_| invalid(format!("'{}' is not a valid episode number", raw.trim())))
    };
    let check_range = |n: u32| -> Result<u32, ApiError> {
        if n == 0 || n > max {
            Err(invalid(format!("Episode {} is out of range (1-{})", n, max)))
        } else {
            Ok(n)
        }
    };

    let mut numbers = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(invalid(format!("Empty entry in '{}'", spec)));
        }
        match part.split_once('-') {
            Some((start, end)) => {
                let start = check_range(parse_number(start)?)?;
                let end = check_range(parse_number(end)?)?;
                if start > end {
                    return Err(invalid(format!(
                        "Range start {} is greater than end {}",
                        start, end
                    )));
                }
                numbers.extend(start..=end);
            }
            None => numbers.push(check_range(parse_number(part)?)?),
        }
    }

    numbers.sort_unstable();
    numbers.dedup();
    Ok(numbers)
}
