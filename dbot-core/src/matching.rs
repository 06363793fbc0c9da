//! Three-way result of filter evaluation and handler matching.

use std::collections::BTreeMap;

use regex::{Captures, Regex};

use crate::types::MessageEntity;

/// Key under which regex filters and pattern handlers report their matches.
pub const MATCHES_KEY: &str = "matches";
/// Key under which command handlers report positional arguments.
pub const ARGS_KEY: &str = "args";
/// Key under which entity filters report the matching entities.
pub const ENTITIES_KEY: &str = "entities";

/// Owned copy of a regex match, so it can be moved into spawned callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexMatch {
    pub text: String,
    pub start: usize,
    pub end: usize,
    /// Positional groups, excluding group 0.
    pub groups: Vec<Option<String>>,
    pub named: BTreeMap<String, String>,
}

impl RegexMatch {
    pub fn from_captures(regex: &Regex, captures: &Captures<'_>) -> Option<Self> {
        let whole = captures.get(0)?;
        let groups = captures
            .iter()
            .skip(1)
            .map(|group| group.map(|m| m.as_str().to_string()))
            .collect();
        let named = regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();
        Some(Self {
            text: whole.as_str().to_string(),
            start: whole.start(),
            end: whole.end(),
            groups,
            named,
        })
    }

    /// Group `index`; 0 is the whole match.
    pub fn group(&self, index: usize) -> Option<&str> {
        if index == 0 {
            return Some(&self.text);
        }
        self.groups.get(index - 1).and_then(|g| g.as_deref())
    }

    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }
}

/// One piece of data extracted by a data filter.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Match(RegexMatch),
    Text(String),
    Entity(MessageEntity),
}

/// Data extracted by data filters, keyed by name. Values for the same key accumulate.
pub type FilterData = BTreeMap<String, Vec<DataValue>>;

/// Outcome of evaluating a filter or checking a handler against an update.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MatchResult {
    #[default]
    NoMatch,
    Match,
    MatchWithData(FilterData),
}

impl MatchResult {
    /// Wraps extracted data. An empty mapping is not a match.
    pub fn with_data(data: FilterData) -> Self {
        if data.is_empty() {
            MatchResult::NoMatch
        } else {
            MatchResult::MatchWithData(data)
        }
    }

    /// Single-key shorthand for [`MatchResult::with_data`]; no values means no match.
    pub fn single(key: &str, values: Vec<DataValue>) -> Self {
        if values.is_empty() {
            return MatchResult::NoMatch;
        }
        let mut data = FilterData::new();
        data.insert(key.to_string(), values);
        MatchResult::MatchWithData(data)
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, MatchResult::NoMatch)
    }

    pub fn data(&self) -> Option<&FilterData> {
        match self {
            MatchResult::MatchWithData(data) => Some(data),
            _ => None,
        }
    }

    pub fn into_data(self) -> FilterData {
        match self {
            MatchResult::MatchWithData(data) => data,
            _ => FilterData::new(),
        }
    }

    /// Combines two successful results. Both sides must be matches: with no data on
    /// either side the result is `Match`, otherwise the mappings are merged key-wise,
    /// concatenating the value lists of shared keys (left values first).
    pub fn merge(self, other: MatchResult) -> MatchResult {
        match (self, other) {
            (MatchResult::NoMatch, _) | (_, MatchResult::NoMatch) => MatchResult::NoMatch,
            (MatchResult::Match, MatchResult::Match) => MatchResult::Match,
            (MatchResult::MatchWithData(data), MatchResult::Match)
            | (MatchResult::Match, MatchResult::MatchWithData(data)) => {
                MatchResult::MatchWithData(data)
            }
            (MatchResult::MatchWithData(mut left), MatchResult::MatchWithData(right)) => {
                for (key, values) in right {
                    left.entry(key).or_default().extend(values);
                }
                MatchResult::MatchWithData(left)
            }
        }
    }
}

impl From<bool> for MatchResult {
    fn from(value: bool) -> Self {
        if value {
            MatchResult::Match
        } else {
            MatchResult::NoMatch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_data(key: &str, value: &str) -> MatchResult {
        MatchResult::single(key, vec![DataValue::Text(value.to_string())])
    }

    #[test]
    fn test_empty_data_is_no_match() {
        assert_eq!(MatchResult::with_data(FilterData::new()), MatchResult::NoMatch);
        assert_eq!(MatchResult::single("k", vec![]), MatchResult::NoMatch);
    }

    #[test]
    fn test_merge_concatenates_shared_keys() {
        let merged = text_data("k", "a").merge(text_data("k", "b"));
        let data = merged.data().unwrap();
        assert_eq!(
            data["k"],
            vec![
                DataValue::Text("a".to_string()),
                DataValue::Text("b".to_string())
            ]
        );
    }

    #[test]
    fn test_merge_keeps_data_over_plain_match() {
        let merged = MatchResult::Match.merge(text_data("k", "a"));
        assert_eq!(merged, text_data("k", "a"));
        assert_eq!(MatchResult::Match.merge(MatchResult::Match), MatchResult::Match);
        assert_eq!(
            MatchResult::Match.merge(MatchResult::NoMatch),
            MatchResult::NoMatch
        );
    }

    #[test]
    fn test_regex_match_groups() {
        let regex = Regex::new(r"(?P<word>\w+)-(\d+)?").unwrap();
        let captures = regex.captures("x abc- y").unwrap();
        let m = RegexMatch::from_captures(&regex, &captures).unwrap();
        assert_eq!(m.group(0), Some("abc-"));
        assert_eq!(m.group(1), Some("abc"));
        assert_eq!(m.group(2), None);
        assert_eq!(m.name("word"), Some("abc"));
        assert_eq!((m.start, m.end), (2, 6));
    }
}
