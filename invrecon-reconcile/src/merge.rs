//! Cross-source merging of plugin results.

use invrecon_model::{keys, value_to_string, ScanResults};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// The sorted names of the sources that reported one value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceSet(Vec<String>);

impl SourceSet {
    /// Builds a set from source names, sorting and deduplicating them.
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = sources.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();
        Self(names)
    }

    #[must_use]
    pub fn contains(&self, source: &str) -> bool {
        self.0.iter().any(|s| s == source)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Joins the names with `,`. Commas and backslashes inside a name are
/// escaped with a backslash so the string form parses back unchanged.
impl fmt::Display for SourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            for c in name.chars() {
                if matches!(c, ',' | '\\') {
                    f.write_str("\\")?;
                }
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

impl Serialize for SourceSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SourceSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let joined = String::deserialize(deserializer)?;
        if joined.is_empty() {
            return Err(de::Error::custom("empty source set"));
        }
        split_escaped(&joined).map(Self::new).map_err(de::Error::custom)
    }
}

fn split_escaped(joined: &str) -> Result<Vec<String>, &'static str> {
    let mut names = Vec::new();
    let mut current = String::new();
    let mut chars = joined.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.push(chars.next().ok_or("dangling escape in source set")?),
            ',' => names.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    names.push(current);
    Ok(names)
}

/// Values one field took across sources, keyed by the sources that agree.
pub type MergedField = BTreeMap<SourceSet, Value>;

/// Merged payload: field name to the distinct values reported for it.
pub type MergedData = BTreeMap<String, MergedField>;

/// Merges the device payloads of several scans.
///
/// Values are grouped by their string form, so sources reporting `12` and
/// `"12"` agree. Each group maps to the value reported by its
/// lexicographically first source. With `only_multiple`, fields on which all
/// sources agree are dropped, except the model name and type.
///
/// When the same plugin appears in several scans, its last payload wins.
#[must_use]
pub fn merge(sources: &[&ScanResults], only_multiple: bool) -> MergedData {
    let mut by_field: BTreeMap<&str, BTreeMap<&str, &Value>> = BTreeMap::new();
    for results in sources {
        for (plugin, result) in results.iter() {
            let Some(device) = &result.device else {
                continue;
            };
            for (field, value) in device {
                by_field
                    .entry(field.as_str())
                    .or_default()
                    .insert(plugin.as_str(), value);
            }
        }
    }

    let mut merged = MergedData::new();
    for (field, values) in by_field {
        let mut groups: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for (plugin, value) in &values {
            groups.entry(value_to_string(value)).or_default().push(*plugin);
        }
        if only_multiple && groups.len() <= 1 && !keys::ALWAYS_MERGED.contains(&field) {
            continue;
        }
        let entry = merged.entry(field.to_string()).or_default();
        for plugins in groups.into_values() {
            let first = plugins[0];
            entry.insert(SourceSet::new(plugins), values[first].clone());
        }
    }
    merged
}
