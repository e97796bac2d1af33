//! Data models for rating and review aggregates.
//!
//! This module contains the strongly typed records the aggregators work on.
//! Remote values are loosely shaped JSON, so every record is built through a
//! lenient decoder that applies defaulting rules once, before any math runs.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Key holding the submission counter inside a stored ratings record.
pub const TOTAL_SUBMISSIONS_KEY: &str = "total_submissions";

/// Author recorded when a review carries no usable name.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// A rateable attribute of a catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    ValueForMoney,
    Tracking,
    DustLevel,
    Durability,
    Clumping,
    OdourControl,
}

impl Attribute {
    /// Every attribute, in wire order.
    pub const ALL: [Attribute; 6] = [
        Attribute::ValueForMoney,
        Attribute::Tracking,
        Attribute::DustLevel,
        Attribute::Durability,
        Attribute::Clumping,
        Attribute::OdourControl,
    ];

    /// Returns the wire name of the attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::ValueForMoney => "value_for_money",
            Attribute::Tracking => "tracking",
            Attribute::DustLevel => "dust_level",
            Attribute::Durability => "durability",
            Attribute::Clumping => "clumping",
            Attribute::OdourControl => "odour_control",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Attribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Attribute::ALL
            .iter()
            .copied()
            .find(|attr| attr.as_str() == s)
            .ok_or_else(|| format!("unknown attribute: {}", s))
    }
}

/// Coerce a loosely typed JSON value into a finite number.
///
/// Accepts JSON numbers and strings that parse as numbers. Everything else
/// (null, booleans, objects, arrays, junk strings, NaN/inf) yields `None`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Running mean of one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AttributeStat {
    /// Mean of the `count` observed values (0 when nothing was observed).
    pub average: f64,
    /// Number of observed values.
    pub count: u64,
}

impl AttributeStat {
    /// Decode a stored stat, defaulting missing or bad fields to zero.
    ///
    /// The legacy `avg` spelling is accepted when `average` is absent.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let count = obj
            .get("count")
            .and_then(coerce_number)
            .filter(|c| *c >= 0.0)
            .map(|c| c as u64)
            .unwrap_or(0);

        let average = if count == 0 {
            0.0
        } else {
            obj.get("average")
                .or_else(|| obj.get("avg"))
                .and_then(coerce_number)
                .unwrap_or(0.0)
        };

        Self { average, count }
    }

    /// Fold one observed value into the mean.
    ///
    /// Uses `(average * count + v) / (count + 1)`, which drifts slightly
    /// under floating-point rounding over many updates. The count saturates
    /// at `u64::MAX`.
    pub fn observe(&mut self, value: f64) {
        let old_count = self.count as f64;
        let new_count = self.count.saturating_add(1);
        self.average = (self.average * old_count + value) / new_count as f64;
        self.count = new_count;
    }
}

/// Per-attribute aggregate for one item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RatingRecord {
    /// Stats for every attribute that has been rated at least once.
    pub attributes: BTreeMap<Attribute, AttributeStat>,
    /// Every rating submission received, whether or not it carried values.
    pub total_submissions: u64,
    /// Unrecognised keys from the stored record, written back untouched.
    pub extra: Map<String, Value>,
}

impl RatingRecord {
    /// Decode a stored record. Returns `None` when the value is not an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let mut record = Self::default();

        for (key, entry) in obj {
            if key == TOTAL_SUBMISSIONS_KEY {
                record.total_submissions = coerce_number(entry)
                    .filter(|n| *n >= 0.0)
                    .map(|n| n as u64)
                    .unwrap_or(0);
            } else if let Ok(attr) = key.parse::<Attribute>() {
                record.attributes.insert(attr, AttributeStat::from_value(entry));
            } else {
                record.extra.insert(key.clone(), entry.clone());
            }
        }

        Some(record)
    }

    /// Returns the stat for an attribute, empty if never rated.
    pub fn stat(&self, attr: Attribute) -> AttributeStat {
        self.attributes.get(&attr).copied().unwrap_or_default()
    }

    /// Fold one value into an attribute's running mean.
    pub fn observe(&mut self, attr: Attribute, value: f64) {
        self.attributes.entry(attr).or_default().observe(value);
    }
}

impl Serialize for RatingRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map =
            serializer.serialize_map(Some(self.attributes.len() + self.extra.len() + 1))?;
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        for (attr, stat) in &self.attributes {
            map.serialize_entry(attr.as_str(), stat)?;
        }
        map.serialize_entry(TOTAL_SUBMISSIONS_KEY, &self.total_submissions)?;
        map.end()
    }
}

/// A single written review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Display name of the reviewer.
    pub author: String,
    /// Review body.
    pub text: String,
    /// Optional overall score.
    pub score: Option<f64>,
    /// Server-assigned submission time.
    pub submitted_at: DateTime<Utc>,
}

impl Review {
    /// Build a review, substituting the anonymous author for blank names.
    pub fn new(
        author: Option<&str>,
        text: &str,
        score: Option<f64>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        let author = author
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(ANONYMOUS_AUTHOR);

        Self {
            author: author.to_string(),
            text: text.trim().to_string(),
            score,
            submitted_at,
        }
    }
}

/// Ordered, append-only list of reviews for one item.
///
/// Prior entries are kept as raw JSON so legacy or foreign shapes are
/// written back exactly as they were read.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ReviewList {
    entries: Vec<Value>,
}

impl ReviewList {
    /// Decode a stored list. Returns `None` when the value is not an array.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_array().map(|entries| Self {
            entries: entries.clone(),
        })
    }

    /// Append a review at the end of the list.
    pub fn push(&mut self, review: &Review) -> Result<(), serde_json::Error> {
        self.entries.push(serde_json::to_value(review)?);
        Ok(())
    }

    /// Raw entries in submission order.
    pub fn entries(&self) -> &[Value] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
