//! Measurement records handed from producers to the bridge.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// A single measurement sample.
///
/// Points are assembled with the builder methods and then handed to the
/// bridge, which never modifies them. Tags and fields keep insertion order so
/// the wire output is reproducible.
///
/// ```
/// use execd_common::Point;
///
/// let point = Point::new("temp").tag("room", "kitchen").field("value", 21.5);
/// assert_eq!(point.measurement(), "temp");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
    timestamp: Option<i64>,
}

impl Point {
    /// Create a point for the given measurement with no tags or fields.
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp: None,
        }
    }

    /// Add a tag. Setting an existing key replaces its value in place.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        upsert(&mut self.tags, key.into(), value.into());
        self
    }

    /// Add multiple tags in iteration order.
    pub fn tags<K, V>(mut self, tags: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in tags {
            upsert(&mut self.tags, key.into(), value.into());
        }
        self
    }

    /// Add a field. Setting an existing key replaces its value in place.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        upsert(&mut self.fields, key.into(), value.into());
        self
    }

    /// Set the timestamp in nanoseconds since the Unix epoch.
    pub fn timestamp(mut self, nanos: i64) -> Self {
        self.timestamp = Some(nanos);
        self
    }

    /// Set the timestamp from a UTC datetime.
    ///
    /// Datetimes outside the nanosecond range (roughly years 1677..2262) leave
    /// the timestamp unset so the collector assigns its receipt time.
    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.timestamp = time.timestamp_nanos_opt();
        self
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tag_pairs(&self) -> &[(String, String)] {
        &self.tags
    }

    pub fn field_pairs(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    /// Look up a field by key.
    pub fn get_field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Look up a tag by key.
    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn timestamp_nanos(&self) -> Option<i64> {
        self.timestamp
    }

    /// Check the structural requirements of the wire format.
    ///
    /// A point needs a measurement name and at least one field that can be
    /// written. Non-finite floats are not representable and do not count.
    pub fn validate(&self) -> Result<()> {
        if self.measurement.is_empty() {
            return Err(Error::validation("measurement name is empty"));
        }
        if self.tags.iter().any(|(k, _)| k.is_empty()) {
            return Err(Error::validation(format!(
                "point '{}' has a tag with an empty key",
                self.measurement
            )));
        }
        if self.fields.iter().any(|(k, _)| k.is_empty()) {
            return Err(Error::validation(format!(
                "point '{}' has a field with an empty key",
                self.measurement
            )));
        }
        for (key, value) in &self.fields {
            if let FieldValue::String(s) = value {
                if s.contains(['\n', '\r']) {
                    return Err(Error::validation(format!(
                        "field '{}' of point '{}' contains a line break",
                        key, self.measurement
                    )));
                }
            }
        }
        if !self.fields.iter().any(|(_, v)| v.is_writable()) {
            return Err(Error::validation(format!(
                "point '{}' has no fields",
                self.measurement
            )));
        }
        Ok(())
    }
}

fn upsert<V>(pairs: &mut Vec<(String, V)>, key: String, value: V) {
    match pairs.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => pairs.push((key, value)),
    }
}

/// Typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Signed integer, written with an `i` suffix.
    Integer(i64),

    /// Unsigned integer, written with a `u` suffix.
    UInteger(u64),

    /// Floating point number.
    Float(f64),

    /// Quoted string.
    String(String),

    /// Boolean, written as `t` or `f`.
    Boolean(bool),
}

impl FieldValue {
    /// Whether the value can be written in line protocol.
    pub fn is_writable(&self) -> bool {
        match self {
            FieldValue::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(v.into())
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::UInteger(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::UInteger(v.into())
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(v.into())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

/// The points a producer yields for one trigger.
///
/// A batch may be empty, in which case nothing is written for that cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch(Vec<Point>);

impl Batch {
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Validate every point, stopping at the first failure.
    pub fn validate(&self) -> Result<()> {
        self.0.iter().try_for_each(Point::validate)
    }
}

impl From<Point> for Batch {
    fn from(point: Point) -> Self {
        Self(vec![point])
    }
}

impl From<Vec<Point>> for Batch {
    fn from(points: Vec<Point>) -> Self {
        Self(points)
    }
}

impl FromIterator<Point> for Batch {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_creation() {
        let point = Point::new("inverter")
            .tag("serial", "GW123")
            .field("power_w", 1520i64)
            .field("online", true)
            .timestamp(1_700_000_000_000_000_000);

        assert_eq!(point.measurement(), "inverter");
        assert_eq!(point.get_tag("serial"), Some("GW123"));
        assert_eq!(point.get_field("power_w"), Some(&FieldValue::Integer(1520)));
        assert_eq!(point.get_field("online"), Some(&FieldValue::Boolean(true)));
        assert_eq!(point.timestamp_nanos(), Some(1_700_000_000_000_000_000));
        assert!(point.validate().is_ok());
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let point = Point::new("m")
            .tag("zone", "b")
            .tag("area", "a")
            .field("z", 1.0)
            .field("a", 2.0);

        let tag_keys: Vec<_> = point.tag_pairs().iter().map(|(k, _)| k.as_str()).collect();
        let field_keys: Vec<_> = point.field_pairs().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(tag_keys, ["zone", "area"]);
        assert_eq!(field_keys, ["z", "a"]);
    }

    #[test]
    fn test_repeated_key_replaces_in_place() {
        let point = Point::new("m")
            .field("a", 1i64)
            .field("b", 2i64)
            .field("a", 3i64);

        assert_eq!(point.field_pairs().len(), 2);
        assert_eq!(point.field_pairs()[0], ("a".to_string(), FieldValue::Integer(3)));
    }

    #[test]
    fn test_validate_no_fields() {
        let err = Point::new("temp").tag("room", "a").validate().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("no fields"));
    }

    #[test]
    fn test_validate_empty_measurement() {
        assert!(Point::new("").field("v", 1.0).validate().is_err());
    }

    #[test]
    fn test_validate_only_non_finite_fields() {
        let point = Point::new("m").field("v", f64::NAN).field("w", f64::INFINITY);
        assert!(point.validate().is_err());

        let point = point.field("x", 1.0);
        assert!(point.validate().is_ok());
    }

    #[test]
    fn test_validate_line_break_in_string_field() {
        let point = Point::new("m").field("msg", "two\nlines");
        assert!(point.validate().is_err());
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(FieldValue::from(42i64), FieldValue::Integer(42));
        assert_eq!(FieldValue::from(42u64), FieldValue::UInteger(42));
        assert_eq!(FieldValue::from(2.5), FieldValue::Float(2.5));
        assert_eq!(FieldValue::from("on"), FieldValue::String("on".to_string()));
        assert_eq!(FieldValue::from(false), FieldValue::Boolean(false));
    }

    #[test]
    fn test_batch_conversions() {
        let single: Batch = Point::new("a").field("v", 1.0).into();
        assert_eq!(single.len(), 1);

        let many: Batch = vec![
            Point::new("a").field("v", 1.0),
            Point::new("b").field("v", 2.0),
        ]
        .into();
        assert_eq!(many.len(), 2);

        assert!(Batch::empty().is_empty());
        assert!(Batch::empty().validate().is_ok());
    }

    #[test]
    fn test_time_sets_nanos() {
        let time = DateTime::from_timestamp(1, 500).unwrap();
        let point = Point::new("m").field("v", 1.0).time(time);
        assert_eq!(point.timestamp_nanos(), Some(1_000_000_500));
    }
}
