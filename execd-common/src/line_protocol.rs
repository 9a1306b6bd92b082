//! InfluxDB line protocol encoding.
//!
//! ```text
//! measurement[,tag=value...] field=value[,field=value...] [timestamp]
//! ```

use std::fmt::Write;

use crate::error::Result;
use crate::point::{Batch, FieldValue, Point};

/// Encode a batch as newline-terminated lines.
///
/// Every point is validated before any text is produced, so an invalid point
/// anywhere in the batch yields an error and no output at all.
pub fn serialize(batch: &Batch) -> Result<String> {
    batch.validate()?;

    let mut out = String::new();
    for point in batch {
        write_point(&mut out, point);
        out.push('\n');
    }
    Ok(out)
}

/// Encode a single point as one line, without the trailing newline.
pub fn serialize_point(point: &Point) -> Result<String> {
    point.validate()?;

    let mut out = String::new();
    write_point(&mut out, point);
    Ok(out)
}

fn write_point(out: &mut String, point: &Point) {
    escape_into(out, point.measurement(), MEASUREMENT_ESCAPES);

    // Empty tag values cannot be represented and are dropped.
    for (key, value) in point.tag_pairs() {
        if value.is_empty() {
            continue;
        }
        out.push(',');
        escape_into(out, key, KEY_ESCAPES);
        out.push('=');
        escape_into(out, value, KEY_ESCAPES);
    }

    let mut first = true;
    for (key, value) in point.field_pairs() {
        if !value.is_writable() {
            continue;
        }
        out.push(if first { ' ' } else { ',' });
        first = false;
        escape_into(out, key, KEY_ESCAPES);
        out.push('=');
        write_value(out, value);
    }

    if let Some(ts) = point.timestamp_nanos() {
        let _ = write!(out, " {}", ts);
    }
}

fn write_value(out: &mut String, value: &FieldValue) {
    // Writing into a String cannot fail.
    let _ = match value {
        FieldValue::Integer(v) => write!(out, "{}i", v),
        FieldValue::UInteger(v) => write!(out, "{}u", v),
        FieldValue::Float(v) => write!(out, "{}", v),
        FieldValue::Boolean(v) => write!(out, "{}", if *v { 't' } else { 'f' }),
        FieldValue::String(v) => {
            out.push('"');
            escape_into(out, v, STRING_ESCAPES);
            out.push('"');
            Ok(())
        }
    };
}

const MEASUREMENT_ESCAPES: &[(char, &str)] = &[
    (',', "\\,"),
    (' ', "\\ "),
    ('\n', "\\n"),
    ('\t', "\\t"),
    ('\r', "\\r"),
];

const KEY_ESCAPES: &[(char, &str)] = &[
    ('\\', "\\\\"),
    (',', "\\,"),
    (' ', "\\ "),
    ('=', "\\="),
    ('\n', "\\n"),
    ('\t', "\\t"),
    ('\r', "\\r"),
];

const STRING_ESCAPES: &[(char, &str)] = &[('"', "\\\""), ('\\', "\\\\")];

fn escape_into(out: &mut String, s: &str, table: &[(char, &str)]) {
    for c in s.chars() {
        match table.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
}
