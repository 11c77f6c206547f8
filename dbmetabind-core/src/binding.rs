//! Binding of raw metadata rows onto typed records.
//!
//! A source reports each category as a list of label → value rows. Binding
//! moves every declared field out of the row, coercing it leniently, and
//! leaves whatever is left over in the record's unknown-field bag:
//!
//! - labels are matched case-insensitively;
//! - integers accept numeric strings, booleans accept `YES`/`NO`/`Y`/`N`/
//!   `TRUE`/`FALSE`/`0`/`1`, text accepts numbers and booleans;
//! - a suppressed field is consumed and left unset, it never reaches the bag;
//! - a value that cannot be coerced stays in the bag and is reported back as
//!   unbound so the aggregator can warn about it.

use crate::category::CategoryId;
use crate::source::MetadataRow;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Driver-reported values without a declared field, keyed by original label.
pub type UnknownFields = BTreeMap<String, Value>;

/// A record type bound from the rows of exactly one category.
pub trait MetadataRecord: Sized {
    /// Category whose rows produce this record.
    const CATEGORY: CategoryId;

    /// Declared field labels, in serialization order.
    const FIELDS: &'static [&'static str];

    /// Reads every declared field from the binder.
    fn bind_fields(binder: &mut RowBinder<'_>) -> Self;

    /// Values the source reported that are not declared fields.
    fn unknown(&self) -> &UnknownFields;

    /// Replaces the unknown-field bag.
    fn set_unknown(&mut self, unknown: UnknownFields);
}

/// Lenient conversion of a raw row value into a field type.
pub trait BindValue: Sized {
    /// Converts the value, or returns `None` if it cannot be represented.
    fn coerce(value: &Value) -> Option<Self>;
}

impl BindValue for String {
    fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }
}

impl BindValue for i64 {
    fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_i64().or_else(|| {
                number
                    .as_f64()
                    .filter(|float| float.fract() == 0.0 && float.abs() < 9.0e15)
                    .map(|float| float as i64)
            }),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

impl BindValue for i32 {
    fn coerce(value: &Value) -> Option<Self> {
        i64::coerce(value).and_then(|wide| i32::try_from(wide).ok())
    }
}

impl BindValue for bool {
    fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(flag) => Some(*flag),
            Value::Number(number) => match number.as_i64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            Value::String(text) => match text.trim().to_ascii_uppercase().as_str() {
                "YES" | "Y" | "TRUE" | "1" => Some(true),
                "NO" | "N" | "FALSE" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Moves declared fields out of one row.
pub struct RowBinder<'a> {
    row: MetadataRow,
    suppressed: &'a BTreeSet<String>,
    unbound: Vec<String>,
}

impl<'a> RowBinder<'a> {
    /// Creates a binder over `row`; labels in `suppressed` are never bound.
    pub fn new(row: MetadataRow, suppressed: &'a BTreeSet<String>) -> Self {
        Self {
            row,
            suppressed,
            unbound: Vec::new(),
        }
    }

    /// Takes the field `label` out of the row and coerces it.
    ///
    /// Returns `None` when the row has no such label, the value is null,
    /// the field is suppressed or the value cannot be coerced.
    pub fn field<T: BindValue>(&mut self, label: &str) -> Option<T> {
        let key = self
            .row
            .keys()
            .find(|key| key.eq_ignore_ascii_case(label))?
            .clone();
        let value = self.row.remove(&key)?;

        if self.suppressed.contains(label) || value.is_null() {
            return None;
        }

        match T::coerce(&value) {
            Some(bound) => Some(bound),
            None => {
                self.unbound.push(key.clone());
                self.row.insert(key, value);
                None
            }
        }
    }

    /// Consumes the binder, returning the leftover labels and the labels
    /// whose values could not be coerced.
    pub fn finish(self) -> (UnknownFields, Vec<String>) {
        (self.row.into_iter().collect(), self.unbound)
    }
}

/// Result of binding one row.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound<R> {
    /// The bound record, unknown bag included
    pub record: R,
    /// Labels of values kept in the bag because they failed coercion
    pub unbound: Vec<String>,
}

/// Binds one row onto `R`, leaving `suppressed` fields unset.
pub fn bind_row<R: MetadataRecord>(row: MetadataRow, suppressed: &BTreeSet<String>) -> Bound<R> {
    let mut binder = RowBinder::new(row, suppressed);
    let mut record = R::bind_fields(&mut binder);
    let (unknown, unbound) = binder.finish();
    record.set_unknown(unknown);
    Bound { record, unbound }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Column, IndexInfo};
    use serde_json::json;

    fn row(value: Value) -> MetadataRow {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_labels_match_case_insensitively() {
        let bound = bind_row::<Column>(
            row(json!({"TABLE_NAME": "T1", "Column_Name": "id", "DATA_TYPE": 4})),
            &BTreeSet::new(),
        );
        assert_eq!(bound.record.table_name.as_deref(), Some("T1"));
        assert_eq!(bound.record.column_name.as_deref(), Some("id"));
        assert_eq!(bound.record.data_type, Some(4));
        assert!(bound.record.unknown.is_empty());
        assert!(bound.unbound.is_empty());
    }

    #[test]
    fn test_undeclared_labels_go_to_unknown_bag() {
        let bound = bind_row::<Column>(
            row(json!({"TABLE_NAME": "T1", "VENDOR_EXTRA": "x"})),
            &BTreeSet::new(),
        );
        assert_eq!(bound.record.unknown.get("VENDOR_EXTRA"), Some(&json!("x")));
    }

    #[test]
    fn test_suppressed_field_is_unset_and_consumed() {
        let suppressed = BTreeSet::from(["remarks".to_string()]);
        let bound = bind_row::<Column>(
            row(json!({"TABLE_NAME": "T1", "REMARKS": "poisoned"})),
            &suppressed,
        );
        assert_eq!(bound.record.remarks, None);
        assert!(bound.record.unknown.is_empty());
    }

    #[test]
    fn test_lenient_coercion() {
        let bound = bind_row::<IndexInfo>(
            row(json!({
                "NON_UNIQUE": "NO",
                "TYPE": "3",
                "ORDINAL_POSITION": 1.0,
                "INDEX_NAME": 42,
                "CARDINALITY": "1000"
            })),
            &BTreeSet::new(),
        );
        assert_eq!(bound.record.non_unique, Some(false));
        assert_eq!(bound.record.index_type, Some(3));
        assert_eq!(bound.record.ordinal_position, Some(1));
        assert_eq!(bound.record.index_name.as_deref(), Some("42"));
        assert_eq!(bound.record.cardinality, Some(1000));
    }

    #[test]
    fn test_uncoercible_value_stays_in_bag() {
        let bound = bind_row::<Column>(
            row(json!({"DATA_TYPE": "varchar", "NULLABLE": null})),
            &BTreeSet::new(),
        );
        assert_eq!(bound.record.data_type, None);
        assert_eq!(bound.record.nullable, None);
        assert_eq!(bound.record.unknown.get("DATA_TYPE"), Some(&json!("varchar")));
        assert_eq!(bound.unbound, vec!["DATA_TYPE".to_string()]);
    }

    #[test]
    fn test_bool_coercion_table() {
        for (raw, expected) in [
            (json!("YES"), Some(true)),
            (json!("no"), Some(false)),
            (json!(1), Some(true)),
            (json!(0), Some(false)),
            (json!("maybe"), None),
            (json!(2), None),
        ] {
            assert_eq!(bool::coerce(&raw), expected, "coercing {raw}");
        }
        assert_eq!(i32::coerce(&json!(i64::MAX)), None);
    }
}
