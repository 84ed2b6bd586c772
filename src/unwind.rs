//! Expansion of nested arrays into per-element rows.

use crate::error::ConversionError;
use crate::keys::CorrelationKeys;
use crate::record::Row;
use crate::schema::UnwindStep;
use serde_json::{Map, Value};
use std::iter;

/// One expanded element together with the keys of every level above it.
pub type Unwound = Result<(Row, CorrelationKeys), ConversionError>;

/// Lazily expand `row` along `path`.
///
/// Segments are resolved left to right. Every element produced by a segment
/// is paired with that step's key fields before the next segment is expanded
/// against it, so each leaf carries the identifiers of its own ancestors
/// only. A missing or `null` array yields nothing; anything else that is not
/// an array of objects yields a single error item for that subtree.
///
/// An empty `path` yields `row` itself with `keys` unchanged.
pub fn unwind<'a>(
    row: &'a Row,
    keys: &CorrelationKeys,
    path: &'a [UnwindStep],
) -> Box<dyn Iterator<Item = Unwound> + 'a> {
    unwind_map(row.as_map(), keys.clone(), path)
}

fn unwind_map<'a>(
    obj: &'a Map<String, Value>,
    keys: CorrelationKeys,
    path: &'a [UnwindStep],
) -> Box<dyn Iterator<Item = Unwound> + 'a> {
    let Some((step, rest)) = path.split_first() else {
        return Box::new(iter::once(Ok((Row::from(obj.clone()), keys))));
    };

    let elements = match obj.get(step.field) {
        None | Some(Value::Null) => return Box::new(iter::empty()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Box::new(iter::once(Err(ConversionError::NotAnArray {
                field: step.field.to_string(),
            })));
        }
    };

    Box::new(elements.iter().flat_map(move |element| {
        let Value::Object(child) = element else {
            return error_item(ConversionError::NotAnObject {
                field: step.field.to_string(),
            });
        };
        match keys.pair_map(child, step.keys, step.carried) {
            Ok(child_keys) => unwind_map(child, child_keys, rest),
            Err(e) => error_item(e),
        }
    }))
}

fn error_item<'a>(e: ConversionError) -> Box<dyn Iterator<Item = Unwound> + 'a> {
    Box::new(iter::once(Err(e)))
}
