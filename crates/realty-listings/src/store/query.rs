//! Filter and sort semantics shared by the in-memory store and its pipeline evaluator.

use std::cmp::Ordering;

use bson::{Bson, Document};

use super::StoreError;

/// Resolve a possibly dotted field path.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = document.get(first)?;
    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

pub(crate) fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// Cross-type ordering bucket, lowest first.
fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

/// Total order over BSON values; a missing field sorts with null.
pub(crate) fn compare(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let left = left.unwrap_or(&Bson::Null);
    let right = right.unwrap_or(&Bson::Null);

    let rank = type_rank(left).cmp(&type_rank(right));
    if rank != Ordering::Equal {
        return rank;
    }

    match (left, right) {
        (Bson::String(a), Bson::String(b)) => a.cmp(b),
        (Bson::ObjectId(a), Bson::ObjectId(b)) => a.bytes().cmp(&b.bytes()),
        (Bson::Boolean(a), Bson::Boolean(b)) => a.cmp(b),
        (Bson::DateTime(a), Bson::DateTime(b)) => a.cmp(b),
        (Bson::Array(a), Bson::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                let ord = compare(Some(x), Some(y));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.len().cmp(&b.len())
        }
        (a, b) => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

/// Equality with numeric widening, so `Int32(5)` equals `Double(5.0)`.
pub(crate) fn values_equal(left: &Bson, right: &Bson) -> bool {
    match (as_f64(left), as_f64(right)) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

fn is_operator_document(value: &Bson) -> Option<&Document> {
    match value {
        Bson::Document(inner) if !inner.is_empty() && inner.keys().all(|k| k.starts_with('$')) => {
            Some(inner)
        }
        _ => None,
    }
}

/// Whether `document` satisfies `filter`. Top-level keys are conjunctive.
pub(crate) fn matches(document: &Document, filter: &Document) -> Result<bool, StoreError> {
    for (field, condition) in filter {
        let actual = lookup(document, field);
        let satisfied = match is_operator_document(condition) {
            Some(operators) => operators_match(actual, operators)?,
            None => match actual {
                Some(value) => values_equal(value, condition),
                None => matches!(condition, Bson::Null),
            },
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn operators_match(actual: Option<&Bson>, operators: &Document) -> Result<bool, StoreError> {
    for (operator, operand) in operators {
        let satisfied = match operator.as_str() {
            "$gte" | "$lte" => match actual {
                Some(value) if type_rank(value) == type_rank(operand) => {
                    let ord = compare(Some(value), Some(operand));
                    if operator == "$gte" {
                        ord != Ordering::Less
                    } else {
                        ord != Ordering::Greater
                    }
                }
                _ => false,
            },
            other => {
                return Err(StoreError::Backend(format!(
                    "unknown operator: {other}"
                )))
            }
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Stable multi-key sort following a `{field: 1 | -1}` specification.
pub(crate) fn sort_documents(documents: &mut [Document], spec: &Document) -> Result<(), StoreError> {
    let mut keys = Vec::with_capacity(spec.len());
    for (field, direction) in spec {
        let descending = match as_f64(direction) {
            Some(d) if d == 1.0 => false,
            Some(d) if d == -1.0 => true,
            _ => {
                return Err(StoreError::Backend(format!(
                    "invalid sort direction for '{field}'"
                )))
            }
        };
        keys.push((field.as_str(), descending));
    }

    documents.sort_by(|a, b| {
        for (field, descending) in &keys {
            let ord = compare(lookup(a, field), lookup(b, field));
            let ord = if *descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn listing(city: &str, price: i64) -> Document {
        doc! { "city": city, "price": price, "propertyType": "Apartment" }
    }

    #[test]
    fn equality_and_range_filters_compose() {
        let filter = doc! { "city": "New York", "price": { "$gte": 400000.0, "$lte": 500000.0 } };
        assert!(matches(&listing("New York", 450000), &filter).unwrap());
        assert!(!matches(&listing("New York", 1200000), &filter).unwrap());
        assert!(!matches(&listing("Chicago", 450000), &filter).unwrap());
    }

    #[test]
    fn range_filters_skip_missing_and_mismatched_types() {
        let filter = doc! { "price": { "$gte": 0 } };
        assert!(!matches(&doc! { "city": "Chicago" }, &filter).unwrap());
        assert!(!matches(&doc! { "price": "cheap" }, &filter).unwrap());
    }

    #[test]
    fn unknown_operator_is_an_error() {
        let filter = doc! { "price": { "$near": 1 } };
        assert!(matches(&listing("Chicago", 1), &filter).is_err());
    }

    #[test]
    fn sort_places_missing_fields_first_when_ascending() {
        let mut documents = vec![
            listing("Chicago", 280000),
            doc! { "city": "Nowhere" },
            listing("Los Angeles", 650000),
        ];
        sort_documents(&mut documents, &doc! { "price": 1 }).unwrap();
        let cities: Vec<&str> = documents
            .iter()
            .map(|d| d.get_str("city").unwrap())
            .collect();
        assert_eq!(cities, ["Nowhere", "Chicago", "Los Angeles"]);

        sort_documents(&mut documents, &doc! { "price": -1 }).unwrap();
        assert_eq!(documents[0].get_str("city").unwrap(), "Los Angeles");
    }

    #[test]
    fn numbers_compare_across_widths() {
        assert!(values_equal(&Bson::Int32(5), &Bson::Double(5.0)));
        assert_eq!(
            compare(Some(&Bson::Int64(10)), Some(&Bson::Double(9.5))),
            Ordering::Greater
        );
    }
}
