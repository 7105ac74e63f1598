//! In-process evaluation of the aggregation stages used by the analytics endpoints.
//!
//! Supported stages: `$group`, `$bucket`, `$sort`, `$limit`, `$project`.
//! Supported expressions: field paths, literals, `$literal`, `$round`, `$toString`, `$switch`,
//! `$eq`.
//! Anything else is an error.

use bson::{Bson, Document};

use super::query::{self, as_f64, compare, lookup, values_equal};
use super::StoreError;

pub(crate) fn run(mut documents: Vec<Document>, stages: &[Document]) -> Result<Vec<Document>, StoreError> {
    for stage in stages {
        let (name, spec) = single_entry(stage)?;
        documents = match name {
            "$group" => group(documents, as_document(name, spec)?)?,
            "$bucket" => bucket(documents, as_document(name, spec)?)?,
            "$sort" => {
                query::sort_documents(&mut documents, as_document(name, spec)?)?;
                documents
            }
            "$limit" => {
                let limit = as_f64(spec)
                    .filter(|value| *value > 0.0)
                    .ok_or_else(|| invalid("$limit must be a positive number"))?;
                documents.truncate(limit as usize);
                documents
            }
            "$project" => {
                let projection = as_document(name, spec)?;
                documents
                    .iter()
                    .map(|document| project(document, projection))
                    .collect::<Result<_, _>>()?
            }
            other => return Err(invalid(format!("unsupported pipeline stage: {other}"))),
        };
    }
    Ok(documents)
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::Backend(message.into())
}

fn single_entry(stage: &Document) -> Result<(&str, &Bson), StoreError> {
    let mut entries = stage.iter();
    match (entries.next(), entries.next()) {
        (Some((name, spec)), None) => Ok((name.as_str(), spec)),
        _ => Err(invalid("a pipeline stage must have exactly one field")),
    }
}

fn as_document<'a>(context: &str, value: &'a Bson) -> Result<&'a Document, StoreError> {
    match value {
        Bson::Document(inner) => Ok(inner),
        _ => Err(invalid(format!("{context} specification must be an object"))),
    }
}

fn group(documents: Vec<Document>, spec: &Document) -> Result<Vec<Document>, StoreError> {
    let key_expr = spec
        .get("_id")
        .ok_or_else(|| invalid("a group specification must include an _id"))?;

    let mut groups: Vec<(Bson, Vec<Document>)> = Vec::new();
    for document in documents {
        let key = evaluate(key_expr, &document)?;
        match groups.iter_mut().find(|(existing, _)| values_equal(existing, &key)) {
            Some((_, members)) => members.push(document),
            None => groups.push((key, vec![document])),
        }
    }

    let accumulators: Vec<(&String, &Bson)> = spec.iter().filter(|(k, _)| *k != "_id").collect();
    groups
        .into_iter()
        .map(|(key, members)| {
            let mut row = Document::new();
            row.insert("_id", key);
            for (field, accumulator) in &accumulators {
                row.insert(field.as_str(), accumulate(accumulator, &members)?);
            }
            Ok(row)
        })
        .collect()
}

fn bucket(documents: Vec<Document>, spec: &Document) -> Result<Vec<Document>, StoreError> {
    let group_by = spec
        .get("groupBy")
        .ok_or_else(|| invalid("$bucket requires groupBy"))?;
    let boundaries = match spec.get("boundaries") {
        Some(Bson::Array(values)) if values.len() >= 2 => values,
        _ => return Err(invalid("$bucket requires at least two boundaries")),
    };
    let default = spec.get("default");
    let default_output = Document::from_iter([(
        "count".to_string(),
        Bson::Document(Document::from_iter([("$sum".to_string(), Bson::Int32(1))])),
    )]);
    let output = match spec.get("output") {
        Some(value) => as_document("$bucket output", value)?,
        None => &default_output,
    };

    // One slot per lower boundary plus a trailing slot for the default bucket.
    let mut slots: Vec<Vec<Document>> = vec![Vec::new(); boundaries.len()];
    for document in documents {
        let value = evaluate(group_by, &document)?;
        let slot = boundaries.windows(2).position(|edge| {
            compare(Some(&edge[0]), Some(&value)).is_le()
                && compare(Some(&value), Some(&edge[1])).is_lt()
                && as_f64(&value).is_some()
        });
        match (slot, default) {
            (Some(index), _) => slots[index].push(document),
            (None, Some(_)) => slots[boundaries.len() - 1].push(document),
            (None, None) => {
                return Err(invalid(
                    "$bucket could not place a document and no default was given",
                ))
            }
        }
    }

    let mut rows = Vec::new();
    for (index, members) in slots.into_iter().enumerate() {
        if members.is_empty() {
            continue;
        }
        let key = if index == boundaries.len() - 1 {
            default.cloned().unwrap_or(Bson::Null)
        } else {
            boundaries[index].clone()
        };
        let mut row = Document::new();
        row.insert("_id", key);
        for (field, accumulator) in output {
            row.insert(field.as_str(), accumulate(accumulator, &members)?);
        }
        rows.push(row);
    }
    Ok(rows)
}

fn accumulate(spec: &Bson, members: &[Document]) -> Result<Bson, StoreError> {
    let (operator, argument) = match spec {
        Bson::Document(inner) => single_entry(inner)?,
        _ => return Err(invalid("an accumulator must be an object")),
    };

    let mut values = Vec::with_capacity(members.len());
    for member in members {
        values.push(evaluate(argument, member)?);
    }

    match operator {
        "$sum" => Ok(sum(&values)),
        "$avg" => {
            let numbers: Vec<f64> = values.iter().filter_map(as_f64).collect();
            if numbers.is_empty() {
                Ok(Bson::Null)
            } else {
                Ok(Bson::Double(numbers.iter().sum::<f64>() / numbers.len() as f64))
            }
        }
        "$min" => Ok(values
            .into_iter()
            .filter(|v| !matches!(v, Bson::Null))
            .min_by(|a, b| compare(Some(a), Some(b)))
            .unwrap_or(Bson::Null)),
        "$max" => Ok(values
            .into_iter()
            .filter(|v| !matches!(v, Bson::Null))
            .max_by(|a, b| compare(Some(a), Some(b)))
            .unwrap_or(Bson::Null)),
        "$push" => Ok(Bson::Array(values)),
        other => Err(invalid(format!("unsupported accumulator: {other}"))),
    }
}

/// Integer sums stay integral until a double is seen or the 64-bit total overflows, matching
/// the server's widening.
fn sum(values: &[Bson]) -> Bson {
    let mut integral: Option<i64> = Some(0);
    let mut fractional: f64 = 0.0;
    let mut saw_long = false;
    let mut saw_double = false;
    for value in values {
        let addend = match value {
            Bson::Int32(v) => i64::from(*v),
            Bson::Int64(v) => {
                saw_long = true;
                *v
            }
            Bson::Double(v) => {
                saw_double = true;
                fractional += *v;
                continue;
            }
            _ => continue,
        };
        integral = match integral {
            Some(total) => total.checked_add(addend).or_else(|| {
                fractional += total as f64 + addend as f64;
                None
            }),
            None => {
                fractional += addend as f64;
                None
            }
        };
    }
    match integral {
        Some(total) if saw_double => Bson::Double(fractional + total as f64),
        Some(total) if saw_long => Bson::Int64(total),
        Some(total) => i32::try_from(total).map_or(Bson::Int64(total), Bson::Int32),
        None => Bson::Double(fractional),
    }
}

fn is_flag(value: &Bson) -> Option<bool> {
    match value {
        Bson::Boolean(flag) => Some(*flag),
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => as_f64(value).map(|v| v != 0.0),
        _ => None,
    }
}

fn project(document: &Document, projection: &Document) -> Result<Document, StoreError> {
    let mut row = Document::new();
    match projection.get("_id") {
        Some(value) if is_flag(value) == Some(false) => {}
        Some(value) if is_flag(value).is_none() => {
            row.insert("_id", evaluate(value, document)?);
        }
        _ => {
            if let Some(id) = document.get("_id") {
                row.insert("_id", id.clone());
            }
        }
    }

    for (field, value) in projection {
        if field == "_id" {
            continue;
        }
        match is_flag(value) {
            Some(true) => {
                if let Some(existing) = lookup(document, field) {
                    row.insert(field.as_str(), existing.clone());
                }
            }
            Some(false) => {
                return Err(invalid(format!(
                    "cannot exclude '{field}' in an inclusion projection"
                )))
            }
            None => {
                row.insert(field.as_str(), evaluate(value, document)?);
            }
        }
    }
    Ok(row)
}

/// Evaluate an aggregation expression against one document.
fn evaluate(expression: &Bson, document: &Document) -> Result<Bson, StoreError> {
    match expression {
        Bson::String(path) if path.starts_with('$') => {
            Ok(lookup(document, &path[1..]).cloned().unwrap_or(Bson::Null))
        }
        Bson::Document(inner) if inner.len() == 1 && inner.keys().all(|k| k.starts_with('$')) => {
            let (operator, argument) = single_entry(inner)?;
            evaluate_operator(operator, argument, document)
        }
        Bson::Document(inner) => {
            let mut out = Document::new();
            for (field, value) in inner {
                out.insert(field.as_str(), evaluate(value, document)?);
            }
            Ok(Bson::Document(out))
        }
        Bson::Array(items) => items
            .iter()
            .map(|item| evaluate(item, document))
            .collect::<Result<Vec<_>, _>>()
            .map(Bson::Array),
        literal => Ok(literal.clone()),
    }
}

fn evaluate_operator(operator: &str, argument: &Bson, document: &Document) -> Result<Bson, StoreError> {
    match operator {
        "$literal" => Ok(argument.clone()),
        "$round" => {
            let (value, places) = match argument {
                Bson::Array(args) if !args.is_empty() && args.len() <= 2 => {
                    let places = match args.get(1) {
                        Some(p) => as_f64(&evaluate(p, document)?)
                            .ok_or_else(|| invalid("$round place must be a number"))?
                            as i32,
                        None => 0,
                    };
                    (evaluate(&args[0], document)?, places)
                }
                other => (evaluate(other, document)?, 0),
            };
            Ok(round(value, places))
        }
        "$toString" => {
            let value = evaluate(argument, document)?;
            Ok(match value {
                Bson::Null => Bson::Null,
                Bson::String(s) => Bson::String(s),
                Bson::ObjectId(id) => Bson::String(id.to_hex()),
                Bson::Int32(v) => Bson::String(v.to_string()),
                Bson::Int64(v) => Bson::String(v.to_string()),
                Bson::Double(v) => Bson::String(v.to_string()),
                Bson::Boolean(v) => Bson::String(v.to_string()),
                Bson::DateTime(dt) => Bson::String(
                    dt.try_to_rfc3339_string()
                        .map_err(|err| invalid(err.to_string()))?,
                ),
                other => return Err(invalid(format!("$toString cannot convert {other}"))),
            })
        }
        "$eq" => match argument {
            Bson::Array(args) if args.len() == 2 => {
                let left = evaluate(&args[0], document)?;
                let right = evaluate(&args[1], document)?;
                Ok(Bson::Boolean(values_equal(&left, &right)))
            }
            _ => Err(invalid("$eq takes exactly two arguments")),
        },
        "$switch" => {
            let spec = as_document("$switch", argument)?;
            let branches = match spec.get("branches") {
                Some(Bson::Array(branches)) => branches,
                _ => return Err(invalid("$switch requires a branches array")),
            };
            for branch in branches {
                let branch = as_document("$switch branch", branch)?;
                let case = branch
                    .get("case")
                    .ok_or_else(|| invalid("$switch branch requires case"))?;
                if truthy(&evaluate(case, document)?) {
                    let then = branch
                        .get("then")
                        .ok_or_else(|| invalid("$switch branch requires then"))?;
                    return evaluate(then, document);
                }
            }
            match spec.get("default") {
                Some(default) => evaluate(default, document),
                None => Err(invalid("$switch found no matching branch and no default")),
            }
        }
        other => Err(invalid(format!("unsupported expression operator: {other}"))),
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Null | Bson::Undefined => false,
        other => as_f64(other).map_or(true, |v| v != 0.0),
    }
}

/// Round half to even, leaving integers untouched.
fn round(value: Bson, places: i32) -> Bson {
    match value {
        Bson::Double(v) => {
            let factor = 10f64.powi(places);
            Bson::Double((v * factor).round_ties_even() / factor)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn listings() -> Vec<Document> {
        vec![
            doc! { "title": "Downtown", "city": "New York", "price": 450000, "propertyType": "Apartment" },
            doc! { "title": "Family Home", "city": "Los Angeles", "price": 650000, "propertyType": "House" },
            doc! { "title": "Penthouse", "city": "New York", "price": 1200000, "propertyType": "Penthouse" },
            doc! { "title": "Studio", "city": "Chicago", "price": 280000, "propertyType": "Apartment" },
        ]
    }

    #[test]
    fn group_computes_accumulators_per_key() {
        let stages = vec![
            doc! { "$group": {
                "_id": "$city",
                "averagePrice": { "$avg": "$price" },
                "count": { "$sum": 1 },
                "minPrice": { "$min": "$price" },
                "maxPrice": { "$max": "$price" },
            }},
            doc! { "$sort": { "averagePrice": -1 } },
        ];
        let rows = run(listings(), &stages).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get_str("_id").unwrap(), "New York");
        assert_eq!(rows[0].get_f64("averagePrice").unwrap(), 825000.0);
        assert_eq!(rows[0].get_i32("count").unwrap(), 2);
        assert_eq!(rows[0].get("minPrice"), Some(&Bson::Int32(450000)));
        assert_eq!(rows[0].get("maxPrice"), Some(&Bson::Int32(1200000)));
        assert_eq!(rows[2].get_str("_id").unwrap(), "Chicago");
    }

    #[test]
    fn bucket_uses_lower_inclusive_upper_exclusive_edges() {
        let documents = vec![
            doc! { "price": 0 },
            doc! { "price": 299999.99 },
            doc! { "price": 300000 },
            doc! { "price": 10000000 },
            doc! { "price": -5 },
        ];
        let stages = vec![doc! { "$bucket": {
            "groupBy": "$price",
            "boundaries": [0, 300000, 500000],
            "default": "Other",
        }}];
        let rows = run(documents, &stages).unwrap();
        let summary: Vec<(Bson, i32)> = rows
            .iter()
            .map(|row| (row.get("_id").cloned().unwrap(), row.get_i32("count").unwrap()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Bson::Int32(0), 2),
                (Bson::Int32(300000), 1),
                (Bson::String("Other".into()), 2),
            ]
        );
    }

    #[test]
    fn project_switch_labels_bucket_keys() {
        let stages = vec![doc! { "$project": {
            "_id": 0,
            "label": { "$switch": {
                "branches": [ { "case": { "$eq": ["$_id", 0] }, "then": "low" } ],
                "default": "high",
            }},
            "count": 1,
        }}];
        let rows = run(
            vec![doc! { "_id": 0, "count": 3 }, doc! { "_id": 500, "count": 1 }],
            &stages,
        )
        .unwrap();
        assert_eq!(rows[0], doc! { "label": "low", "count": 3 });
        assert_eq!(rows[1], doc! { "label": "high", "count": 1 });
    }

    #[test]
    fn round_uses_bankers_rounding() {
        assert_eq!(round(Bson::Double(2.345), 2), Bson::Double(2.34));
        assert_eq!(round(Bson::Double(0.125), 2), Bson::Double(0.12));
        assert_eq!(round(Bson::Int32(7), 2), Bson::Int32(7));
    }

    #[test]
    fn limit_truncates_and_unknown_stage_fails() {
        let rows = run(listings(), &[doc! { "$limit": 2 }]).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(run(listings(), &[doc! { "$unwind": "$tags" }]).is_err());
    }

    #[test]
    fn sum_widens_to_double_only_when_needed() {
        assert_eq!(sum(&[Bson::Int32(1), Bson::Int32(2)]), Bson::Int32(3));
        assert_eq!(sum(&[Bson::Int32(1), Bson::Int64(2)]), Bson::Int64(3));
        assert_eq!(sum(&[Bson::Int32(1), Bson::Double(0.5)]), Bson::Double(1.5));
        assert_eq!(sum(&[Bson::Int64(i64::from(i32::MAX) + 1)]), Bson::Int64(2147483648));
    }

    #[test]
    fn sum_widens_to_double_on_long_overflow() {
        let total = sum(&[Bson::Int64(i64::MAX), Bson::Int64(i64::MAX), Bson::Int32(2)]);
        match total {
            Bson::Double(value) => assert_eq!(value, 2.0 * i64::MAX as f64 + 2.0),
            other => panic!("expected a double, got {other:?}"),
        }
    }
}
