//! Footprint queries against an image log.
//!
//! The image log is a collection of JSON documents, one per exposure, each
//! carrying a `footprint` vertex list in (RA, Dec) plus arbitrary metadata
//! (`INSTRUME`, `RUNID`, `OBJECT`, nested mosaic tags, ...). Documents are
//! picked with a [`Selector`] in the style of a document-database filter.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::Value;

use crate::error::DataError;
use crate::geom::SkyCoord;
use crate::geom::sphere::mean_position;
use crate::lookup::Lookup;
use crate::polygon::{Polygon, union};

/// Document key holding the footprint vertex list.
pub const FOOTPRINT_KEY: &str = "footprint";

/// Anything that can hand out footprints for a selector.
pub trait FootprintSource {
    /// Footprints of every matching record, `NotFound` if nothing matches.
    fn footprints(&self, selector: &Selector) -> Result<Lookup<Vec<Polygon>>, DataError>;
}

/// Union of the footprints matching `selector`.
///
/// `NotFound` passes straight through; the union only runs on a non-empty set.
pub fn combined_footprint<S>(
    source: &S,
    selector: &Selector,
) -> Result<Lookup<Vec<Polygon>>, DataError>
where
    S: FootprintSource + ?Sized,
{
    match source.footprints(selector)? {
        Lookup::Found(polygons) => Ok(union(&polygons)?),
        Lookup::NotFound => Ok(Lookup::NotFound),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Equals(Value),
    In(Vec<Value>),
}

impl Condition {
    fn matches(&self, field: Option<&Value>) -> bool {
        match self {
            Condition::Equals(target) => match field {
                Some(f) => value_matches(f, target),
                None => target.is_null(),
            },
            Condition::In(targets) => match field {
                Some(f) => targets.iter().any(|t| value_matches(f, t)),
                None => targets.iter().any(Value::is_null),
            },
        }
    }
}

/// A conjunction of per-key conditions.
///
/// Keys may be dotted paths into nested documents (`lsb_mosaic.kind`). A key
/// whose value is an array matches when any element matches. The empty
/// selector matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    clauses: Vec<(String, Condition)>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`.
    pub fn equals(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses
            .push((key.into(), Condition::Equals(value.into())));
        self
    }

    /// Require `key` to equal one of `values`.
    pub fn one_of<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.clauses.push((key.into(), Condition::In(values)));
        self
    }

    /// Parse a filter object such as
    /// `{"INSTRUME": "WIRCam", "RUNID": {"$in": ["07BC20", "07BH47"]}}`.
    ///
    /// Only equality and `$in` are understood.
    pub fn from_json(filter: &Value) -> Result<Self, DataError> {
        let Value::Object(map) = filter else {
            return Err(DataError::InvalidSelector(format!(
                "expected an object, got {filter}"
            )));
        };

        let mut selector = Self::new();
        for (key, value) in map {
            let condition = match value {
                Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
                    parse_operator(key, ops)?
                }
                other => Condition::Equals(other.clone()),
            };
            selector.clauses.push((key.clone(), condition));
        }
        Ok(selector)
    }

    pub fn parse(s: &str) -> Result<Self, DataError> {
        Self::from_json(&serde_json::from_str(s)?)
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses
            .iter()
            .all(|(key, cond)| cond.matches(lookup_path(doc, key)))
    }
}

fn parse_operator(
    key: &str,
    ops: &serde_json::Map<String, Value>,
) -> Result<Condition, DataError> {
    if ops.len() != 1 {
        return Err(DataError::InvalidSelector(format!(
            "{key}: expected a single operator"
        )));
    }
    match ops.get("$in") {
        Some(Value::Array(values)) => Ok(Condition::In(values.clone())),
        Some(other) => Err(DataError::InvalidSelector(format!(
            "{key}: $in needs an array, got {other}"
        ))),
        None => Err(DataError::InvalidSelector(format!(
            "{key}: unsupported operator {}",
            ops.keys().next().map(String::as_str).unwrap_or_default()
        ))),
    }
}

fn lookup_path<'a>(doc: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(doc, |v, part| v.get(part))
}

fn value_matches(field: &Value, target: &Value) -> bool {
    field == target || matches!(field, Value::Array(items) if items.contains(target))
}

/// In-memory image log.
#[derive(Debug, Clone, Default)]
pub struct ImageLog {
    documents: Vec<Value>,
}

impl ImageLog {
    pub fn new(documents: Vec<Value>) -> Self {
        Self { documents }
    }

    /// Parse a JSON array of documents.
    pub fn from_json_str(s: &str) -> Result<Self, DataError> {
        Ok(Self::new(serde_json::from_str(s)?))
    }

    /// Load a JSON array of documents from disk.
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(Self::new(serde_json::from_reader(reader)?))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Matching documents with their positions in the log.
    pub fn find<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = (usize, &'a Value)> {
        self.documents
            .iter()
            .enumerate()
            .filter(move |(_, doc)| selector.matches(doc))
    }

    pub fn count(&self, selector: &Selector) -> usize {
        self.find(selector).count()
    }

    /// Distinct values of `key` among matching documents, in first-seen order.
    pub fn distinct(&self, key: &str, selector: &Selector) -> Vec<Value> {
        let mut seen: Vec<Value> = Vec::new();
        for (_, doc) in self.find(selector) {
            let values = match lookup_path(doc, key) {
                Some(Value::Array(items)) => items.clone(),
                Some(v) => vec![v.clone()],
                None => continue,
            };
            for v in values {
                if !seen.contains(&v) {
                    seen.push(v);
                }
            }
        }
        seen
    }

    /// Mean sky position of all vertices of the matching footprints.
    pub fn mean_coordinate(&self, selector: &Selector) -> Result<Lookup<SkyCoord>, DataError> {
        let Lookup::Found(polygons) = self.footprints(selector)? else {
            return Ok(Lookup::NotFound);
        };
        let points: Vec<(f64, f64)> = polygons
            .iter()
            .flat_map(|p| p.open_vertices().iter().copied())
            .collect();
        Ok(mean_position(&points).into())
    }

    /// One combined footprint per distinct value of `key`, e.g. per `OBJECT`.
    pub fn combined_by_key(
        &self,
        key: &str,
        selector: &Selector,
    ) -> Result<Vec<(Value, Vec<Polygon>)>, DataError> {
        let mut out = Vec::new();
        for value in self.distinct(key, selector) {
            let narrowed = selector.clone().equals(key, value.clone());
            if let Lookup::Found(polygons) = combined_footprint(self, &narrowed)? {
                out.push((value, polygons));
            }
        }
        Ok(out)
    }
}

impl FootprintSource for ImageLog {
    fn footprints(&self, selector: &Selector) -> Result<Lookup<Vec<Polygon>>, DataError> {
        let polygons = self
            .find(selector)
            .map(|(index, doc)| footprint_of(index, doc))
            .collect::<Result<Vec<_>, _>>()?;
        if polygons.is_empty() {
            Ok(Lookup::NotFound)
        } else {
            Ok(Lookup::Found(polygons))
        }
    }
}

fn footprint_of(index: usize, doc: &Value) -> Result<Polygon, DataError> {
    let invalid = |reason: String| DataError::InvalidDocument { index, reason };

    let raw = doc
        .get(FOOTPRINT_KEY)
        .ok_or_else(|| invalid(format!("missing \"{FOOTPRINT_KEY}\"")))?;
    let vertices: Vec<(f64, f64)> =
        serde_json::from_value(raw.clone()).map_err(|e| invalid(e.to_string()))?;
    Polygon::new(vertices).map_err(|e| invalid(e.to_string()))
}
