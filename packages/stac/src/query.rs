//! The [`StacQuery`] descriptor: construction, derived accessors and the
//! flat attribute namespace shared by typed fields and extension attributes.

use std::str::FromStr;

use geojson::Geometry;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::spatial::{BoundingBox, SpatialFilter};
use crate::temporal::{TimeRange, is_valid_temporal, parse_temporal};
use crate::{ConstructionError, MissingSpatialFilterError, QueryError};

/// Parameters with a typed representation on [`StacQuery`].
const TYPED_KEYS: &[&str] = &[
    "ids",
    "bbox",
    "intersects",
    "contains",
    "time",
    "limit",
    "time_series",
];

/// Names of derived accessors. Raw values under these keys are dropped and
/// they can never be injected as attributes.
const RESERVED_KEYS: &[&str] = &["geometry", "bounds"];

/// Spatial parameters, in accessor priority order.
const SPATIAL_KEYS: [&str; 3] = ["bbox", "intersects", "contains"];

const DEFAULT_LIMIT: u64 = 1;

/// Schema check run over the raw query before any field is extracted.
///
/// Implemented for every `Fn(&Map<String, Value>) -> bool`, so call sites
/// can pass a closure.
pub trait QueryValidator {
    /// Returns `false` to reject the raw query.
    fn validate(&self, raw: &Map<String, Value>) -> bool;
}

impl<F> QueryValidator for F
where
    F: Fn(&Map<String, Value>) -> bool,
{
    fn validate(&self, raw: &Map<String, Value>) -> bool {
        self(raw)
    }
}

/// Validator that accepts every query.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl QueryValidator for AcceptAll {
    fn validate(&self, _raw: &Map<String, Value>) -> bool {
        true
    }
}

/// A validated spatiotemporal query.
///
/// Typed parameters live in fields; everything else from the raw query is
/// kept in an extension map. [`StacQuery::get`] and
/// [`StacQuery::set_if_absent`] treat both as a single flat namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct StacQuery {
    ids: Option<Vec<String>>,
    spatial: Option<SpatialFilter>,
    time: Option<String>,
    limit: u64,
    time_series: Option<Vec<String>>,
    extensions: Map<String, Value>,
}

impl StacQuery {
    /// Builds a query from a raw JSON object, accepting any input shape.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Construction`] if a structural rule is violated.
    pub fn from_map(raw: &Map<String, Value>) -> Result<Self, QueryError> {
        Self::from_map_with(raw, &AcceptAll)
    }

    /// Builds a query from a raw JSON object after running `validator` over
    /// it.
    ///
    /// Empty values (`null`, `""`, `{}`) of typed parameters are treated as
    /// absent. A negative `limit` is replaced by `1` with a warning.
    ///
    /// # Errors
    ///
    /// * [`QueryError::Validation`] if `validator` rejects `raw`
    /// * [`QueryError::Construction`] if more than one spatial filter is
    ///   present, `time` or a `time_series` entry is malformed, or a
    ///   parameter has the wrong shape
    pub fn from_map_with<V>(raw: &Map<String, Value>, validator: &V) -> Result<Self, QueryError>
    where
        V: QueryValidator + ?Sized,
    {
        if !validator.validate(raw) {
            return Err(QueryError::Validation);
        }

        let present = |key: &str| raw.get(key).filter(|v| !is_empty_value(v));

        let spatial_keys: Vec<&'static str> = SPATIAL_KEYS
            .into_iter()
            .filter(|key| present(*key).is_some())
            .collect();
        if spatial_keys.len() > 1 {
            return Err(ConstructionError::ConflictingSpatialFilters {
                present: spatial_keys,
            }
            .into());
        }

        let spatial = if let Some(value) = present("bbox") {
            Some(SpatialFilter::BBox(BoundingBox::from_value(value)?))
        } else if let Some(value) = present("intersects") {
            Some(SpatialFilter::intersects(value)?)
        } else if let Some(value) = present("contains") {
            Some(SpatialFilter::contains(value)?)
        } else {
            None
        };

        let time = present("time").map(parse_time).transpose()?;
        let limit = present("limit").map_or(Ok(DEFAULT_LIMIT), parse_limit)?;
        let ids = present("ids")
            .map(|v| string_list("ids", v))
            .transpose()?;
        let time_series = present("time_series").map(parse_time_series).transpose()?;

        let mut extensions = Map::new();
        for (key, value) in raw {
            if RESERVED_KEYS.contains(&key.as_str()) {
                log::debug!("Ignoring reserved query parameter {key:?}");
            } else if !TYPED_KEYS.contains(&key.as_str()) {
                extensions.insert(key.clone(), value.clone());
            }
        }

        Ok(Self {
            ids,
            spatial,
            time,
            limit,
            time_series,
            extensions,
        })
    }

    /// Parses `text` as a JSON object and builds a query from it.
    ///
    /// # Errors
    ///
    /// * [`QueryError::Parse`] if `text` is not a JSON object
    /// * [`QueryError::Construction`] as for [`StacQuery::from_map`]
    pub fn from_json(text: &str) -> Result<Self, QueryError> {
        let raw: Map<String, Value> = serde_json::from_str(text)?;
        Self::from_map(&raw)
    }

    /// Item identifiers to restrict the results to.
    #[must_use]
    pub fn ids(&self) -> Option<&[String]> {
        self.ids.as_deref()
    }

    /// The spatial filter, if any.
    #[must_use]
    pub const fn spatial_filter(&self) -> Option<&SpatialFilter> {
        self.spatial.as_ref()
    }

    /// The `bbox` parameter.
    #[must_use]
    pub const fn bbox(&self) -> Option<BoundingBox> {
        match &self.spatial {
            Some(SpatialFilter::BBox(bbox)) => Some(*bbox),
            _ => None,
        }
    }

    /// The `intersects` parameter.
    #[must_use]
    pub const fn intersects(&self) -> Option<&Geometry> {
        match &self.spatial {
            Some(SpatialFilter::Intersects { geometry, .. }) => Some(geometry),
            _ => None,
        }
    }

    /// The `contains` parameter.
    #[must_use]
    pub const fn contains(&self) -> Option<&Geometry> {
        match &self.spatial {
            Some(SpatialFilter::Contains { geometry, .. }) => Some(geometry),
            _ => None,
        }
    }

    /// The `time` parameter, verbatim.
    #[must_use]
    pub fn time(&self) -> Option<&str> {
        self.time.as_deref()
    }

    /// Parsed start and end of the `time` parameter.
    #[must_use]
    pub fn time_range(&self) -> Option<TimeRange> {
        self.time.as_deref().and_then(parse_temporal)
    }

    /// Maximum number of results. Defaults to `1`.
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// The `time_series` parameter, verbatim.
    #[must_use]
    pub fn time_series(&self) -> Option<&[String]> {
        self.time_series.as_deref()
    }

    /// Parameters without a typed representation.
    #[must_use]
    pub const fn extensions(&self) -> &Map<String, Value> {
        &self.extensions
    }

    /// A single extension attribute.
    #[must_use]
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    /// Bounding rectangle of the spatial filter: `bbox` as given, otherwise
    /// the extent of `intersects` or `contains`.
    ///
    /// # Errors
    ///
    /// Returns [`MissingSpatialFilterError`] if the query has no spatial
    /// filter.
    pub fn bounds(&self) -> Result<BoundingBox, MissingSpatialFilterError> {
        self.spatial
            .as_ref()
            .map(SpatialFilter::bounds)
            .ok_or(MissingSpatialFilterError)
    }

    /// Geometry of the spatial filter: the `bbox` rectangle, otherwise
    /// `intersects` or `contains` verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`MissingSpatialFilterError`] if the query has no spatial
    /// filter.
    pub fn geometry(&self) -> Result<Geometry, MissingSpatialFilterError> {
        self.spatial
            .as_ref()
            .map(SpatialFilter::geometry)
            .ok_or(MissingSpatialFilterError)
    }

    /// Looks up an attribute by name.
    ///
    /// Typed parameters always exist and yield `null` when unset; other keys
    /// are looked up in the extension attributes.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        if TYPED_KEYS.contains(&key) {
            return Some(self.typed_value(key).unwrap_or(Value::Null));
        }
        self.extensions.get(key).cloned()
    }

    /// Whether `key` names an attribute of this query, typed or extension.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        TYPED_KEYS.contains(&key) || self.extensions.contains_key(key)
    }

    /// Sets `key` to `value` unless the query already has an attribute with
    /// that name. Returns whether the value was set.
    ///
    /// Typed parameters always count as present, even when unset, and the
    /// names of derived accessors (`geometry`, `bounds`) are never set.
    pub fn set_if_absent(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if self.has(&key) || RESERVED_KEYS.contains(&key.as_str()) {
            return false;
        }
        self.extensions.insert(key, value.into());
        true
    }

    /// Converts the query back into a raw JSON object.
    ///
    /// Unset typed parameters are omitted; `limit` is always written. Typed
    /// parameters are written after extension attributes.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extensions.clone();
        for key in TYPED_KEYS {
            if let Some(value) = self.typed_value(key) {
                map.insert((*key).to_string(), value);
            }
        }
        map
    }

    fn typed_value(&self, key: &str) -> Option<Value> {
        match key {
            "ids" => self.ids.clone().map(Value::from),
            "bbox" | "intersects" | "contains" => self
                .spatial
                .as_ref()
                .filter(|s| s.key() == key)
                .map(SpatialFilter::to_value),
            "time" => self.time.clone().map(Value::from),
            "limit" => Some(Value::from(self.limit)),
            "time_series" => self.time_series.clone().map(Value::from),
            _ => None,
        }
    }
}

impl FromStr for StacQuery {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_json(s)
    }
}

impl Serialize for StacQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

/// `null`, `""` and `{}` mean "not supplied".
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn parse_time(value: &Value) -> Result<String, ConstructionError> {
    let time = value
        .as_str()
        .ok_or_else(|| ConstructionError::InvalidParameter {
            name: "time",
            reason: "expected a string".to_string(),
        })?;

    if !is_valid_temporal(Some(time)) {
        return Err(ConstructionError::InvalidTime {
            value: time.to_string(),
        });
    }

    Ok(time.to_string())
}

fn parse_time_series(value: &Value) -> Result<Vec<String>, ConstructionError> {
    let entries = string_list("time_series", value)?;

    if let Some((index, entry)) = entries
        .iter()
        .enumerate()
        .find(|(_, entry)| !is_valid_temporal(Some(entry)))
    {
        return Err(ConstructionError::InvalidTimeSeries {
            index,
            value: entry.clone(),
        });
    }

    Ok(entries)
}

/// Whole numbers are accepted in either JSON form (`5` or `5.0`). Negative
/// limits are coerced to [`DEFAULT_LIMIT`] rather than rejected.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_limit(value: &Value) -> Result<u64, ConstructionError> {
    if let Some(limit) = value.as_u64() {
        return Ok(limit);
    }

    match value.as_f64().filter(|limit| limit.fract() == 0.0) {
        Some(limit) if limit < 0.0 => {
            log::warn!("Query limit cannot be negative (got {value}), using {DEFAULT_LIMIT}");
            Ok(DEFAULT_LIMIT)
        }
        Some(limit) => Ok(limit as u64),
        None => Err(ConstructionError::InvalidParameter {
            name: "limit",
            reason: format!("expected an integer, got {value}"),
        }),
    }
}

fn string_list(name: &'static str, value: &Value) -> Result<Vec<String>, ConstructionError> {
    let invalid = || ConstructionError::InvalidParameter {
        name,
        reason: "expected an array of strings".to_string(),
    };

    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}
