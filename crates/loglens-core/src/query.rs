//! Query builder: maps a [`FilterSpec`] onto `/api/db_logs` parameters.
//!
//! Keys whose source value is empty are omitted; date-times are sent as
//! whole-second Unix epochs and dropped when they do not parse. `limit` is
//! always present. The export path calls the same builder with a larger
//! limit.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

use crate::types::FilterSpec;

pub const KEY_LEVEL: &str = "level";
pub const KEY_USER: &str = "user_id";
pub const KEY_SERVICE: &str = "service_id";
pub const KEY_KEYWORD: &str = "keyword";
pub const KEY_START: &str = "start_time";
pub const KEY_END: &str = "end_time";
pub const KEY_LIMIT: &str = "limit";

/// Naive formats accepted for local date-times, most specific first.
const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Ordered query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(&'static str, String)>);

impl QueryParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.0.iter().map(|(k, _)| *k).collect()
    }

    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.0
    }

    /// `application/x-www-form-urlencoded` rendering, e.g. `level=ERROR&limit=50`.
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter().map(|(k, v)| (*k, v.as_str())))
            .finish()
    }

    fn push_nonempty(&mut self, key: &'static str, value: &str) {
        if !value.is_empty() {
            self.0.push((key, value.to_string()));
        }
    }
}

/// Build parameters, interpreting date-times in the machine's local zone.
pub fn build_params(filter: &FilterSpec, limit: usize) -> QueryParams {
    build_params_in(filter, limit, &Local)
}

/// Build parameters, interpreting naive date-times in `tz`.
pub fn build_params_in<Tz: TimeZone>(filter: &FilterSpec, limit: usize, tz: &Tz) -> QueryParams {
    let mut params = QueryParams::default();
    params.push_nonempty(KEY_LEVEL, &filter.level);
    params.push_nonempty(KEY_USER, &filter.user);
    params.push_nonempty(KEY_SERVICE, &filter.service);
    params.push_nonempty(KEY_KEYWORD, &filter.keyword);

    for (key, value) in [(KEY_START, &filter.start_time), (KEY_END, &filter.end_time)] {
        let Some(raw) = value.as_deref().filter(|s| !s.is_empty()) else {
            continue;
        };
        match to_epoch_seconds(raw, tz) {
            Some(secs) => params.0.push((key, secs.to_string())),
            None => tracing::debug!(key, value = raw, "dropping unparseable date-time filter"),
        }
    }

    params.0.push((KEY_LIMIT, limit.to_string()));
    params
}

/// Parse a date-time string to whole Unix seconds.
///
/// RFC 3339 strings carry their own offset. Naive strings are read in `tz`;
/// an ambiguous local time resolves to the earlier instant and a nonexistent
/// one (inside a DST gap) yields `None`.
pub fn to_epoch_seconds<Tz: TimeZone>(input: &str, tz: &Tz) -> Option<i64> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.timestamp());
    }
    LOCAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|dt| dt.timestamp())
}
