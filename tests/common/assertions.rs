//! Domain-specific assertion macros for loglens harnesses.
//!
//! These wrap `pretty_assertions` and add context-rich failure messages that
//! make it clear which record or request broke the expectation.

// ---------------------------------------------------------------------------
// Entry assertions
// ---------------------------------------------------------------------------

/// Assert the one-line presentation of a normalized entry.
///
/// ```rust
/// assert_display!(entry, "[ERROR] payment declined (user7, svc-billing)");
/// ```
#[macro_export]
macro_rules! assert_display {
    ($entry:expr, $expected:expr) => {{
        let entry: &loglens_core::NormalizedLogEntry = &$entry;
        let expected: &str = $expected;
        let actual = entry.display_line();
        if actual != expected {
            panic!(
                "assert_display! failed:\n  expected: {:?}\n  actual:   {:?}\n  entry:    {:#?}",
                expected, actual, entry
            );
        }
    }};
}

/// Assert the ids of a normalized batch, in order.
#[macro_export]
macro_rules! assert_ids {
    ($entries:expr, [$($id:expr),* $(,)?]) => {{
        let actual: Vec<Option<String>> = $entries
            .iter()
            .map(|e: &loglens_core::NormalizedLogEntry| {
                e.source_record_id.as_ref().map(|id| id.as_str().to_string())
            })
            .collect();
        let expected: Vec<Option<String>> = vec![$(Some(String::from($id))),*];
        pretty_assertions::assert_eq!(actual, expected, "record ids differ");
    }};
}

// ---------------------------------------------------------------------------
// Request assertions
// ---------------------------------------------------------------------------

/// Assert that a recorded query string has exactly these keys, in order.
#[macro_export]
macro_rules! assert_query_keys {
    ($query:expr, [$($key:expr),* $(,)?]) => {{
        let query: &str = &$query;
        let keys: Vec<String> = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, _)| k.into_owned())
            .collect();
        let expected: Vec<String> = vec![$(String::from($key)),*];
        pretty_assertions::assert_eq!(keys, expected, "query keys differ for {:?}", query);
    }};
}

/// Value of `key` in a recorded query string.
pub fn query_value(query: &str, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
