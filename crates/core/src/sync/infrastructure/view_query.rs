//! Query-string form of a [`ViewConfig`], as used in editor links.

use std::collections::HashMap;

use thiserror::Error;
use url::form_urlencoded;

use crate::shared::time::{TimeError, TimeInMovie};
use crate::sync::domain::view_config::ViewConfig;

#[derive(Error, Debug, PartialEq)]
pub enum ViewQueryError {
    #[error("missing query parameter '{0}'")]
    Missing(&'static str),
    #[error("bad '{key}' parameter: {source}")]
    BadTime {
        key: &'static str,
        #[source]
        source: TimeError,
    },
}

pub fn to_query(view: &ViewConfig) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("movie", &view.movie)
        .append_pair("startTime", &view.start_time.to_string())
        .append_pair("endTime", &view.end_time.to_string())
        .append_pair("user", &view.user)
        .append_pair("references", &view.references.join(","))
        .append_pair("defaultReference", &view.default_reference)
        .finish()
}

/// Parse a query string (with or without a leading `?`). The resulting view
/// is writable; callers mark status views read-only themselves.
pub fn from_query(query: &str) -> Result<ViewConfig, ViewQueryError> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let params: HashMap<String, String> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    let get = |key: &'static str| {
        params
            .get(key)
            .map(String::as_str)
            .ok_or(ViewQueryError::Missing(key))
    };
    let time = |key: &'static str| {
        get(key).and_then(|raw| {
            TimeInMovie::parse(raw).map_err(|source| ViewQueryError::BadTime { key, source })
        })
    };

    let references = get("references")?
        .split(',')
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();

    Ok(
        ViewConfig::new(get("movie")?, time("startTime")?, time("endTime")?, get("user")?)
            .with_references(references, get("defaultReference")?),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn view() -> ViewConfig {
        ViewConfig::new(
            "the movie",
            TimeInMovie::from_secs(120.0),
            TimeInMovie::from_secs(124.5),
            "worker7",
        )
        .with_references(vec!["gold".to_string(), "a,b?".to_string()], "gold")
    }

    #[test]
    fn test_to_query_encodes_values() {
        let view = ViewConfig::new(
            "the movie",
            TimeInMovie::from_secs(120.0),
            TimeInMovie::from_secs(124.5),
            "w&7",
        )
        .with_references(vec!["gold".to_string(), "rater".to_string()], "gold");
        assert_eq!(
            to_query(&view),
            "movie=the+movie&startTime=120&endTime=124.5&user=w%267\
             &references=gold%2Crater&defaultReference=gold"
        );
    }

    #[test]
    fn test_from_query_reads_editor_link() {
        let parsed = from_query(
            "?movie=m1&startTime=10&endTime=14&user=worker7&references=gold,worker3&defaultReference=gold",
        )
        .unwrap();
        assert_eq!(parsed.movie, "m1");
        assert_relative_eq!(parsed.start_time.secs(), 10.0);
        assert_relative_eq!(parsed.end_time.secs(), 14.0);
        assert_eq!(parsed.references, vec!["gold", "worker3"]);
        assert_eq!(parsed.default_reference, "gold");
        assert!(parsed.should_save);
    }

    #[test]
    fn test_query_preserves_view() {
        let mut expected = view();
        // Commas separate references, so a name containing one splits.
        expected.references = vec!["gold".to_string(), "a".to_string(), "b?".to_string()];
        assert_eq!(from_query(&to_query(&view())).unwrap(), expected);
    }

    #[test]
    fn test_empty_references() {
        let parsed = from_query(
            "movie=m&startTime=0&endTime=4&user=u&references=&defaultReference=",
        )
        .unwrap();
        assert!(parsed.references.is_empty());
    }

    #[rstest]
    #[case::no_movie("startTime=0&endTime=4&user=u&references=&defaultReference=", "movie")]
    #[case::no_user("movie=m&startTime=0&endTime=4&references=&defaultReference=", "user")]
    #[case::no_end("movie=m&startTime=0&user=u&references=&defaultReference=", "endTime")]
    fn test_missing_key(#[case] query: &str, #[case] key: &'static str) {
        assert_eq!(from_query(query), Err(ViewQueryError::Missing(key)));
    }

    #[rstest]
    #[case::text("abc")]
    #[case::nan("NaN")]
    #[case::infinite("inf")]
    fn test_bad_time(#[case] start: &str) {
        let query =
            format!("movie=m&startTime={start}&endTime=4&user=u&references=&defaultReference=");
        assert!(matches!(
            from_query(&query),
            Err(ViewQueryError::BadTime {
                key: "startTime",
                ..
            })
        ));
    }
}
