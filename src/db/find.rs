//! Shared query-building blocks for the per-entity finders: cluster
//! AND-filtering, keyword search and the sort-method vocabulary.

use crate::ids::ClusterId;
use crate::primitives::Range;

/// How a result set should be ordered. Each finder maps the subset that
/// makes sense for it onto a concrete `ORDER BY` clause; asking for a
/// sort method a finder doesn't support is a caller bug caught by
/// `FindParameters::sort_column` panicking in debug builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMethod {
    #[default]
    None,
    Name,
    SortName,
    Date,
    DateDesc,
    Random,
    LastWritten,
    Added,
    StarredDateTime,
}

/// The common parameter bundle every `find*` function in `db/*` accepts:
/// pagination, a keyword filter and a cluster AND-filter.
///
/// Cluster filtering is an AND across distinct clusters: a track must
/// carry every cluster id listed, not merely one of them, expressed as
/// `HAVING COUNT(DISTINCT cluster_id) = N` over a join restricted to
/// the requested ids.
#[derive(Debug, Clone, Default)]
pub struct FindParameters {
    pub range: Range,
    pub sort_method: SortMethod,
    pub keywords: Vec<String>,
    pub clusters: Vec<ClusterId>,
}

impl FindParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = range;
        self
    }

    pub fn with_sort_method(mut self, sort_method: SortMethod) -> Self {
        self.sort_method = sort_method;
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_clusters(mut self, clusters: Vec<ClusterId>) -> Self {
        self.clusters = clusters;
        self
    }
}

/// Escapes `%`, `_` and the escape character itself for a `LIKE ...
/// ESCAPE '\'` clause, then wraps the term for a substring match.
pub fn like_escape(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        match c {
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            other => escaped.push(other),
        }
    }
    escaped.push('%');
    escaped
}

/// Appends `LIMIT`/`OFFSET` to a query string, omitting `LIMIT` when
/// the range is unlimited: the store layer itself has no size cap,
/// only the Subsonic API boundary does.
pub fn push_range(sql: &mut String, range: Range) {
    if range.is_limited() {
        sql.push_str(&format!(" LIMIT {} OFFSET {}", range.size, range.offset));
    } else if range.offset != 0 {
        sql.push_str(&format!(" LIMIT -1 OFFSET {}", range.offset));
    }
}

/// Builds the `... AND id IN (SELECT track_id FROM track_cluster_link
/// WHERE cluster_id IN (...) GROUP BY track_id HAVING
/// COUNT(DISTINCT cluster_id) = N)` fragment for an AND cluster filter
/// over `track`-like tables. Returns `None` when there's nothing to
/// filter on.
pub fn cluster_and_filter_fragment(clusters: &[ClusterId], id_column: &str) -> Option<String> {
    if clusters.is_empty() {
        return None;
    }
    let ids = clusters
        .iter()
        .map(|c| c.value().to_string())
        .collect::<Vec<_>>()
        .join(",");
    Some(format!(
        "{id_column} IN (SELECT track_id FROM track_cluster_link WHERE cluster_id IN ({ids}) \
         GROUP BY track_id HAVING COUNT(DISTINCT cluster_id) = {count})",
        count = clusters.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_escape_wraps_and_escapes_wildcards() {
        assert_eq!(like_escape("50%_cent"), "%50\\%\\_cent%");
    }

    #[test]
    fn push_range_omits_limit_when_unlimited() {
        let mut sql = String::from("SELECT 1");
        push_range(&mut sql, Range::unlimited());
        assert_eq!(sql, "SELECT 1");
    }

    #[test]
    fn push_range_applies_limit_and_offset() {
        let mut sql = String::from("SELECT 1");
        push_range(&mut sql, Range::new(10, 20));
        assert_eq!(sql, "SELECT 1 LIMIT 20 OFFSET 10");
    }

    #[test]
    fn cluster_filter_requires_distinct_count_match() {
        let clusters = vec![ClusterId::new(1), ClusterId::new(2)];
        let fragment = cluster_and_filter_fragment(&clusters, "track.id").unwrap();
        assert!(fragment.contains("COUNT(DISTINCT cluster_id) = 2"));
    }

    #[test]
    fn cluster_filter_is_none_when_empty() {
        assert!(cluster_and_filter_fragment(&[], "track.id").is_none());
    }
}
