// Ready-made filters for list payloads.
// Case-insensitive search over a text projection with a result limit.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::subscription::Filter;

/// Default number of items a search keeps.
pub const DEFAULT_LIMIT: usize = 50;

type Projection<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Keeps items whose projected text contains every word of the query.
///
/// An empty query keeps everything, up to the limit.
pub struct Search<T> {
    terms: Vec<String>,
    limit: usize,
    text: Projection<T>,
}

impl<T> Clone for Search<T> {
    fn clone(&self) -> Self {
        Self {
            terms: self.terms.clone(),
            limit: self.limit,
            text: Arc::clone(&self.text),
        }
    }
}

impl<T> fmt::Debug for Search<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Search")
            .field("terms", &self.terms)
            .field("limit", &self.limit)
            .finish()
    }
}

impl<T> Search<T> {
    pub fn new(query: &str, text: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        Self {
            terms: query.split_whitespace().map(str::to_lowercase).collect(),
            limit: DEFAULT_LIMIT,
            text: Arc::new(text),
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn matches(&self, item: &T) -> bool {
        if self.terms.is_empty() {
            return true;
        }
        let haystack = (self.text)(item).to_lowercase();
        self.terms.iter().all(|term| haystack.contains(term.as_str()))
    }

    pub fn run(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .filter(|item| self.matches(item))
            .take(self.limit)
            .collect()
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Filter<Vec<T>> for Search<T> {
    async fn apply(&self, value: Vec<T>) -> Result<Vec<T>> {
        Ok(self.run(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projects() -> Vec<String> {
        vec![
            "gitlab-org / GitLab".to_string(),
            "gitlab-org / gitaly".to_string(),
            "tools / Runbook".to_string(),
        ]
    }

    #[test]
    fn test_empty_query_keeps_all() {
        let search = Search::new("", |s: &String| s.clone());
        assert_eq!(search.run(projects()).len(), 3);
    }

    #[test]
    fn test_case_insensitive_terms() {
        let search = Search::new("GITLAB org", |s: &String| s.clone());
        assert_eq!(
            search.run(projects()),
            vec!["gitlab-org / GitLab".to_string(), "gitlab-org / gitaly".to_string()]
        );

        let search = Search::new("org runbook", |s: &String| s.clone());
        assert!(search.run(projects()).is_empty());
    }

    #[test]
    fn test_limit() {
        let search = Search::new("gitlab", |s: &String| s.clone()).limit(1);
        assert_eq!(search.run(projects()), vec!["gitlab-org / GitLab".to_string()]);
    }

    #[tokio::test]
    async fn test_as_filter() {
        let search = Search::new("runbook", |s: &String| s.clone());
        let filtered = search.apply(projects()).await.unwrap();
        assert_eq!(filtered, vec!["tools / Runbook".to_string()]);
    }
}
