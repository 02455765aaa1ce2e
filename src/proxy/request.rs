use std::future::Future;

use reqwest::header::HeaderMap;

tokio::task_local! {
    static CURRENT_REQUEST: RequestMetadata;
}

/// Override sets selected by one in-flight request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    override_sets: Vec<String>,
}

impl RequestMetadata {
    pub fn new<I, T>(override_sets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            override_sets: override_sets.into_iter().map(Into::into).collect(),
        }
    }

    /// `"foo bar.baz"` selects `foo` then `bar.baz`.
    pub fn from_header_value(value: &str) -> Self {
        Self::new(value.split_whitespace())
    }

    /// Reads the override header `name`; a missing or non-ASCII header
    /// selects nothing.
    pub fn from_header_map(
        headers: &HeaderMap,
        name: &str,
    ) -> Self {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(Self::from_header_value)
            .unwrap_or_default()
    }

    pub fn override_set_names(&self) -> &[String] {
        &self.override_sets
    }
}

/// Access to the request currently being served, if any.
pub trait RequestContext: Send + Sync {
    fn current_request(&self) -> Option<RequestMetadata>;
}

impl<F> RequestContext for F
where
    F: Fn() -> Option<RequestMetadata> + Send + Sync,
{
    fn current_request(&self) -> Option<RequestMetadata> {
        self()
    }
}

/// No request ever selects override sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRequestContext;

impl RequestContext for NoRequestContext {
    fn current_request(&self) -> Option<RequestMetadata> {
        None
    }
}

/// Reads the request bound by [`with_request`] to the current task.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskLocalRequestContext;

impl RequestContext for TaskLocalRequestContext {
    fn current_request(&self) -> Option<RequestMetadata> {
        CURRENT_REQUEST.try_with(Clone::clone).ok()
    }
}

/// Runs `fut` with `request` as the current request.
pub async fn with_request<F>(
    request: RequestMetadata,
    fut: F,
) -> F::Output
where
    F: Future,
{
    CURRENT_REQUEST.scope(request, fut).await
}
