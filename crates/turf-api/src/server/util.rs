fn apply_cors_headers(headers: &mut axum::http::HeaderMap) {
    headers.insert(
        HeaderName::from_static("access-control-allow-origin"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static("GET,POST,OPTIONS,PUT,PATCH,DELETE"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-max-age"),
        HeaderValue::from_static("3600"),
    );
}

/// Caller identity, already authenticated upstream.
fn require_caller(headers: &HeaderMap) -> Result<String, HttpApiError> {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
        .ok_or_else(|| HttpApiError::invalid_query("x-user-id header is required", None))
}

fn caller_deadline(headers: &HeaderMap) -> Result<Option<Duration>, HttpApiError> {
    let Some(raw) = headers.get("x-deadline-ms") else {
        return Ok(None);
    };
    raw.to_str()
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis)
        .map(Some)
        .ok_or_else(|| {
            HttpApiError::invalid_query(
                "x-deadline-ms must be a positive integer",
                None,
            )
        })
}

/// Run lock acquisition plus the operation under the caller's deadline.
/// The section after the lock is synchronous, so an expired deadline can
/// only cancel before any state was touched.
async fn with_deadline<T, F>(headers: &HeaderMap, operation: F) -> Result<T, HttpApiError>
where
    F: Future<Output = Result<T, HttpApiError>>,
{
    match caller_deadline(headers)? {
        Some(limit) => match tokio::time::timeout(limit, operation).await {
            Ok(result) => result,
            Err(_) => Err(HttpApiError::deadline_exceeded()),
        },
        None => operation.await,
    }
}

fn paginate(
    total: usize,
    cursor: Option<usize>,
    page_size: Option<usize>,
) -> Result<(usize, usize, Option<usize>), HttpApiError> {
    let start = cursor.unwrap_or(0);
    if start > total {
        return Err(HttpApiError::invalid_query(
            "cursor is out of bounds",
            Some(format!("cursor={start} total={total}")),
        ));
    }

    let size = page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .max(1)
        .min(MAX_PAGE_SIZE);
    let end = start.saturating_add(size).min(total);
    let next_cursor = if end < total { Some(end) } else { None };

    Ok((start, end, next_cursor))
}
