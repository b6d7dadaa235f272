//! Batch fan-out: duplicated requests become several pinned-count jobs.

use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::request::JobRequest;

/// Copies produced for a duplicated request without `max_count`.
pub const DEFAULT_DUPLICATE_COUNT: i64 = 5;

/// Most copies one duplicated request may ask for.
pub const MAX_DUPLICATE_COUNT: i64 = 100;

/// Expand a batch, replacing every `duplicate` request with its copies.
///
/// A duplicated request yields `max_count` copies (default 5), each with
/// `max_count` overwritten by its `min_count` so the prompt count is fixed.
/// A count of zero or less drops the request. Input order is preserved.
///
/// # Errors
///
/// Returns [`PipelineError::TooManyCopies`] if any request asks for more than
/// [`MAX_DUPLICATE_COUNT`] copies. Nothing is expanded in that case.
pub fn expand(requests: Vec<JobRequest>) -> Result<Vec<JobRequest>, PipelineError> {
    if let Some(requested) = requests
        .iter()
        .filter(|r| r.duplicate)
        .filter_map(|r| r.max_count)
        .find(|&copies| copies > MAX_DUPLICATE_COUNT)
    {
        return Err(PipelineError::TooManyCopies { requested, max: MAX_DUPLICATE_COUNT });
    }

    let mut expanded = Vec::with_capacity(requests.len());
    for request in requests {
        if !request.duplicate {
            expanded.push(request);
            continue;
        }

        let copies = request.max_count.unwrap_or(DEFAULT_DUPLICATE_COUNT);
        if copies <= 0 {
            warn!(max_count = copies, "Duplicate request has no copies to spawn; dropping it");
            continue;
        }

        debug!(copies, min_count = ?request.min_count, "Fanning out duplicated request");
        for _ in 0..copies {
            let mut copy = request.clone();
            copy.max_count = copy.min_count;
            expanded.push(copy);
        }
    }
    Ok(expanded)
}
