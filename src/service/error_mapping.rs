//! Classification of provider failures into [`IssueError`] variants.
//!
//! Every adapter funnels HTTP statuses, Octocrab errors, and `reqwest`
//! errors through these helpers so the same status always yields the same
//! variant regardless of provider.

use http::StatusCode;

use super::error::IssueError;

/// Checks if a status indicates an authentication failure.
pub(super) const fn is_auth_failure(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

/// Checks whether a response represents rate limiting based on the status
/// and message content.
pub(super) fn is_rate_limit(status: StatusCode, message: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN && message.to_lowercase().contains("rate limit")
}

/// Checks if an octocrab error represents a network/transport issue.
const fn is_network_error(error: &octocrab::Error) -> bool {
    matches!(
        error,
        octocrab::Error::Http { .. }
            | octocrab::Error::Hyper { .. }
            | octocrab::Error::Service { .. }
    )
}

/// Maps a non-success status onto an error variant.
///
/// `target` names what the request was about (`#42`, `repository
/// octo/repo`) and becomes the identifier of [`IssueError::NotFound`].
pub(super) fn map_http_error(
    target: &str,
    status: StatusCode,
    maybe_message: Option<String>,
) -> IssueError {
    let message = maybe_message.unwrap_or_else(|| "unknown error".to_owned());

    if is_rate_limit(status, &message) {
        return IssueError::Transport {
            message: format!("rate limited while accessing {target}: {message}"),
        };
    }
    if is_auth_failure(status) {
        return IssueError::Authentication {
            message: format!("{target}: provider returned {status} {message}"),
        };
    }

    match status {
        StatusCode::NOT_FOUND => IssueError::not_found(target, message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            IssueError::validation(format!("{target} rejected with status {status}: {message}"))
        }
        _ => IssueError::Transport {
            message: format!("{target} failed with status {status}: {message}"),
        },
    }
}

/// Maps an Octocrab error onto an error variant.
pub(super) fn map_octocrab_error(target: &str, error: &octocrab::Error) -> IssueError {
    if let octocrab::Error::GitHub { source, .. } = error {
        return map_http_error(target, source.status_code, Some(source.message.clone()));
    }

    if is_network_error(error) {
        return IssueError::Transport {
            message: format!("{target}: network failure: {error}"),
        };
    }

    IssueError::Transport {
        message: format!("{target}: unexpected response: {error}"),
    }
}

/// Maps a `reqwest` failure (connect, timeout, body decoding) onto
/// [`IssueError::Transport`].
pub(super) fn map_reqwest_error(target: &str, error: &reqwest::Error) -> IssueError {
    let kind = if error.is_decode() {
        "undecodable response"
    } else {
        "network failure"
    };
    IssueError::Transport {
        message: format!("{target}: {kind}: {error}"),
    }
}

/// Extracts the human-readable message from a provider error body.
///
/// GitHub and Gogs send `{"message": "..."}`; GitLab may send a string, an
/// object of field errors, or `{"error": "..."}`. JIRA sends
/// `{"errorMessages": [...]}`.
pub(super) fn extract_message(body: &str) -> Option<String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        let trimmed = body.trim();
        return (!trimmed.is_empty()).then(|| trimmed.to_owned());
    };

    if let Some(serde_json::Value::Array(messages)) = value.get("errorMessages") {
        let joined: Vec<&str> = messages.iter().filter_map(serde_json::Value::as_str).collect();
        if !joined.is_empty() {
            return Some(joined.join("; "));
        }
    }

    match value.get("message").or_else(|| value.get("error")) {
        Some(serde_json::Value::String(text)) => Some(text.clone()),
        Some(serde_json::Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use rstest::rstest;

    use super::{extract_message, map_http_error};
    use crate::service::error::IssueError;

    #[rstest]
    #[case(StatusCode::UNAUTHORIZED, "Bad credentials")]
    #[case(StatusCode::FORBIDDEN, "Resource not accessible")]
    fn auth_statuses_map_to_authentication(#[case] status: StatusCode, #[case] message: &str) {
        let error = map_http_error("#1", status, Some(message.to_owned()));
        assert!(
            matches!(error, IssueError::Authentication { .. }),
            "expected Authentication, got {error:?}"
        );
    }

    #[rstest]
    #[case(StatusCode::FORBIDDEN, "API rate limit exceeded")]
    #[case(StatusCode::TOO_MANY_REQUESTS, "slow down")]
    fn rate_limits_map_to_transport(#[case] status: StatusCode, #[case] message: &str) {
        let error = map_http_error("#1", status, Some(message.to_owned()));
        assert!(
            matches!(error, IssueError::Transport { .. }),
            "expected Transport, got {error:?}"
        );
    }

    #[rstest]
    fn not_found_carries_target() {
        let error = map_http_error("#42", StatusCode::NOT_FOUND, Some("Not Found".to_owned()));
        assert_eq!(error, IssueError::not_found("#42", "Not Found"));
    }

    #[rstest]
    #[case(StatusCode::BAD_REQUEST)]
    #[case(StatusCode::CONFLICT)]
    #[case(StatusCode::UNPROCESSABLE_ENTITY)]
    fn client_errors_map_to_validation(#[case] status: StatusCode) {
        let error = map_http_error("#1", status, None);
        assert!(matches!(error, IssueError::Validation { .. }));
    }

    #[rstest]
    #[case(StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(StatusCode::BAD_GATEWAY)]
    fn server_errors_map_to_transport(#[case] status: StatusCode) {
        let error = map_http_error("#1", status, None);
        assert!(matches!(error, IssueError::Transport { .. }));
    }

    #[rstest]
    #[case(r#"{"message":"Validation Failed"}"#, Some("Validation Failed"))]
    #[case(r#"{"error":"insufficient_scope"}"#, Some("insufficient_scope"))]
    #[case(r#"{"message":{"title":["can't be blank"]}}"#, Some(r#"{"title":["can't be blank"]}"#))]
    #[case(
        r#"{"errorMessages":["Issue does not exist","or you lack permission"],"errors":{}}"#,
        Some("Issue does not exist; or you lack permission")
    )]
    #[case("upstream timed out", Some("upstream timed out"))]
    #[case("", None)]
    fn extracts_provider_messages(#[case] body: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract_message(body).as_deref(), expected);
    }
}
