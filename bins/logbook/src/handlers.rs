//! Endpoint handlers and request validation.
//!
//! Validation happens entirely here; the storage layer never sees a
//! malformed level, tag list, time range or page number. Validation
//! failures map to 422, storage failures to 500.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use logbook_db::LogRecord;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

/// Accepted `start_time`/`end_time` formats.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Errors
// ============================================================================

pub enum ApiError {
    /// Caller-supplied parameter is malformed; never reaches storage.
    Validation(String),
    /// Storage or task failure.
    Internal(String),
}

impl ApiError {
    fn validation(message: &str) -> Self {
        ApiError::Validation(message.to_string())
    }
}

impl From<logbook_db::Error> for ApiError {
    fn from(err: logbook_db::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

// ============================================================================
// Request/response formats
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateLogForm {
    pub message: Option<String>,
    pub level: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetLogsQuery {
    pub level: Option<String>,
    pub tags: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogRecordResponse {
    pub application: String,
    pub level: u8,
    pub message: String,
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl LogRecordResponse {
    fn new(application: &str, record: LogRecord) -> Self {
        Self {
            application: application.to_string(),
            level: record.level,
            message: record.message,
            tags: record.tags,
            created_at: record.created_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// `POST /{application}/put`
pub async fn create_log(
    State(state): State<AppState>,
    Path(application): Path<String>,
    Form(form): Form<CreateLogForm>,
) -> Result<Json<LogRecordResponse>, ApiError> {
    let (message, level, tags) = validate_create(&form)?;

    let storage = state.storage.clone();
    let app = application.clone();
    let record = tokio::task::spawn_blocking(move || {
        let mut record = LogRecord {
            message,
            level,
            tags,
            created_at: None,
        };
        storage.save(&app, &mut record).map(|_| record)
    })
    .await??;

    Ok(Json(LogRecordResponse::new(&application, record)))
}

/// `GET /{application}/get`
pub async fn get_logs(
    State(state): State<AppState>,
    Path(application): Path<String>,
    Query(query): Query<GetLogsQuery>,
) -> Result<Json<Vec<LogRecordResponse>>, ApiError> {
    let params = validate_get(&query)?;

    let storage = state.storage.clone();
    let app = application.clone();
    let records = tokio::task::spawn_blocking(move || {
        storage.load(
            &app,
            params.min_level,
            &params.tags,
            params.start,
            params.end,
            params.page,
        )
    })
    .await??;

    let response = records
        .into_iter()
        .map(|record| LogRecordResponse::new(&application, record))
        .collect();
    Ok(Json(response))
}

/// `GET /{application}/stats`
pub async fn app_stats(
    State(state): State<AppState>,
    Path(application): Path<String>,
) -> Result<String, ApiError> {
    let storage = state.storage.clone();
    let stats = tokio::task::spawn_blocking(move || storage.stats(&application)).await??;
    Ok(stats)
}

// ============================================================================
// Validation
// ============================================================================

struct GetLogsParams {
    min_level: u8,
    tags: Vec<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    page: usize,
}

fn validate_create(form: &CreateLogForm) -> Result<(String, u8, Vec<String>), ApiError> {
    let message = match form.message.as_deref() {
        Some(message) if !message.is_empty() => message.to_string(),
        _ => return Err(ApiError::validation("Message should be defined")),
    };

    let level = form
        .level
        .as_deref()
        .and_then(|raw| raw.parse::<u8>().ok())
        .filter(|level| (1..=5).contains(level))
        .ok_or_else(|| ApiError::validation("Level should be a number between 1 and 5"))?;

    let tags = split_tags(form.tags.as_deref())?;

    Ok((message, level, tags))
}

fn validate_get(query: &GetLogsQuery) -> Result<GetLogsParams, ApiError> {
    let min_level = match query.level.as_deref() {
        None | Some("") => 0,
        Some(raw) => raw
            .parse::<u8>()
            .ok()
            .filter(|level| *level <= 5)
            .ok_or_else(|| ApiError::validation("Level should be a number between 0 and 5"))?,
    };

    let tags = split_tags(query.tags.as_deref())?;

    let start = query
        .start_time
        .as_deref()
        .and_then(|raw| parse_time(raw, false))
        .ok_or_else(|| {
            ApiError::validation("Start time should be YYYY-MM-DD or YYYY-MM-DD hh:mm:ss")
        })?;

    let end = query
        .end_time
        .as_deref()
        .and_then(|raw| parse_time(raw, true))
        .ok_or_else(|| {
            ApiError::validation("End time should be YYYY-MM-DD or YYYY-MM-DD hh:mm:ss")
        })?;

    let page = match query.page.as_deref() {
        None | Some("") => 1,
        Some(raw) => raw
            .parse::<usize>()
            .ok()
            .filter(|page| *page >= 1)
            .ok_or_else(|| ApiError::validation("Page should be greater or equal to 1"))?,
    };

    Ok(GetLogsParams {
        min_level,
        tags,
        start,
        end,
        page,
    })
}

fn split_tags(raw: Option<&str>) -> Result<Vec<String>, ApiError> {
    let raw = match raw {
        None | Some("") => return Ok(Vec::new()),
        Some(raw) => raw,
    };

    let tags: Vec<String> = raw.split(',').map(str::to_string).collect();
    if tags.iter().any(String::is_empty) {
        return Err(ApiError::validation("Tags contain an empty string"));
    }
    Ok(tags)
}

/// Parse `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD` in local time. A date-only
/// value with `clock_to_end` set is advanced to the last instant of the day.
fn parse_time(raw: &str, clock_to_end: bool) -> Option<DateTime<Utc>> {
    let naive = match NaiveDateTime::parse_from_str(raw, TIME_FORMAT) {
        Ok(naive) => naive,
        Err(_) => {
            let date = NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()?;
            if clock_to_end {
                date.and_hms_nano_opt(23, 59, 59, 999_999_999)?
            } else {
                date.and_hms_opt(0, 0, 0)?
            }
        }
    };

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_form(message: Option<&str>, level: Option<&str>, tags: Option<&str>) -> CreateLogForm {
        CreateLogForm {
            message: message.map(str::to_string),
            level: level.map(str::to_string),
            tags: tags.map(str::to_string),
        }
    }

    #[test]
    fn create_requires_message() {
        assert!(validate_create(&create_form(None, Some("3"), None)).is_err());
        assert!(validate_create(&create_form(Some(""), Some("3"), None)).is_err());
        assert!(validate_create(&create_form(Some("hi"), Some("3"), None)).is_ok());
    }

    #[test]
    fn create_requires_level_between_one_and_five() {
        for bad in [None, Some(""), Some("0"), Some("6"), Some("abc"), Some("-1")] {
            assert!(validate_create(&create_form(Some("hi"), bad, None)).is_err());
        }
        for good in ["1", "3", "5"] {
            assert!(validate_create(&create_form(Some("hi"), Some(good), None)).is_ok());
        }
    }

    #[test]
    fn create_rejects_empty_tags() {
        assert!(validate_create(&create_form(Some("hi"), Some("3"), Some("a,,b"))).is_err());
        assert!(validate_create(&create_form(Some("hi"), Some("3"), Some(",a"))).is_err());

        let (_, _, tags) =
            validate_create(&create_form(Some("hi"), Some("3"), Some("a,b"))).unwrap();
        assert_eq!(tags, vec!["a".to_string(), "b".to_string()]);

        let (_, _, tags) = validate_create(&create_form(Some("hi"), Some("3"), None)).unwrap();
        assert!(tags.is_empty());
    }

    fn get_query(
        level: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
        page: Option<&str>,
    ) -> GetLogsQuery {
        GetLogsQuery {
            level: level.map(str::to_string),
            tags: None,
            start_time: start.map(str::to_string),
            end_time: end.map(str::to_string),
            page: page.map(str::to_string),
        }
    }

    #[test]
    fn get_level_defaults_to_wildcard() {
        let params = validate_get(&get_query(None, Some("2020-01-01"), Some("2020-01-02"), None))
            .unwrap();
        assert_eq!(params.min_level, 0);
        assert_eq!(params.page, 1);
    }

    #[test]
    fn get_rejects_level_above_five() {
        assert!(
            validate_get(&get_query(Some("6"), Some("2020-01-01"), Some("2020-01-02"), None))
                .is_err()
        );
    }

    #[test]
    fn get_requires_valid_times() {
        assert!(validate_get(&get_query(None, None, Some("2020-01-02"), None)).is_err());
        assert!(validate_get(&get_query(None, Some("01/01/2020"), Some("2020-01-02"), None))
            .is_err());
        assert!(validate_get(&get_query(
            None,
            Some("2020-01-01 10:30:00"),
            Some("2020-01-02"),
            None
        ))
        .is_ok());
    }

    #[test]
    fn get_rejects_bad_page() {
        for bad in ["0", "-1", "abc"] {
            assert!(validate_get(&get_query(
                None,
                Some("2020-01-01"),
                Some("2020-01-02"),
                Some(bad)
            ))
            .is_err());
        }
    }

    #[test]
    fn date_only_end_time_covers_the_whole_day() {
        let start = parse_time("2020-01-01", false).unwrap();
        let end = parse_time("2020-01-01", true).unwrap();
        assert!(end > start);
        assert_eq!((end - start).num_seconds(), 24 * 60 * 60 - 1);
    }
}
