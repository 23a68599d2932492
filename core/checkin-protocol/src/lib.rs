//! Wire protocol types and validation for ticket check-in backends.
//!
//! This crate is shared by scanning clients and backends to prevent schema
//! drift. The backend remains the authority on validation, but clients reuse
//! the same types to build requests and decode responses.
//!
//! Messages are newline-delimited JSON: one [`Request`] per line, answered by
//! one [`Response`] per line.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024; // 1MB

pub const ERROR_TICKET_NOT_FOUND: &str = "ticket_not_found";
pub const ERROR_TICKET_NOT_CONFIRMED: &str = "ticket_not_confirmed";
pub const ERROR_ALREADY_CHECKED_IN_TODAY: &str = "already_checked_in_today";
pub const ERROR_TICKET_CANCELLED: &str = "ticket_cancelled";
pub const ERROR_INVALID_PARAMS: &str = "invalid_params";

const MAX_CODE_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    ValidateTicket,
    CheckinTicket,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn rejected(code: RejectionCode, message: impl Into<String>) -> Self {
        Self::new(code.as_code(), message)
    }

    /// Structured rejection carried by this error, if the code is one of the
    /// known ticket policy codes.
    pub fn rejection(&self) -> Option<RejectionCode> {
        RejectionCode::from_code(&self.code)
    }
}

/// Why a backend refused to validate or check in a ticket.
///
/// Closed set: anything else a backend reports is treated as a generic
/// failure by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCode {
    TicketNotFound,
    TicketNotConfirmed,
    AlreadyCheckedInToday,
    TicketCancelled,
}

impl RejectionCode {
    pub fn as_code(&self) -> &'static str {
        match self {
            RejectionCode::TicketNotFound => ERROR_TICKET_NOT_FOUND,
            RejectionCode::TicketNotConfirmed => ERROR_TICKET_NOT_CONFIRMED,
            RejectionCode::AlreadyCheckedInToday => ERROR_ALREADY_CHECKED_IN_TODAY,
            RejectionCode::TicketCancelled => ERROR_TICKET_CANCELLED,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            ERROR_TICKET_NOT_FOUND => Some(RejectionCode::TicketNotFound),
            ERROR_TICKET_NOT_CONFIRMED => Some(RejectionCode::TicketNotConfirmed),
            ERROR_ALREADY_CHECKED_IN_TODAY => Some(RejectionCode::AlreadyCheckedInToday),
            ERROR_TICKET_CANCELLED => Some(RejectionCode::TicketCancelled),
            _ => None,
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }

    /// Decodes the payload of a response.
    ///
    /// A successful response with no data (or JSON `null`) decodes to `None`,
    /// which is how `validate_ticket` reports an unknown code.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<Option<T>, ResponseError> {
        if !self.ok {
            let info = self.error.unwrap_or_else(|| {
                ErrorInfo::new("unknown_error", "backend reported failure without details")
            });
            return Err(ResponseError::Remote(info));
        }

        match self.data {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| ResponseError::Malformed(err.to_string())),
        }
    }
}

/// Failure decoding a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    /// The backend answered with `ok: false`.
    Remote(ErrorInfo),
    /// The payload did not match the expected schema.
    Malformed(String),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidateParams {
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckinParams {
    pub ticket_id: String,
}

/// A ticket/registration as resolved by `validate_ticket`.
///
/// Backends may attach extra descriptive fields; they are preserved in
/// `extra` so clients can display them without schema changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ticket_id: String,
    pub attendee_name: String,
    pub checked_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckinStatus {
    CheckedIn,
    /// Another station confirmed this ticket first.
    AlreadyCheckedIn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinReceipt {
    pub ticket_id: String,
    pub status: CheckinStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_in_at: Option<DateTime<Utc>>,
}

pub fn parse_validate_params(params: Option<Value>) -> Result<ValidateParams, ErrorInfo> {
    let params: ValidateParams = decode_params(params, "validate_ticket")?;
    require_string(&params.code, "code")?;
    if params.code.len() > MAX_CODE_LEN {
        return Err(ErrorInfo::new(
            ERROR_INVALID_PARAMS,
            format!("code must be {} characters or fewer", MAX_CODE_LEN),
        ));
    }
    Ok(params)
}

pub fn parse_checkin_params(params: Option<Value>) -> Result<CheckinParams, ErrorInfo> {
    let params: CheckinParams = decode_params(params, "checkin_ticket")?;
    require_string(&params.ticket_id, "ticket_id")?;
    Ok(params)
}

fn decode_params<T: DeserializeOwned>(params: Option<Value>, method: &str) -> Result<T, ErrorInfo> {
    let value = params.ok_or_else(|| {
        ErrorInfo::new(
            ERROR_INVALID_PARAMS,
            format!("{} requires params", method),
        )
    })?;
    serde_json::from_value(value).map_err(|err| {
        ErrorInfo::new(
            ERROR_INVALID_PARAMS,
            format!("{} params are invalid: {}", method, err),
        )
    })
}

fn require_string(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if value.trim().is_empty() {
        return Err(ErrorInfo::new(
            "missing_field",
            format!("{} is required", field),
        ));
    }
    Ok(())
}
