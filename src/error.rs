//! Error taxonomy of the point economy.
//!
//! Every rejected transition surfaces as its own variant so callers can show an
//! accurate message. `kind()` groups variants into the categories callers act on
//! (correct the input, refresh state, give up), and `IntoResponse` maps them onto
//! the HTTP status codes of the public API.

// region:    --- Imports
use crate::ledger::LedgerError;
use crate::{AuctionId, EventId, GuildId};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
// endregion: --- Imports

pub type Result<T> = std::result::Result<T, EconomyError>;

/// Broad category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or out-of-range input. User-correctable.
    Validation,
    /// Actor is not allowed to perform the action. No retry.
    Authorization,
    /// Wrong lifecycle state. Client must refresh.
    StateConflict,
    /// Retry with different input (higher bid, more points).
    ResourceConflict,
    NotFound,
    /// A collaborator could not be reached.
    Unavailable,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EconomyError {
    // -- Validation
    #[error("end time must be after start time")]
    InvalidRange,

    #[error("invalid prices: {0}")]
    InvalidPrices(&'static str),

    #[error("invalid `{field}`: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    #[error("access code does not match")]
    InvalidCode,

    #[error("malformed request body: {0}")]
    InvalidBody(String),

    // -- Authorization
    #[error("only the guild owner can do this")]
    NotOwner,

    #[error("member does not belong to this guild")]
    NotMember,

    #[error("missing or malformed member identity")]
    Unauthenticated,

    // -- State conflict
    #[error("already participating in this event")]
    AlreadyParticipating,

    #[error("not signed up for this event")]
    NotSignedUp,

    #[error("participation is already confirmed or attended")]
    AlreadyConfirmedOrAttended,

    #[error("participation is in the wrong state for this action")]
    WrongState,

    #[error("attendance already validated")]
    AlreadyValidated,

    #[error("validation window is closed")]
    OutOfWindow,

    #[error("auction is not active")]
    NotActive,

    #[error("auction has already ended")]
    AlreadyEnded,

    #[error("auction is already cancelled")]
    AlreadyCancelled,

    #[error("auction has no buyout option")]
    NoBuyoutOption,

    // -- Resource conflict
    #[error("bid must exceed the current bid of {current_bid}")]
    BidTooLow { current_bid: i64, minimum_bid: i64 },

    #[error("insufficient DKP: {required} required")]
    InsufficientFunds { required: i64 },

    // -- Not found
    #[error("event {0} not found")]
    EventNotFound(EventId),

    #[error("auction {0} not found")]
    AuctionNotFound(AuctionId),

    #[error("guild {0} not found")]
    GuildNotFound(GuildId),

    // -- Collaborators
    #[error("DKP ledger unavailable: {0}")]
    LedgerUnavailable(String),
}

impl EconomyError {
    pub fn kind(&self) -> ErrorKind {
        use EconomyError::*;
        match self {
            InvalidRange
            | InvalidPrices(_)
            | InvalidField { .. }
            | InvalidCode
            | InvalidBody(_) => ErrorKind::Validation,
            NotOwner | NotMember | Unauthenticated => ErrorKind::Authorization,
            AlreadyParticipating
            | NotSignedUp
            | AlreadyConfirmedOrAttended
            | WrongState
            | AlreadyValidated
            | OutOfWindow
            | NotActive
            | AlreadyEnded
            | AlreadyCancelled
            | NoBuyoutOption => ErrorKind::StateConflict,
            BidTooLow { .. } | InsufficientFunds { .. } => ErrorKind::ResourceConflict,
            EventNotFound(_) | AuctionNotFound(_) | GuildNotFound(_) => ErrorKind::NotFound,
            LedgerUnavailable(_) => ErrorKind::Unavailable,
        }
    }

    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        use EconomyError::*;
        match self {
            InvalidRange => "INVALID_RANGE",
            InvalidPrices(_) => "INVALID_PRICES",
            InvalidField { .. } => "VALIDATION_ERROR",
            InvalidCode => "INVALID_CODE",
            InvalidBody(_) => "INVALID_BODY",
            NotOwner => "NOT_OWNER",
            NotMember => "NOT_MEMBER",
            Unauthenticated => "UNAUTHENTICATED",
            AlreadyParticipating => "ALREADY_PARTICIPATING",
            NotSignedUp => "NOT_SIGNED_UP",
            AlreadyConfirmedOrAttended => "ALREADY_CONFIRMED_OR_ATTENDED",
            WrongState => "WRONG_STATE",
            AlreadyValidated => "ALREADY_VALIDATED",
            OutOfWindow => "OUT_OF_WINDOW",
            NotActive => "NOT_ACTIVE",
            AlreadyEnded => "ALREADY_ENDED",
            AlreadyCancelled => "ALREADY_CANCELLED",
            NoBuyoutOption => "NO_BUYOUT_OPTION",
            BidTooLow { .. } => "BID_TOO_LOW",
            InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            EventNotFound(_) | AuctionNotFound(_) | GuildNotFound(_) => "NOT_FOUND",
            LedgerUnavailable(_) => "LEDGER_UNAVAILABLE",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        use EconomyError::*;
        match self {
            InvalidCode | InvalidBody(_) | BidTooLow { .. } => StatusCode::BAD_REQUEST,
            Unauthenticated => StatusCode::UNAUTHORIZED,
            InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            NotOwner | NotMember => StatusCode::FORBIDDEN,
            OutOfWindow => StatusCode::GONE,
            InvalidRange | InvalidPrices(_) | InvalidField { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => match self.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::CONFLICT,
            },
        }
    }
}

/// Ledger failures keep their meaning: only a real shortfall is `InsufficientFunds`.
impl From<LedgerError> for EconomyError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientFunds { required, .. } => {
                EconomyError::InsufficientFunds { required }
            }
            LedgerError::Unavailable(reason) => EconomyError::LedgerUnavailable(reason),
            LedgerError::InvalidAmount(_) => EconomyError::InvalidField {
                field: "amount",
                reason: "must be positive",
            },
            LedgerError::Overflow => EconomyError::InvalidField {
                field: "amount",
                reason: "would overflow the balance",
            },
        }
    }
}

impl IntoResponse for EconomyError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "success": false,
            "code": self.code(),
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let EconomyError::BidTooLow {
            current_bid,
            minimum_bid,
        } = &self
        {
            body["current_bid"] = (*current_bid).into();
            body["minimum_bid"] = (*minimum_bid).into();
        }
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_outage_is_not_insufficient_funds() {
        let err: EconomyError = LedgerError::Unavailable("connection refused".into()).into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err: EconomyError = LedgerError::InsufficientFunds {
            balance: 3,
            required: 10,
        }
        .into();
        assert_eq!(err, EconomyError::InsufficientFunds { required: 10 });
        assert_eq!(err.status_code(), StatusCode::PAYMENT_REQUIRED);

        let err: EconomyError = LedgerError::Overflow.into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn status_codes_follow_api_contract() {
        assert_eq!(EconomyError::InvalidCode.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(EconomyError::OutOfWindow.status_code(), StatusCode::GONE);
        assert_eq!(EconomyError::NotActive.status_code(), StatusCode::CONFLICT);
        assert_eq!(EconomyError::NotOwner.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            EconomyError::AuctionNotFound(9).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            EconomyError::InvalidRange.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
