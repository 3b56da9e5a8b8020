use thiserror::Error;

use crate::database::models::ChallengeId;
use crate::domain::eligibility::Refusal;
use crate::domain::scores::ScoreError;

pub type LadderResult<T> = Result<T, LadderError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Unauthorized,
    NotFound,
    Storage,
}

/// Every reason a ladder operation can be refused. The display text is what
/// the acting player sees.
#[derive(Debug, Error)]
pub enum LadderError {
    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error(transparent)]
    Ineligible(#[from] Refusal),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Challenge #{0} is no longer available.")]
    ChallengeNotFound(ChallengeId),

    #[error("{0} is no longer available.")]
    NotFound(String),

    #[error("Storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl LadderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LadderError::Score(_) | LadderError::Ineligible(_) | LadderError::Invalid(_) => {
                ErrorKind::Validation
            }
            LadderError::Conflict(_) => ErrorKind::Conflict,
            LadderError::Unauthorized(_) => ErrorKind::Unauthorized,
            LadderError::ChallengeNotFound(_) | LadderError::NotFound(_) => ErrorKind::NotFound,
            LadderError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        LadderError::Invalid(reason.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        LadderError::Conflict(reason.into())
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        LadderError::Unauthorized(reason.into())
    }
}

impl From<rusqlite::Error> for LadderError {
    fn from(err: rusqlite::Error) -> Self {
        LadderError::Storage(err.into())
    }
}
