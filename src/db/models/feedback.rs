use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Comments matching any of these are rejected outright.
const BLOCKED_KEYWORDS: [&str; 3] = ["spam", "fake", "scam"];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "feedback_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSource {
    /// Full feedback form.
    Detailed,
    /// Compact widget with tighter limits.
    Quick,
}

impl FeedbackSource {
    pub fn min_comment_len(self) -> usize {
        match self {
            FeedbackSource::Detailed => 10,
            FeedbackSource::Quick => 5,
        }
    }

    pub fn max_comment_len(self) -> usize {
        match self {
            FeedbackSource::Detailed => 1000,
            FeedbackSource::Quick => 500,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FeedbackValidationError {
    #[error("Rating must be between 1 and 5")]
    RatingOutOfRange,

    #[error("Comment must be at least {0} characters long")]
    CommentTooShort(usize),

    #[error("Comment must be at most {0} characters long")]
    CommentTooLong(usize),

    #[error("Comment contains blocked content")]
    BlockedKeyword,
}

pub fn validate_rating(rating: i16) -> Result<(), FeedbackValidationError> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(FeedbackValidationError::RatingOutOfRange)
    }
}

/// Comment is optional; an empty or whitespace-only comment passes and is
/// stored as absent. Length windows depend on the submission source.
pub fn validate_comment(
    comment: &str,
    source: FeedbackSource,
) -> Result<(), FeedbackValidationError> {
    let trimmed = comment.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    if trimmed.chars().count() < source.min_comment_len() {
        return Err(FeedbackValidationError::CommentTooShort(
            source.min_comment_len(),
        ));
    }
    if trimmed.chars().count() > source.max_comment_len() {
        return Err(FeedbackValidationError::CommentTooLong(
            source.max_comment_len(),
        ));
    }
    let lowered = trimmed.to_lowercase();
    if BLOCKED_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return Err(FeedbackValidationError::BlockedKeyword);
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Feedback {
    pub id: i32,
    pub booking_id: i32,
    pub house_owner_id: i32,
    pub technician_id: Option<i32>,
    pub service_id: i32,
    pub rating: i16,
    pub quality_rating: Option<i16>,
    pub punctuality_rating: Option<i16>,
    pub professionalism_rating: Option<i16>,
    pub comment: Option<String>,
    pub source: FeedbackSource,
    pub admin_response: Option<String>,
    pub responded_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewFeedback {
    pub booking_id: i32,
    pub rating: i16,
    pub quality_rating: Option<i16>,
    pub punctuality_rating: Option<i16>,
    pub professionalism_rating: Option<i16>,
    pub comment: Option<String>,
    #[serde(default = "default_source")]
    pub source: FeedbackSource,
}

fn default_source() -> FeedbackSource {
    FeedbackSource::Detailed
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminReply {
    pub response: String,
}

#[derive(Debug, Deserialize, Default, IntoParams)]
pub struct FeedbackFilter {
    pub rating: Option<i16>,
    pub technician_id: Option<i32>,
    pub service_id: Option<i32>,
    pub unanswered_only: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Aggregates backing the admin dashboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackStats {
    pub total: i64,
    pub average_rating: Option<f64>,
    /// Count of feedback entries per overall rating, index 0 = rating 1.
    pub rating_distribution: [i64; 5],
    pub average_quality: Option<f64>,
    pub average_punctuality: Option<f64>,
    pub average_professionalism: Option<f64>,
    pub awaiting_technician: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_comment_is_allowed() {
        assert_eq!(validate_comment("", FeedbackSource::Detailed), Ok(()));
        assert_eq!(validate_comment("   ", FeedbackSource::Quick), Ok(()));
    }

    #[test]
    fn short_comment_is_rejected_per_source() {
        assert_eq!(
            validate_comment("ab", FeedbackSource::Detailed),
            Err(FeedbackValidationError::CommentTooShort(10))
        );
        // 5 chars is enough for the quick widget but not the long form
        assert_eq!(validate_comment("great", FeedbackSource::Quick), Ok(()));
        assert_eq!(
            validate_comment("great", FeedbackSource::Detailed),
            Err(FeedbackValidationError::CommentTooShort(10))
        );
    }

    #[test]
    fn overlong_comment_is_rejected() {
        let long = "x".repeat(1001);
        assert_eq!(
            validate_comment(&long, FeedbackSource::Detailed),
            Err(FeedbackValidationError::CommentTooLong(1000))
        );
        let quick_long = "x".repeat(501);
        assert_eq!(
            validate_comment(&quick_long, FeedbackSource::Quick),
            Err(FeedbackValidationError::CommentTooLong(500))
        );
    }

    #[test]
    fn blocked_keywords_fail_regardless_of_length() {
        assert_eq!(
            validate_comment("this service is a total scam honestly", FeedbackSource::Detailed),
            Err(FeedbackValidationError::BlockedKeyword)
        );
        assert_eq!(
            validate_comment("SCAM alert", FeedbackSource::Quick),
            Err(FeedbackValidationError::BlockedKeyword)
        );
    }

    #[test]
    fn trimming_happens_before_length_check() {
        // 12 chars of padding around a 2-char comment still fails
        assert_eq!(
            validate_comment("      ab      ", FeedbackSource::Detailed),
            Err(FeedbackValidationError::CommentTooShort(10))
        );
    }

    #[test]
    fn rating_bounds() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert_eq!(
            validate_rating(0),
            Err(FeedbackValidationError::RatingOutOfRange)
        );
        assert_eq!(
            validate_rating(6),
            Err(FeedbackValidationError::RatingOutOfRange)
        );
    }
}
