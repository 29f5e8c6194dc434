use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Destination,
    Itinerary,
    Tour,
    SurveyResponse,
    SuggestedAction,
    CorrectiveAction,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Destination => "destination",
            Self::Itinerary => "itinerary",
            Self::Tour => "tour",
            Self::SurveyResponse => "survey response",
            Self::SuggestedAction => "suggested action",
            Self::CorrectiveAction => "corrective action",
        };
        f.write_str(name)
    }
}

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("{kind} `{id}` not found")]
    NotFound { kind: EntityKind, id: String },
    #[error("validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),
}

impl EngineError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Turns accumulated field errors into `Err` if any were collected.
    pub fn check(errors: Vec<FieldError>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self::Validation(errors))
        }
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation(errors) => errors,
            Self::NotFound { .. } => &[],
        }
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_field() {
        let err = EngineError::Validation(vec![
            FieldError::new("actionTaken", "is required"),
            FieldError::new("avgScoreAfter", "must be within 0-10"),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: actionTaken: is required; avgScoreAfter: must be within 0-10"
        );
        assert_eq!(err.field_errors().len(), 2);
    }

    #[test]
    fn check_passes_when_nothing_collected() {
        assert!(EngineError::check(Vec::new()).is_ok());
        assert!(EngineError::check(vec![FieldError::new("x", "bad")]).is_err());
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = EngineError::not_found(EntityKind::Tour, "t-9");
        assert_eq!(err.to_string(), "tour `t-9` not found");
    }
}
