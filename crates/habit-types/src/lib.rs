//! Validated text types shared across the habit workspace.
//!
//! Identifiers arriving over HTTP are embedded into ledger messages and URL paths, so they are
//! checked once at the boundary and carried as strong types afterwards.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input exceeded the maximum permitted length
    #[error("Text exceeds maximum length of {max} characters")]
    TooLong { max: usize },
    /// The input contained a character outside the permitted set
    #[error("Text contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the owned string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Identifier of a patient as stored on the ledger.
///
/// Patient identifiers are opaque to this service but are restricted to a conservative ASCII set
/// so they can be used verbatim in URL paths and contract messages:
/// alphanumerics plus `-`, `_` and `.`, at most 128 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatientId(String);

impl PatientId {
    /// Maximum accepted identifier length.
    pub const MAX_LEN: usize = 128;

    /// Parses and validates a patient identifier.
    ///
    /// # Errors
    ///
    /// Returns a `TextError` if the identifier is empty, too long, or contains characters outside
    /// the permitted set.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(TextError::TooLong { max: Self::MAX_LEN });
        }
        if let Some(c) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(TextError::InvalidCharacter(c));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Access token gating reads of a patient's stored records.
///
/// `Debug` output is redacted so keys do not leak into logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ViewingKey(String);

impl ViewingKey {
    /// Wraps a viewing key, rejecting empty or whitespace-only input.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` if the trimmed key is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        NonEmptyText::new(input).map(|t| Self(t.into_inner()))
    }

    /// Returns the raw key. Callers must not log the returned value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ViewingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ViewingKey(***)")
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for PatientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PatientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

impl serde::Serialize for PatientId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for PatientId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PatientId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_and_rejects_blank() {
        assert_eq!(NonEmptyText::new("  walk  ").unwrap().as_str(), "walk");
        assert_eq!(NonEmptyText::new("   "), Err(TextError::Empty));
    }

    #[test]
    fn patient_id_accepts_conservative_ascii() {
        let id = PatientId::parse("patient-123_a.b").unwrap();
        assert_eq!(id.as_str(), "patient-123_a.b");
    }

    #[test]
    fn patient_id_rejects_path_separators_and_spaces() {
        assert_eq!(
            PatientId::parse("../etc"),
            Err(TextError::InvalidCharacter('/'))
        );
        assert_eq!(
            PatientId::parse("two words"),
            Err(TextError::InvalidCharacter(' '))
        );
    }

    #[test]
    fn patient_id_rejects_overlong_input() {
        let long = "a".repeat(PatientId::MAX_LEN + 1);
        assert_eq!(
            PatientId::parse(long),
            Err(TextError::TooLong {
                max: PatientId::MAX_LEN
            })
        );
    }

    #[test]
    fn patient_id_deserialize_validates() {
        let ok: PatientId = serde_json::from_str("\"123\"").unwrap();
        assert_eq!(ok.as_str(), "123");
        assert!(serde_json::from_str::<PatientId>("\"\"").is_err());
    }

    #[test]
    fn viewing_key_debug_is_redacted() {
        let key = ViewingKey::new("secret-key").unwrap();
        assert_eq!(format!("{key:?}"), "ViewingKey(***)");
        assert_eq!(key.expose(), "secret-key");
    }
}
