//! Validated text types shared across the HSR workspace.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// The input was not a syntactically valid email address
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// The input contained whitespace where a single token was expected
    #[error("Identifier must not contain whitespace: {0}")]
    ContainsWhitespace(String),

    /// The input contained a control character or `<`/`>`, which cannot appear in a
    /// commit signature
    #[error("Text contains a forbidden character: {0:?}")]
    ForbiddenCharacter(String),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Like [`NonEmptyText::new`], but additionally rejects any interior whitespace, and
    /// the characters [`NonEmptyText::single_line`] rejects.
    ///
    /// Used for account names (usernames, group names) which appear in access lists
    /// and commit signatures.
    pub fn token(input: impl AsRef<str>) -> Result<Self, TextError> {
        let text = Self::single_line(input)?;
        if text.0.chars().any(char::is_whitespace) {
            return Err(TextError::ContainsWhitespace(text.0));
        }
        Ok(text)
    }

    /// Like [`NonEmptyText::new`], but rejects control characters (including line breaks)
    /// and `<`/`>`.
    ///
    /// Used for display names that end up in commit signatures.
    pub fn single_line(input: impl AsRef<str>) -> Result<Self, TextError> {
        let text = Self::new(input)?;
        if text
            .0
            .chars()
            .any(|c| c.is_control() || c == '<' || c == '>')
        {
            return Err(TextError::ForbiddenCharacter(text.0));
        }
        Ok(text)
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

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
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

/// A syntactically valid email address.
///
/// Validation is delegated to the `email_address` crate; the stored form is the trimmed input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Parses and validates an email address.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        if !email_address::EmailAddress::is_valid(trimmed) {
            return Err(TextError::InvalidEmail(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for EmailAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for EmailAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        EmailAddress::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_input() {
        let text = NonEmptyText::new("  Soil moisture  ").unwrap();
        assert_eq!(text.as_str(), "Soil moisture");
    }

    #[test]
    fn non_empty_text_rejects_blank() {
        assert_eq!(NonEmptyText::new("   ").unwrap_err(), TextError::Empty);
        assert_eq!(NonEmptyText::new("").unwrap_err(), TextError::Empty);
    }

    #[test]
    fn token_rejects_interior_whitespace() {
        assert!(NonEmptyText::token("jdoe").is_ok());
        assert!(matches!(
            NonEmptyText::token("j doe"),
            Err(TextError::ContainsWhitespace(_))
        ));
    }

    #[test]
    fn signature_breaking_characters_are_rejected() {
        assert!(matches!(
            NonEmptyText::token("eve<x>"),
            Err(TextError::ForbiddenCharacter(_))
        ));
        assert!(matches!(
            NonEmptyText::single_line("Dave\nSmith"),
            Err(TextError::ForbiddenCharacter(_))
        ));
        assert!(matches!(
            NonEmptyText::single_line("Fay <admin>"),
            Err(TextError::ForbiddenCharacter(_))
        ));
        assert_eq!(
            NonEmptyText::single_line("  Fay Weldon ").unwrap().as_str(),
            "Fay Weldon"
        );
    }

    #[test]
    fn email_address_validates() {
        let email = EmailAddress::parse(" jdoe@example.org ").unwrap();
        assert_eq!(email.as_str(), "jdoe@example.org");
        assert!(matches!(
            EmailAddress::parse("not-an-email"),
            Err(TextError::InvalidEmail(_))
        ));
    }

    #[test]
    fn deserialize_rejects_empty_text() {
        let result: Result<NonEmptyText, _> = serde_json::from_str("\"  \"");
        assert!(result.is_err());
        let ok: NonEmptyText = serde_json::from_str("\"title\"").unwrap();
        assert_eq!(ok.as_str(), "title");
    }
}
