//! Structured field validation errors and their presentation
//!
//! Validators never build user-facing strings themselves. Each failed rule
//! is recorded as a [`FieldError`] code against the field that failed, and
//! the whole set is rendered into one sentence by [`FieldErrors::render`]
//! when it reaches the HTTP boundary.

use std::fmt;

/// One failed validation rule
#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    /// The field was absent from the request
    Required,
    /// The field was present but empty
    Blank,
    /// The value is not a well-formed email address
    InvalidEmail,
    /// The value is not one of the accepted choices
    InvalidChoice { value: String },
    /// Another account already uses this value
    DuplicateIdentity { field: &'static str },
    /// Password shorter than the accepted minimum
    WeakPassword { min_length: usize },
    /// Value longer than the accepted maximum
    TooLong { max_length: usize },
    /// Numeric value outside an inclusive range
    OutOfRange { min: f64, max: f64 },
    /// A timer whose components add up to zero seconds
    ZeroDuration,
    /// Free-form rule failure
    Malformed(String),
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Required => f.write_str("This field is required."),
            FieldError::Blank => f.write_str("This field may not be blank."),
            FieldError::InvalidEmail => f.write_str("Enter a valid email address."),
            FieldError::InvalidChoice { value } => write!(f, "\"{}\" is not a valid choice.", value),
            FieldError::DuplicateIdentity { field } => {
                write!(f, "A user with this {} already exists.", field)
            }
            FieldError::WeakPassword { min_length } => write!(
                f,
                "Ensure this field has at least {} characters.",
                min_length
            ),
            FieldError::TooLong { max_length } => write!(
                f,
                "Ensure this field has no more than {} characters.",
                max_length
            ),
            FieldError::OutOfRange { min, max } => {
                write!(f, "Ensure this value is between {} and {}.", min, max)
            }
            FieldError::ZeroDuration => f.write_str("Timer duration cannot be zero."),
            FieldError::Malformed(message) => f.write_str(message),
        }
    }
}

/// How a set of field errors is turned into a sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    /// Deduplicated messages joined into one sentence
    Sentence,
    /// Like [`Presentation::Sentence`], but when the only failures are a
    /// duplicate username and a duplicate email they collapse into one
    /// combined message
    Registration,
    /// `field: message` pairs joined by `" | "`
    FieldPairs,
}

/// Validation failures keyed by field name, in the order they were recorded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldErrors {
    entries: Vec<(String, Vec<FieldError>)>,
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Presentation::Sentence))
    }
}

impl std::error::Error for FieldErrors {}

impl FieldErrors {
    /// Create an empty error set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an error set holding a single failure
    pub fn single(field: &str, error: FieldError) -> Self {
        let mut errors = Self::new();
        errors.add(field, error);
        errors
    }

    /// Record a failure against `field`
    pub fn add(&mut self, field: &str, error: FieldError) {
        match self.entries.iter_mut().find(|(name, _)| name == field) {
            Some((_, errors)) => errors.push(error),
            None => self.entries.push((field.to_string(), vec![error])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Failures recorded against `field`
    pub fn get(&self, field: &str) -> Option<&[FieldError]> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, errors)| errors.as_slice())
    }

    /// Names of the failing fields, in recording order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// `Ok(value)` when nothing failed, otherwise the collected errors
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }

    /// Render the failures as a single human-readable sentence
    ///
    /// When every failing field is only missing, the result is a
    /// "`a, b` fields are required." sentence regardless of presentation.
    pub fn render(&self, presentation: Presentation) -> String {
        if let Some(missing) = self.missing_fields() {
            return required_sentence(&missing);
        }

        match presentation {
            Presentation::Registration if self.is_duplicate_username_and_email() => {
                "A user with this username and email already exists.".to_string()
            }
            Presentation::Registration | Presentation::Sentence => self.sentence(),
            Presentation::FieldPairs => self.field_pairs(),
        }
    }

    fn missing_fields(&self) -> Option<Vec<&str>> {
        if self.is_empty() {
            return None;
        }

        let all_required = self
            .entries
            .iter()
            .all(|(_, errors)| errors.iter().all(|e| *e == FieldError::Required));

        all_required.then(|| self.fields().collect())
    }

    fn is_duplicate_username_and_email(&self) -> bool {
        let only_duplicates = self.entries.iter().all(|(_, errors)| {
            errors
                .iter()
                .all(|e| matches!(e, FieldError::DuplicateIdentity { .. }))
        });

        only_duplicates
            && self.entries.len() == 2
            && self.get("username").is_some()
            && self.get("email").is_some()
    }

    fn sentence(&self) -> String {
        let mut seen: Vec<String> = Vec::new();
        for message in self
            .entries
            .iter()
            .flat_map(|(_, errors)| errors.iter().map(ToString::to_string))
        {
            if !seen.contains(&message) {
                seen.push(message);
            }
        }
        seen.join(" ")
    }

    fn field_pairs(&self) -> String {
        self.entries
            .iter()
            .map(|(field, errors)| {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                format!("{}: {}", field, messages.join(" "))
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

fn required_sentence(fields: &[&str]) -> String {
    let suffix = if fields.len() == 1 {
        "field is required."
    } else {
        "fields are required."
    };
    format!("{} {}", fields.join(", "), suffix)
}
