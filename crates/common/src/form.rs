//! Registration form contract
//!
//! Accept/reject rules for the two inputs and the validity state each input
//! displays. The form only decides; persisting an accepted record is the job
//! of [`crate::registry::Registrar`].
//!
//! A field is [`Validity::Pristine`] until it is typed into or a submit is
//! attempted. From then on it tracks its current value: a non-empty title
//! and a parseable absolute URL are valid, anything else is invalid.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::{Field, ImageRecord, Indicator};

/// Validity state of a single input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    #[default]
    Pristine,
    Valid,
    Invalid,
}

impl Validity {
    pub fn indicator(&self) -> Indicator {
        match self {
            Validity::Pristine => Indicator::Neutral,
            Validity::Valid => Indicator::Success,
            Validity::Invalid => Indicator::Error,
        }
    }

    fn from_check(ok: bool) -> Self {
        if ok {
            Validity::Valid
        } else {
            Validity::Invalid
        }
    }
}

/// Check a title value
pub fn validate_title(text: &str) -> Validity {
    Validity::from_check(!text.trim().is_empty())
}

/// Check an image URL value
///
/// Surrounding whitespace is ignored, as the browser strips it from URL
/// inputs before validating.
pub fn validate_image_url(text: &str) -> Validity {
    let text = text.trim();
    Validity::from_check(!text.is_empty() && Url::parse(text).is_ok())
}

/// Check a value for the given field
pub fn validate(field: Field, text: &str) -> Validity {
    match field {
        Field::Title => validate_title(text),
        Field::ImageUrl => validate_image_url(text),
    }
}

/// A field that failed validation on submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

/// Why a submit was refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub errors: Vec<FieldError>,
}

impl Rejection {
    pub fn has(&self, field: Field) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

#[derive(Debug, Clone, Default)]
struct FieldState {
    value: String,
    validity: Validity,
}

impl FieldState {
    fn revalidate(&mut self, field: Field) {
        self.validity = validate(field, &self.value);
    }
}

/// State of the two-field registration form
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    title: FieldState,
    image_url: FieldState,
}

impl RegistrationForm {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self, field: Field) -> &FieldState {
        match field {
            Field::Title => &self.title,
            Field::ImageUrl => &self.image_url,
        }
    }

    fn state_mut(&mut self, field: Field) -> &mut FieldState {
        match field {
            Field::Title => &mut self.title,
            Field::ImageUrl => &mut self.image_url,
        }
    }

    /// Current raw value of a field
    pub fn value(&self, field: Field) -> &str {
        &self.state(field).value
    }

    pub fn validity(&self, field: Field) -> Validity {
        self.state(field).validity
    }

    pub fn indicator(&self, field: Field) -> Indicator {
        self.validity(field).indicator()
    }

    /// Feedback text to display for a field, if it is invalid
    pub fn feedback(&self, field: Field) -> Option<&'static str> {
        match self.validity(field) {
            Validity::Invalid => Some(field.feedback_text()),
            _ => None,
        }
    }

    /// Append typed text to a field and revalidate it
    pub fn type_text(&mut self, field: Field, text: &str) {
        let state = self.state_mut(field);
        state.value.push_str(text);
        state.revalidate(field);
    }

    /// Replace a field's value and revalidate it
    pub fn set_value(&mut self, field: Field, text: &str) {
        let state = self.state_mut(field);
        state.value = text.to_string();
        state.revalidate(field);
    }

    /// Evaluate both fields for a submit attempt.
    ///
    /// On rejection both fields are marked with their current validity. On
    /// acceptance the form is left untouched; call [`Self::reset`] once the
    /// record is stored.
    pub fn submit(&mut self) -> Result<ImageRecord, Rejection> {
        let mut errors = Vec::new();
        for field in Field::ALL {
            let state = self.state_mut(field);
            state.revalidate(field);
            if state.validity == Validity::Invalid {
                errors.push(FieldError {
                    field,
                    message: field.feedback_text().to_string(),
                });
            }
        }

        if !errors.is_empty() {
            return Err(Rejection { errors });
        }

        Ok(ImageRecord::new(
            self.title.value.clone(),
            self.image_url.value.trim(),
        ))
    }

    /// Clear both inputs and return them to the pristine state
    pub fn reset(&mut self) {
        self.title = FieldState::default();
        self.image_url = FieldState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TITLE_FEEDBACK, URL_FEEDBACK};

    const ALIEN_URL: &str =
        "https://cdn.mos.cms.futurecdn.net/eM9EvWyDxXcnQTTyH8c8p5-1200-80.jpg";

    #[test]
    fn test_title_rules() {
        assert_eq!(validate_title(""), Validity::Invalid);
        assert_eq!(validate_title("   "), Validity::Invalid);
        assert_eq!(validate_title("Alien BR"), Validity::Valid);
    }

    #[test]
    fn test_url_rules() {
        assert_eq!(validate_image_url(""), Validity::Invalid);
        assert_eq!(validate_image_url("not a url"), Validity::Invalid);
        assert_eq!(validate_image_url("cdn.example.com/a.jpg"), Validity::Invalid);
        assert_eq!(validate_image_url(ALIEN_URL), Validity::Valid);
        assert_eq!(validate_image_url("  https://example.com/a.png "), Validity::Valid);
    }

    #[test]
    fn test_fields_start_pristine() {
        let form = RegistrationForm::new();
        for field in Field::ALL {
            assert_eq!(form.validity(field), Validity::Pristine);
            assert_eq!(form.indicator(field), Indicator::Neutral);
            assert_eq!(form.feedback(field), None);
        }
    }

    #[test]
    fn test_typing_validates_immediately() {
        let mut form = RegistrationForm::new();
        form.type_text(Field::Title, "Alien BR");
        assert_eq!(form.indicator(Field::Title), Indicator::Success);
        assert_eq!(form.indicator(Field::ImageUrl), Indicator::Neutral);

        form.type_text(Field::ImageUrl, "https://");
        assert_eq!(form.indicator(Field::ImageUrl), Indicator::Error);
        form.type_text(Field::ImageUrl, "example.com/x.jpg");
        assert_eq!(form.indicator(Field::ImageUrl), Indicator::Success);
    }

    #[test]
    fn test_empty_submit_marks_both_fields() {
        let mut form = RegistrationForm::new();
        let rejection = form.submit().unwrap_err();

        assert!(rejection.has(Field::Title));
        assert!(rejection.has(Field::ImageUrl));
        assert_eq!(form.feedback(Field::Title), Some(TITLE_FEEDBACK));
        assert_eq!(form.feedback(Field::ImageUrl), Some(URL_FEEDBACK));
        assert_eq!(form.indicator(Field::Title), Indicator::Error);
        assert_eq!(form.indicator(Field::ImageUrl), Indicator::Error);
    }

    #[test]
    fn test_partial_submit_keeps_values() {
        let mut form = RegistrationForm::new();
        form.type_text(Field::Title, "Aliens");
        let rejection = form.submit().unwrap_err();

        assert_eq!(rejection.errors.len(), 1);
        assert!(rejection.has(Field::ImageUrl));
        assert_eq!(form.value(Field::Title), "Aliens");
        assert_eq!(form.indicator(Field::Title), Indicator::Success);
    }

    #[test]
    fn test_accepted_submit_produces_record() {
        let mut form = RegistrationForm::new();
        form.type_text(Field::Title, "Alien BR");
        form.set_value(Field::ImageUrl, ALIEN_URL);

        let record = form.submit().unwrap();
        assert_eq!(record, ImageRecord::new("Alien BR", ALIEN_URL));

        form.reset();
        assert_eq!(form.value(Field::Title), "");
        assert_eq!(form.value(Field::ImageUrl), "");
        assert_eq!(form.validity(Field::Title), Validity::Pristine);
    }

    #[test]
    fn test_blank_title_is_rejected_and_padding_is_kept() {
        let mut form = RegistrationForm::new();
        form.type_text(Field::Title, "   ");
        form.set_value(Field::ImageUrl, ALIEN_URL);
        assert_eq!(form.indicator(Field::Title), Indicator::Error);

        let rejection = form.submit().unwrap_err();
        assert_eq!(rejection.errors.len(), 1);
        assert!(rejection.has(Field::Title));

        form.set_value(Field::Title, " Aliens ");
        let record = form.submit().unwrap();
        assert_eq!(record.title, " Aliens ");
    }
}
