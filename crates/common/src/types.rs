//! Core types shared by the page, the store, and the end-to-end suite

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::{Error, Result};

/// Storage key holding the serialized record list for an origin.
pub const STORAGE_KEY: &str = "images";

/// Feedback shown next to an invalid title.
pub const TITLE_FEEDBACK: &str = "Please type a title for the image";

/// Feedback shown next to an invalid image URL.
pub const URL_FEEDBACK: &str = "Please type a valid URL";

/// DOM ids the registration page exposes.
pub mod dom {
    pub const TITLE_INPUT: &str = "title";
    pub const TITLE_FEEDBACK: &str = "titleFeedback";
    pub const IMAGE_URL_INPUT: &str = "imageUrl";
    pub const URL_FEEDBACK: &str = "urlFeedback";
    pub const SUBMIT_BUTTON: &str = "btnSubmit";
    pub const FORM: &str = "registerForm";
    pub const CARD_LIST: &str = "card-list";
    pub const CARD_CLASS: &str = "card";
    pub const CARD_IMAGE_CLASS: &str = "card-img";
    pub const CARD_TITLE_CLASS: &str = "card-title";
}

/// A registered image.
///
/// Field order is part of the persisted format: `title` then `imageUrl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub title: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

impl ImageRecord {
    pub fn new(title: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            image_url: image_url.into(),
        }
    }
}

/// The two inputs of the registration form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    ImageUrl,
}

impl Field {
    pub const ALL: [Field; 2] = [Field::Title, Field::ImageUrl];

    /// Id of the input element for this field
    pub fn input_id(&self) -> &'static str {
        match self {
            Field::Title => dom::TITLE_INPUT,
            Field::ImageUrl => dom::IMAGE_URL_INPUT,
        }
    }

    /// Id of the feedback element for this field
    pub fn feedback_id(&self) -> &'static str {
        match self {
            Field::Title => dom::TITLE_FEEDBACK,
            Field::ImageUrl => dom::URL_FEEDBACK,
        }
    }

    /// Feedback text shown when this field is invalid
    pub fn feedback_text(&self) -> &'static str {
        match self {
            Field::Title => TITLE_FEEDBACK,
            Field::ImageUrl => URL_FEEDBACK,
        }
    }

    /// Field for a DOM input id
    pub fn from_input_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.input_id() == id)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Title => write!(f, "title"),
            Field::ImageUrl => write!(f, "imageUrl"),
        }
    }
}

/// How a submit was triggered. Both triggers have identical outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitTrigger {
    Button,
    EnterKey,
}

impl fmt::Display for SubmitTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitTrigger::Button => write!(f, "button"),
            SubmitTrigger::EnterKey => write!(f, "enter"),
        }
    }
}

/// Border color signaling a field's validity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Neutral,
    Success,
    Error,
}

impl Indicator {
    /// Computed `border-right-color` of an input carrying this indicator
    pub fn border_color(&self) -> &'static str {
        match self {
            Indicator::Neutral => "rgb(222, 226, 230)",
            Indicator::Success => "rgb(134, 183, 254)",
            Indicator::Error => "rgb(220, 53, 69)",
        }
    }

    /// CSS class the page toggles on the input
    pub fn css_class(&self) -> Option<&'static str> {
        match self {
            Indicator::Neutral => None,
            Indicator::Success => Some("is-valid"),
            Indicator::Error => Some("is-invalid"),
        }
    }
}

/// A page origin (`scheme://host[:port]`), the scope of a storage area.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    /// Derive the origin of a page URL
    pub fn from_url(page_url: &str) -> Result<Self> {
        let url = Url::parse(page_url)
            .map_err(|e| Error::InvalidOrigin(format!("{}: {}", page_url, e)))?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(Error::InvalidOrigin(format!(
                "{} has an opaque origin",
                page_url
            )));
        }
        Ok(Self(origin.ascii_serialization()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
