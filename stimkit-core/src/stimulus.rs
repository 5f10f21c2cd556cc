use serde::{Deserialize, Serialize};

/// Id of the stimulus element on the display surface.
pub const STIMULUS_ELEMENT_ID: &str = "stimkit-single-stim-stimulus";

/// Class added to the stimulus element once a valid response was seen.
pub const RESPONDED_CLASS: &str = "responded";

/// What gets shown: an image reference or an opaque markup fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "source", rename_all = "snake_case")]
pub enum StimulusContent {
    Image(String),
    Markup(String),
}

impl StimulusContent {
    pub fn new(source: impl Into<String>, is_markup: bool) -> Self {
        let source = source.into();
        if is_markup {
            StimulusContent::Markup(source)
        } else {
            StimulusContent::Image(source)
        }
    }

    /// The identifier recorded as `stimulus` in trial data.
    pub fn source(&self) -> &str {
        match self {
            StimulusContent::Image(src) | StimulusContent::Markup(src) => src,
        }
    }

    pub fn is_markup(&self) -> bool {
        matches!(self, StimulusContent::Markup(_))
    }
}

/// A node appended to the display surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Stimulus {
        id: &'static str,
        content: StimulusContent,
    },
    Prompt(String),
}

impl Element {
    pub fn id(&self) -> Option<&str> {
        match self {
            Element::Stimulus { id, .. } => Some(id),
            Element::Prompt(_) => None,
        }
    }
}
