use thiserror::Error;

const PLACEHOLDER: &str = "None";
const RELEASE_FALLBACK: &str = "TBD";
const DESCRIPTION_FALLBACK: &str = "No description available.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CardError {
    #[error("card markup is missing the `{0}` attribute")]
    MissingAttribute(&'static str),
}

/// Snapshot of a hoverable game card, read from its dataset attributes at
/// hover time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Card {
    pub id: String,
    pub title: String,
    pub release: Option<String>,
    pub rating: Option<String>,
    pub genre: String,
    pub description: Option<String>,
    pub cover_image: String,
    pub landscape_image: Option<String>,
    pub trailer_url: Option<String>,
}

/// Text shown in the popup's info panel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PopupDetails {
    pub title: String,
    pub release: String,
    pub rating: String,
    pub genre: String,
    pub description: String,
}

/// Server templates render missing values as an empty string or the literal
/// `None`; both mean "absent".
fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty() && value != PLACEHOLDER)
}

impl Card {
    /// Builds a card from string-keyed attributes (`id`, `title`, `release`,
    /// `rating`, `genre`, `description`, `image`, `landscape`, `trailer`).
    pub fn from_attributes<F>(attribute: F) -> Result<Self, CardError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let id = present(attribute("id")).ok_or(CardError::MissingAttribute("id"))?;
        let cover_image = present(attribute("image")).ok_or(CardError::MissingAttribute("image"))?;

        Ok(Self {
            id,
            title: attribute("title").unwrap_or_default(),
            release: present(attribute("release")),
            rating: present(attribute("rating")),
            genre: attribute("genre").unwrap_or_default(),
            description: present(attribute("description")),
            cover_image,
            landscape_image: present(attribute("landscape")),
            trailer_url: present(attribute("trailer")),
        })
    }

    /// Landscape art when the card has one, otherwise the cover.
    pub fn display_image(&self) -> &str {
        self.landscape_image.as_deref().unwrap_or(&self.cover_image)
    }

    pub fn trailer(&self) -> Option<&str> {
        self.trailer_url.as_deref()
    }

    pub fn details(&self) -> PopupDetails {
        PopupDetails {
            title: self.title.clone(),
            release: self
                .release
                .clone()
                .unwrap_or_else(|| RELEASE_FALLBACK.to_string()),
            rating: self
                .rating
                .as_deref()
                .map(|rating| format!("★ {rating}"))
                .unwrap_or_default(),
            genre: self.genre.clone(),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| DESCRIPTION_FALLBACK.to_string()),
        }
    }
}
