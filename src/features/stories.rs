//! Short stories, oldest first, editable after posting, plus a picker
//! that suggests an opening line by theme.

use std::str::FromStr;

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::{
    core::query::Query,
    document::Fields,
    sync::{Draft, FeatureView, SyncError, ValidationError},
    types::{DocId, SortDirection, TimestampMs, collections, now_ms},
};

use super::{Feature, Record, fields_of, require_text};

const MISSING_TEXT: &str = "Please enter a title and story text";

const ROMANTIC: &[&str] = &[
    "The stars aligned as...",
    "Their hearts beat in unison when...",
    "Under the moonlit sky, they...",
    "As the sun dipped below the horizon, they found solace in each other's arms, the world around them fading into the background...",
    "He looked into her eyes, the words unspoken yet perfectly understood between them...",
    "Their fingers intertwined, the touch sending a rush of warmth through their souls as they stood on the rooftop, the city below a blur...",
    "In the quiet of the night, beneath a blanket of stars, he whispered the words she'd longed to hear...",
    "With each heartbeat, they knew they were meant for each other, the universe conspiring to bring them together...",
];

const FANTASY: &[&str] = &[
    "In the mystical forest of Eldoria, ...",
    "The dragon's roar echoed as...",
    "With a wave of the wand, the world...",
];

const ADVENTURE: &[&str] = &[
    "On the brink of the mountain peak, ...",
    "The compass pointed true as...",
    "With a map in hand, they ventured into...",
];

/// Theme of a suggested opening line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PromptCategory {
    /// The picker's initial theme.
    #[default]
    Romantic,
    /// Dragons and wands.
    Fantasy,
    /// Maps and mountains.
    Adventure,
}

impl PromptCategory {
    /// Every theme, in menu order.
    pub const ALL: [Self; 3] = [Self::Romantic, Self::Fantasy, Self::Adventure];

    /// Menu label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Romantic => "Romantic",
            Self::Fantasy => "Fantasy",
            Self::Adventure => "Adventure",
        }
    }

    /// Opening lines offered for this theme. Never empty.
    pub fn prompts(self) -> &'static [&'static str] {
        match self {
            Self::Romantic => ROMANTIC,
            Self::Fantasy => FANTASY,
            Self::Adventure => ADVENTURE,
        }
    }

    /// Picks one opening line using `rng`.
    pub fn pick(self, rng: &mut impl Rng) -> &'static str {
        self.prompts().choose(rng).copied().unwrap_or_default()
    }

    /// Picks one opening line at random.
    pub fn random_prompt(self) -> &'static str {
        self.pick(&mut rand::thread_rng())
    }
}

impl FromStr for PromptCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::new(format!("Unknown prompt category: {s}")))
    }
}

/// The story shelf.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stories;

impl Feature for Stories {
    const COLLECTION: &'static str = collections::STORIES;
    const LABEL: &'static str = "Story";
    type Record = Story;

    fn query(&self) -> Query {
        Query::collection(Self::COLLECTION).order_by("timestamp", SortDirection::Asc)
    }
}

/// One story.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Story {
    /// Document id.
    #[serde(skip)]
    pub id: DocId,
    /// Heading.
    pub title: String,
    /// Body, possibly with inline markup.
    pub text: String,
    /// Writing time.
    pub timestamp: TimestampMs,
    /// Writer's email, or `Anonymous`.
    pub user: String,
    /// Thumbnail as a URL or data URL.
    pub thumbnail: Option<String>,
}

impl Record for Story {
    fn set_id(&mut self, id: DocId) {
        self.id = id;
    }
}

/// Input for a new story.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStory {
    /// Required heading.
    pub title: String,
    /// Required body.
    pub text: String,
    /// Writing time.
    pub timestamp: TimestampMs,
    /// Writer's email, or `Anonymous`.
    pub user: String,
    /// Optional thumbnail.
    pub thumbnail: Option<String>,
}

impl Draft for NewStory {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.title, MISSING_TEXT)?;
        require_text(&self.text, MISSING_TEXT)
    }

    fn to_fields(&self) -> Fields {
        fields_of(self)
    }
}

/// Replacement title, text and thumbnail for an existing story.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryEdit {
    /// Required heading.
    pub title: String,
    /// Required body.
    pub text: String,
    /// New thumbnail; `None` clears it.
    pub thumbnail: Option<String>,
}

impl Draft for StoryEdit {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.title, MISSING_TEXT)?;
        require_text(&self.text, MISSING_TEXT)
    }

    fn to_fields(&self) -> Fields {
        fields_of(self)
    }
}

impl FeatureView<Stories> {
    /// Adds a story attributed to the signed-in user's email.
    pub async fn add_story(&mut self, title: &str, text: &str, thumbnail: Option<String>) -> Result<DocId, SyncError> {
        let user = self
            .identity()
            .and_then(|who| who.email)
            .unwrap_or_else(|| "Anonymous".to_string());
        let draft = NewStory {
            title: title.to_string(),
            text: text.to_string(),
            timestamp: now_ms(),
            user,
            thumbnail,
        };
        self.create(&draft).await
    }

    /// Replaces the title, text and thumbnail of story `id`.
    pub async fn edit_story(&mut self, id: &str, edit: StoryEdit) -> Result<(), SyncError> {
        self.update(id, &edit).await
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn every_theme_offers_prompts_and_picks_from_its_own_list() {
        let mut rng = StdRng::seed_from_u64(7);
        for category in PromptCategory::ALL {
            assert!(!category.prompts().is_empty());
            for _ in 0..20 {
                assert!(category.prompts().contains(&category.pick(&mut rng)));
            }
        }
        assert!(PromptCategory::Fantasy.prompts().contains(&PromptCategory::Fantasy.random_prompt()));
    }

    #[test]
    fn picks_vary_across_draws() {
        let mut rng = StdRng::seed_from_u64(42);
        let seen: std::collections::HashSet<_> =
            (0..200).map(|_| PromptCategory::Romantic.pick(&mut rng)).collect();
        assert!(seen.len() > 1);
    }

    #[test]
    fn categories_parse_from_menu_values() {
        assert_eq!("romantic".parse::<PromptCategory>().ok(), Some(PromptCategory::Romantic));
        assert_eq!(" Adventure ".parse::<PromptCategory>().ok(), Some(PromptCategory::Adventure));
        assert_eq!(PromptCategory::default(), PromptCategory::Romantic);
        assert!("horror".parse::<PromptCategory>().is_err());
    }
}
