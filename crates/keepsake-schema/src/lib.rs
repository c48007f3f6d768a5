use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One discrete full-view state of the experience.
///
/// Serialized in its text form (`welcome`, `question:0`, `video:1`, ...) so
/// routes and copy tables read naturally in YAML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScreenId {
    Welcome,
    Question(usize),
    ReassuranceText,
    Gallery,
    Affirmation,
    Video(usize),
    FinalClosure,
    Surprise,
}

impl ScreenId {
    /// No outgoing transitions; only a restart leaves it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScreenId::Surprise)
    }

    /// Screens that are left by a plain acknowledgement ("continue", video ended).
    pub fn is_passive(&self) -> bool {
        matches!(
            self,
            ScreenId::ReassuranceText
                | ScreenId::Affirmation
                | ScreenId::Video(_)
                | ScreenId::FinalClosure
        )
    }

    pub fn question_index(&self) -> Option<usize> {
        match self {
            ScreenId::Question(index) => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScreenId::Welcome => f.write_str("welcome"),
            ScreenId::Question(index) => write!(f, "question:{index}"),
            ScreenId::ReassuranceText => f.write_str("reassurance_text"),
            ScreenId::Gallery => f.write_str("gallery"),
            ScreenId::Affirmation => f.write_str("affirmation"),
            ScreenId::Video(index) => write!(f, "video:{index}"),
            ScreenId::FinalClosure => f.write_str("final_closure"),
            ScreenId::Surprise => f.write_str("surprise"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid screen id: {0}")]
pub struct ParseScreenIdError(pub String);

impl FromStr for ScreenId {
    type Err = ParseScreenIdError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let raw = input.trim();
        if let Some((kind, index)) = raw.split_once(':') {
            let index: usize = index
                .trim()
                .parse()
                .map_err(|_| ParseScreenIdError(input.to_string()))?;
            return match kind.trim() {
                "question" => Ok(ScreenId::Question(index)),
                "video" => Ok(ScreenId::Video(index)),
                _ => Err(ParseScreenIdError(input.to_string())),
            };
        }

        match raw {
            "welcome" => Ok(ScreenId::Welcome),
            "reassurance_text" => Ok(ScreenId::ReassuranceText),
            "gallery" => Ok(ScreenId::Gallery),
            "affirmation" => Ok(ScreenId::Affirmation),
            "final_closure" => Ok(ScreenId::FinalClosure),
            "surprise" => Ok(ScreenId::Surprise),
            _ => Err(ParseScreenIdError(input.to_string())),
        }
    }
}

impl TryFrom<String> for ScreenId {
    type Error = ParseScreenIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScreenId> for String {
    fn from(value: ScreenId) -> Self {
        value.to_string()
    }
}

macro_rules! key_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

key_newtype!(QuestionId);
key_newtype!(GroupId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSpec {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
}

/// "Question 2 of 4" style progress for the question screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub number: usize,
    pub total: usize,
}

impl Progress {
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.number as f64 / self.total as f64) * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSlot {
    Main,
    Left,
    Right,
}

impl MediaSlot {
    pub const ALL: [MediaSlot; 3] = [MediaSlot::Main, MediaSlot::Left, MediaSlot::Right];

    /// 1-based position of the slot inside a memory group.
    pub fn ordinal(&self) -> usize {
        match self {
            MediaSlot::Main => 1,
            MediaSlot::Left => 2,
            MediaSlot::Right => 3,
        }
    }
}

/// A named bundle of three related media shown together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryGroup {
    pub id: GroupId,
    #[serde(default)]
    pub captions: Vec<String>,
}

impl MemoryGroup {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: GroupId::new(id),
            captions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationCause {
    Tick,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionCause {
    Deadline,
    UserRequested,
}

/// Notifications emitted by the flow for renderers and other observers.
///
/// `session` is the restart counter at emission time; consumers can drop
/// anything from an older session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    FlowRestarted {
        session: u64,
    },
    ScreenChanged {
        session: u64,
        from: ScreenId,
        to: ScreenId,
    },
    AnswerRecorded {
        session: u64,
        question_id: QuestionId,
        answer: String,
    },
    NavigationScheduled {
        session: u64,
        from: ScreenId,
        to: ScreenId,
        delay_ms: u64,
    },
    CarouselIndexChanged {
        session: u64,
        generation: u64,
        index: usize,
        group_id: GroupId,
        cause: RotationCause,
    },
    GalleryCompleted {
        session: u64,
        generation: u64,
        cause: CompletionCause,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_id_text_form_round_trips() {
        for screen in [
            ScreenId::Welcome,
            ScreenId::Question(3),
            ScreenId::ReassuranceText,
            ScreenId::Gallery,
            ScreenId::Affirmation,
            ScreenId::Video(0),
            ScreenId::FinalClosure,
            ScreenId::Surprise,
        ] {
            assert_eq!(screen.to_string().parse::<ScreenId>().unwrap(), screen);
        }
    }

    #[test]
    fn screen_id_rejects_unknown_names() {
        assert!("lobby".parse::<ScreenId>().is_err());
        assert!("question:x".parse::<ScreenId>().is_err());
        assert!("gallery:1".parse::<ScreenId>().is_err());
    }

    #[test]
    fn screen_id_deserializes_from_yaml_string() {
        let screens: Vec<ScreenId> = serde_yaml::from_str("[welcome, 'question:1', 'video:2']").unwrap();
        assert_eq!(
            screens,
            vec![ScreenId::Welcome, ScreenId::Question(1), ScreenId::Video(2)]
        );
    }

    #[test]
    fn passive_and_terminal_screens() {
        assert!(ScreenId::Video(1).is_passive());
        assert!(ScreenId::FinalClosure.is_passive());
        assert!(!ScreenId::Gallery.is_passive());
        assert!(!ScreenId::Question(0).is_passive());
        assert!(ScreenId::Surprise.is_terminal());
        assert!(!ScreenId::Welcome.is_terminal());
    }

    #[test]
    fn progress_percent_rounds() {
        assert_eq!(Progress { number: 1, total: 3 }.percent(), 33);
        assert_eq!(Progress { number: 2, total: 3 }.percent(), 67);
        assert_eq!(Progress { number: 4, total: 4 }.percent(), 100);
        assert_eq!(Progress { number: 0, total: 0 }.percent(), 0);
    }

    #[test]
    fn media_slot_ordinals_follow_group_layout() {
        let ordinals: Vec<usize> = MediaSlot::ALL.iter().map(MediaSlot::ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
    }
}
