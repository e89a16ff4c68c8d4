//! Quiz data model: levels, questions with ordered options, and answer slots
//! with their wire sentinels.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Wire value of a slot that timed out with no selection.
pub const TIMEOUT_SENTINEL: &str = "TIMEOUT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Beginner, Level::Intermediate, Level::Advanced];

    /// Seconds per question when the timer follows the level table.
    pub fn time_limit_secs(self) -> u32 {
        match self {
            Level::Beginner => 30,
            Level::Intermediate => 45,
            Level::Advanced => 60,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }
}

impl FromStr for Level {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            _ => Err(ValidationError::UnknownLevel(s.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Beginner => write!(f, "Beginner"),
            Level::Intermediate => write!(f, "Intermediate"),
            Level::Advanced => write!(f, "Advanced"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOption {
    pub key: String,
    pub text: String,
}

/// Option keys in presentation order. Serialized as a JSON object whose
/// field order is the presentation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options(Vec<QuizOption>);

impl Options {
    pub fn new(options: Vec<QuizOption>) -> Self {
        Self(options)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuizOption> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|o| o.key == key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|o| o.key == key).map(|o| o.text.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| QuizOption { key: k.into(), text: v.into() })
                .collect(),
        )
    }
}

impl Serialize for Options {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for option in &self.0 {
            map.serialize_entry(&option.key, &option.text)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Options {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OptionsVisitor;

        impl<'de> Visitor<'de> for OptionsVisitor {
            type Value = Options;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from option key to option text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Options, A::Error> {
                let mut options: Vec<QuizOption> = Vec::with_capacity(access.size_hint().unwrap_or(4));
                while let Some((key, text)) = access.next_entry::<String, String>()? {
                    if options.iter().any(|o| o.key == key) {
                        return Err(de::Error::custom(format!("duplicate option key '{}'", key)));
                    }
                    options.push(QuizOption { key, text });
                }
                Ok(Options(options))
            }
        }

        deserializer.deserialize_map(OptionsVisitor)
    }
}

/// One generated question. Its identifier is its position in the quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub options: Options,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Question {
    /// Code snippet, treating a blank snippet as absent.
    pub fn code_snippet(&self) -> Option<&str> {
        self.code.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// State of one answer slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Answer {
    #[default]
    Unset,
    Chosen(String),
    TimedOut,
}

impl Answer {
    pub fn chosen_key(&self) -> Option<&str> {
        match self {
            Answer::Chosen(key) => Some(key),
            _ => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Answer::Unset)
    }

    pub fn matches(&self, correct: Option<&str>) -> bool {
        match (self.chosen_key(), correct) {
            (Some(chosen), Some(correct)) => chosen == correct,
            _ => false,
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Unset => write!(f, "Not answered"),
            Answer::Chosen(key) => write!(f, "{}", key),
            Answer::TimedOut => write!(f, "Time's up!"),
        }
    }
}

impl Serialize for Answer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Answer::Unset => serializer.serialize_none(),
            Answer::Chosen(key) => serializer.serialize_str(key),
            Answer::TimedOut => serializer.serialize_str(TIMEOUT_SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for Answer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<String>::deserialize(deserializer)? {
            None => Answer::Unset,
            Some(value) if value == TIMEOUT_SENTINEL => Answer::TimedOut,
            Some(key) => Answer::Chosen(key),
        })
    }
}
