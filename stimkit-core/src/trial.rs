use crate::stimulus::StimulusContent;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Value written in place of `rt` or `key_press` when nothing was pressed.
pub const NO_RESPONSE: i64 = -1;

/// A keyboard key as named by the host, e.g. `"f"` or `"space"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    pub fn new(name: impl Into<String>) -> Self {
        Key(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, other: &Key) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::new(name)
    }
}

/// Keys a trial will accept as a response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeyChoice {
    #[default]
    Any,
    Keys(Vec<Key>),
}

impl KeyChoice {
    /// An empty key list accepts any key.
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let keys: Vec<Key> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            KeyChoice::Any
        } else {
            KeyChoice::Keys(keys)
        }
    }

    pub fn accepts(&self, key: &Key) -> bool {
        match self {
            KeyChoice::Any => true,
            KeyChoice::Keys(keys) => keys.iter().any(|k| k.matches(key)),
        }
    }
}

impl Serialize for KeyChoice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            KeyChoice::Any => serializer.serialize_str("any"),
            KeyChoice::Keys(keys) => keys.serialize(serializer),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeyChoiceRepr {
    Keys(Vec<Key>),
    Word(String),
}

impl<'de> Deserialize<'de> for KeyChoice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<KeyChoiceRepr>::deserialize(deserializer)? {
            None => Ok(KeyChoice::Any),
            Some(KeyChoiceRepr::Keys(keys)) => Ok(KeyChoice::from_keys(keys)),
            Some(KeyChoiceRepr::Word(word)) if word.eq_ignore_ascii_case("any") => {
                Ok(KeyChoice::Any)
            }
            Some(KeyChoiceRepr::Word(word)) => Err(de::Error::invalid_value(
                de::Unexpected::Str(&word),
                &"a list of keys or \"any\"",
            )),
        }
    }
}

/// Optional duration. On the wire this is milliseconds, and any value
/// `<= 0` (or `null`) means no limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timing {
    #[default]
    Unbounded,
    After(Duration),
}

impl Timing {
    pub fn from_millis(ms: i64) -> Self {
        if ms > 0 {
            Timing::After(Duration::from_millis(ms as u64))
        } else {
            Timing::Unbounded
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            Timing::Unbounded => None,
            Timing::After(d) if d.is_zero() => None,
            Timing::After(d) => Some(*d),
        }
    }
}

impl Serialize for Timing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.duration() {
            Some(d) => serializer.serialize_u64(d.as_millis() as u64),
            None => serializer.serialize_i64(NO_RESPONSE),
        }
    }
}

impl<'de> Deserialize<'de> for Timing {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<f64>::deserialize(deserializer)? {
            Some(ms) if ms > 0.0 && ms.is_finite() && ms.fract() == 0.0 => {
                Timing::After(Duration::from_millis(ms as u64))
            }
            Some(ms) if ms > 0.0 && ms.is_finite() => {
                Timing::After(Duration::from_secs_f64(ms / 1000.0))
            }
            _ => Timing::Unbounded,
        })
    }
}

/// What the response source reports for a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseInfo {
    pub key: Key,
    pub rt: Duration,
}

/// Fully resolved parameters for one trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialSpec {
    pub stimulus: StimulusContent,
    pub choices: KeyChoice,
    pub continue_after_response: bool,
    pub stimulus_duration: Timing,
    pub response_deadline: Timing,
    pub prompt: String,
    pub metadata: Map<String, Value>,
}

impl TrialSpec {
    pub fn new(stimulus: StimulusContent) -> Self {
        Self {
            stimulus,
            choices: KeyChoice::Any,
            continue_after_response: true,
            stimulus_duration: Timing::Unbounded,
            response_deadline: Timing::Unbounded,
            prompt: String::new(),
            metadata: Map::new(),
        }
    }
}

/// Data written for a finished trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult {
    pub rt: Option<Duration>,
    pub stimulus: String,
    pub key_press: Option<Key>,
    pub metadata: Map<String, Value>,
}

impl TrialResult {
    pub fn new(spec: &TrialSpec, response: Option<ResponseInfo>) -> Self {
        let (rt, key_press) = match response {
            Some(info) => (Some(info.rt), Some(info.key)),
            None => (None, None),
        };
        Self {
            rt,
            stimulus: spec.stimulus.source().to_owned(),
            key_press,
            metadata: spec.metadata.clone(),
        }
    }

    /// Reaction time in whole milliseconds, or [`NO_RESPONSE`].
    pub fn rt_millis(&self) -> i64 {
        self.rt.map_or(NO_RESPONSE, |rt| rt.as_millis() as i64)
    }

    /// Flat record: built-in fields first, then metadata, so metadata keys
    /// replace built-ins of the same name.
    pub fn to_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("rt".into(), Value::from(self.rt_millis()));
        record.insert("stimulus".into(), Value::from(self.stimulus.clone()));
        record.insert(
            "key_press".into(),
            match &self.key_press {
                Some(key) => Value::from(key.as_str()),
                None => Value::from(NO_RESPONSE),
            },
        );
        for (k, v) in &self.metadata {
            record.insert(k.clone(), v.clone());
        }
        record
    }
}

impl Serialize for TrialResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}
