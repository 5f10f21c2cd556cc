use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use stimkit_core::{KeyChoice, StimulusContent, Timing, TrialSpec};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`{field}` has {found} per-trial values but there are {expected} stimuli")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("invalid batch configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Computes a parameter for the trial at the given index.
pub type Producer<T> = Arc<dyn Fn(usize) -> T + Send + Sync>;

/// A batch parameter: one value for every trial, one value per trial, or a
/// producer evaluated once per trial while the specs are built.
#[derive(Clone)]
pub enum Param<T> {
    Shared(T),
    PerTrial(Vec<T>),
    Deferred(Producer<T>),
}

impl<T> Param<T> {
    pub fn deferred(producer: impl Fn(usize) -> T + Send + Sync + 'static) -> Self {
        Param::Deferred(Arc::new(producer))
    }

    fn check_len(&self, field: &'static str, expected: usize) -> Result<(), ConfigError> {
        match self {
            Param::PerTrial(values) if values.len() != expected => {
                Err(ConfigError::LengthMismatch {
                    field,
                    expected,
                    found: values.len(),
                })
            }
            _ => Ok(()),
        }
    }
}

impl<T: Clone> Param<T> {
    fn resolve(&self, field: &'static str, index: usize, count: usize) -> Result<T, ConfigError> {
        match self {
            Param::Shared(value) => Ok(value.clone()),
            Param::PerTrial(values) => {
                values
                    .get(index)
                    .cloned()
                    .ok_or(ConfigError::LengthMismatch {
                        field,
                        expected: count,
                        found: values.len(),
                    })
            }
            Param::Deferred(producer) => Ok(producer(index)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Param<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Shared(value) => f.debug_tuple("Shared").field(value).finish(),
            Param::PerTrial(values) => f.debug_tuple("PerTrial").field(values).finish(),
            Param::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl<T> From<T> for Param<T> {
    fn from(value: T) -> Self {
        Param::Shared(value)
    }
}

// A JSON array is read as one value per trial; anything else is shared.
#[derive(Deserialize)]
#[serde(untagged)]
enum ParamRepr<T> {
    PerTrial(Vec<T>),
    Shared(T),
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Param<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match ParamRepr::deserialize(deserializer)? {
            ParamRepr::PerTrial(values) => Param::PerTrial(values),
            ParamRepr::Shared(value) => Param::Shared(value),
        })
    }
}

// `[]` is an empty key list, which accepts any key, not zero per-trial values.
fn deserialize_choices<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Param<KeyChoice>>, D::Error> {
    Ok(
        Option::<Param<KeyChoice>>::deserialize(deserializer)?.map(|param| match param {
            Param::PerTrial(values) if values.is_empty() => Param::Shared(KeyChoice::Any),
            param => param,
        }),
    )
}

/// Settings for a block of single-stimulus trials.
///
/// Every field except `stimuli` is optional; see [`build_trial_specs`] for
/// the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    pub stimuli: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_choices")]
    pub choices: Option<Param<KeyChoice>>,
    #[serde(default)]
    pub continue_after_response: Option<Param<bool>>,
    #[serde(default)]
    pub timing_stim: Option<Param<Timing>>,
    #[serde(default)]
    pub timing_response: Option<Param<Timing>>,
    #[serde(default)]
    pub is_html: Option<Param<bool>>,
    #[serde(default)]
    pub prompt: Option<Param<String>>,
    #[serde(default)]
    pub data: Option<Param<Map<String, Value>>>,
}

impl BatchConfig {
    pub fn new<I, S>(stimuli: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stimuli: stimuli.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn choices(mut self, choices: impl Into<Param<KeyChoice>>) -> Self {
        self.choices = Some(choices.into());
        self
    }

    pub fn continue_after_response(mut self, value: impl Into<Param<bool>>) -> Self {
        self.continue_after_response = Some(value.into());
        self
    }

    pub fn timing_stim(mut self, timing: impl Into<Param<Timing>>) -> Self {
        self.timing_stim = Some(timing.into());
        self
    }

    pub fn timing_response(mut self, timing: impl Into<Param<Timing>>) -> Self {
        self.timing_response = Some(timing.into());
        self
    }

    pub fn is_html(mut self, value: impl Into<Param<bool>>) -> Self {
        self.is_html = Some(value.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<Param<String>>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn data(mut self, data: impl Into<Param<Map<String, Value>>>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn build(&self) -> Result<Vec<TrialSpec>, ConfigError> {
        build_trial_specs(self)
    }
}

fn check_len<T>(
    param: &Option<Param<T>>,
    field: &'static str,
    count: usize,
) -> Result<(), ConfigError> {
    match param {
        Some(param) => param.check_len(field, count).inspect_err(|err| {
            debug!(field, %err, "rejected batch configuration");
        }),
        None => Ok(()),
    }
}

fn resolve_or<T: Clone>(
    param: &Option<Param<T>>,
    field: &'static str,
    index: usize,
    count: usize,
    default: impl FnOnce() -> T,
) -> Result<T, ConfigError> {
    match param {
        Some(param) => param.resolve(field, index, count),
        None => Ok(default()),
    }
}

/// Expands a batch into one spec per stimulus, in order.
///
/// Defaults: any key, response ends the trial, no stimulus or response time
/// limit, image content, empty prompt, no extra data. A per-trial list whose
/// length differs from the number of stimuli is rejected before any deferred
/// producer runs.
pub fn build_trial_specs(config: &BatchConfig) -> Result<Vec<TrialSpec>, ConfigError> {
    let count = config.stimuli.len();
    check_len(&config.choices, "choices", count)?;
    check_len(&config.continue_after_response, "continue_after_response", count)?;
    check_len(&config.timing_stim, "timing_stim", count)?;
    check_len(&config.timing_response, "timing_response", count)?;
    check_len(&config.is_html, "is_html", count)?;
    check_len(&config.prompt, "prompt", count)?;
    check_len(&config.data, "data", count)?;

    let specs = config
        .stimuli
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let is_html = resolve_or(&config.is_html, "is_html", i, count, || false)?;
            Ok(TrialSpec {
                stimulus: StimulusContent::new(source.clone(), is_html),
                choices: resolve_or(&config.choices, "choices", i, count, KeyChoice::default)?,
                continue_after_response: resolve_or(
                    &config.continue_after_response,
                    "continue_after_response",
                    i,
                    count,
                    || true,
                )?,
                stimulus_duration: resolve_or(
                    &config.timing_stim,
                    "timing_stim",
                    i,
                    count,
                    Timing::default,
                )?,
                response_deadline: resolve_or(
                    &config.timing_response,
                    "timing_response",
                    i,
                    count,
                    Timing::default,
                )?,
                prompt: resolve_or(&config.prompt, "prompt", i, count, String::new)?,
                metadata: resolve_or(&config.data, "data", i, count, Map::new)?,
            })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    debug!(trials = specs.len(), "built trial specs");
    Ok(specs)
}
