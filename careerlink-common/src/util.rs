use serde::{
    Deserialize, Deserializer,
    de::{Error, Unexpected},
};
use std::time::Duration;
use thiserror::Error;

/// A strictly positive duration. Deserialized from milliseconds.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        (!duration.is_zero()).then_some(Self(duration))
    }

    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        assert!(millis > 0, "Duration was not positive.");
        Self(Duration::from_millis(millis))
    }

    #[must_use]
    pub fn get(&self) -> Duration {
        self.0
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The duration is not positive: {0:?}")]
pub struct NonPositiveDurationError(Duration);

impl TryFrom<Duration> for PositiveDuration {
    type Error = NonPositiveDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveDurationError(value))
    }
}

impl<'de> Deserialize<'de> for PositiveDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        PositiveDuration::new(Duration::from_millis(millis))
            .ok_or_else(|| Error::invalid_value(Unexpected::Unsigned(millis), &"a positive number of milliseconds"))
    }
}
