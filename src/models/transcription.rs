use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AutosubError, Result};

/// A timestamped unit of spoken text.
///
/// Offsets are measured from the start of the media. Values are replaced,
/// never mutated: the translation step produces new records through
/// [`Transcription::with_text`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedTranscription")]
pub struct Transcription {
    #[serde(default)]
    pub speaker: Option<String>,
    pub text: String,
    #[serde(with = "time_of_day")]
    pub time_start: Duration,
    #[serde(with = "time_of_day")]
    pub time_end: Duration,
}

/// Wire form of [`Transcription`], validated on conversion
#[derive(Deserialize)]
struct UncheckedTranscription {
    #[serde(default)]
    speaker: Option<String>,
    text: String,
    #[serde(with = "time_of_day")]
    time_start: Duration,
    #[serde(with = "time_of_day")]
    time_end: Duration,
}

impl TryFrom<UncheckedTranscription> for Transcription {
    type Error = AutosubError;

    fn try_from(raw: UncheckedTranscription) -> Result<Self> {
        Self::new(raw.speaker, raw.text, raw.time_start, raw.time_end)
    }
}

impl Transcription {
    pub fn new(
        speaker: Option<String>,
        text: impl Into<String>,
        time_start: Duration,
        time_end: Duration,
    ) -> Result<Self> {
        let transcription = Self {
            speaker,
            text: text.into(),
            time_start,
            time_end,
        };
        transcription.validate()?;
        Ok(transcription)
    }

    pub fn validate(&self) -> Result<()> {
        if self.time_end < self.time_start {
            return Err(AutosubError::Validation(format!(
                "Transcription '{}' ends ({:?}) before it starts ({:?})",
                self.text, self.time_end, self.time_start
            )));
        }
        Ok(())
    }

    /// Copy with the text replaced, timestamps and speaker preserved.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            speaker: self.speaker.clone(),
            text: text.into(),
            time_start: self.time_start,
            time_end: self.time_end,
        }
    }
}

/// Serializes offsets as a time of day, `HH:MM:SS[.ffffff]`.
///
/// The fractional part is written only when non-zero, and only to
/// microsecond precision.
pub mod time_of_day {
    use std::time::Duration;

    use chrono::{NaiveTime, Timelike};
    use serde::{Deserialize, Deserializer, Serializer, de, ser};

    const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

    pub fn format(duration: &Duration) -> Option<String> {
        let seconds = duration.as_secs();
        if seconds >= SECONDS_PER_DAY {
            return None;
        }
        let micros = duration.subsec_micros();
        let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds as u32, micros * 1_000)?;
        let mut formatted = time.format("%H:%M:%S").to_string();
        if micros != 0 {
            formatted.push_str(&format!(".{:06}", micros));
        }
        Some(formatted)
    }

    pub fn parse(value: &str) -> Option<Duration> {
        let time = value.trim().parse::<NaiveTime>().ok()?;
        let nanos = time.nanosecond().min(999_999_999);
        Some(Duration::new(time.num_seconds_from_midnight() as u64, nanos))
    }

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted = format(duration)
            .ok_or_else(|| ser::Error::custom(format!("offset {:?} does not fit in a day", duration)))?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid time of day '{}'", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_of_day_format() {
        assert_eq!(time_of_day::format(&Duration::from_secs(0)).unwrap(), "00:00:00");
        assert_eq!(time_of_day::format(&Duration::from_millis(65_123)).unwrap(), "00:01:05.123000");
        assert_eq!(time_of_day::format(&Duration::from_millis(3_661_500)).unwrap(), "01:01:01.500000");
        assert!(time_of_day::format(&Duration::from_secs(90_000)).is_none());
    }

    #[test]
    fn test_time_of_day_parse() {
        assert_eq!(time_of_day::parse("00:01:05.123000"), Some(Duration::from_millis(65_123)));
        assert_eq!(time_of_day::parse("01:01:01"), Some(Duration::from_secs(3661)));
        assert_eq!(time_of_day::parse("nonsense"), None);
    }

    #[test]
    fn test_json_round_trip_keeps_offsets() {
        let original = Transcription::new(
            Some("narrator".to_string()),
            "こんにちは",
            Duration::from_micros(1_234_567),
            Duration::from_micros(3_000_001),
        )
        .unwrap();

        let json = serde_json::to_string(&original).unwrap();
        assert!(json.contains("\"time_start\":\"00:00:01.234567\""));
        let parsed: Transcription = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_missing_speaker_defaults_to_none() {
        let parsed: Transcription =
            serde_json::from_str(r#"{"text":"hi","time_start":"00:00:01","time_end":"00:00:02.5"}"#).unwrap();
        assert_eq!(parsed.speaker, None);
        assert_eq!(parsed.time_end, Duration::from_millis(2500));
    }

    #[test]
    fn test_end_before_start_rejected() {
        let result = Transcription::new(None, "x", Duration::from_secs(2), Duration::from_secs(1));
        assert!(matches!(result, Err(AutosubError::Validation(_))));
    }

    #[test]
    fn test_deserialize_rejects_end_before_start() {
        let result: std::result::Result<Transcription, _> =
            serde_json::from_str(r#"{"text":"x","time_start":"00:00:02","time_end":"00:00:01"}"#);
        assert!(result.unwrap_err().to_string().contains("ends"));
    }

    #[test]
    fn test_with_text_preserves_timestamps() {
        let original = Transcription::new(None, "a", Duration::from_secs(1), Duration::from_secs(2)).unwrap();
        let replaced = original.with_text("b");
        assert_eq!(replaced.text, "b");
        assert_eq!(replaced.time_start, original.time_start);
        assert_eq!(replaced.time_end, original.time_end);
        assert_eq!(original.text, "a");
    }
}
