use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Anything the engine can score. Only `text` is required; length defaults
/// to the character count and the repetition flag to `false`.
pub trait ScoredMessage {
    fn text(&self) -> &str;

    fn length_chars(&self) -> i64 {
        self.text().chars().count() as i64
    }

    fn is_repetitive(&self) -> bool {
        false
    }
}

impl ScoredMessage for str {
    fn text(&self) -> &str {
        self
    }
}

impl ScoredMessage for String {
    fn text(&self) -> &str {
        self.as_str()
    }
}

impl<M: ScoredMessage + ?Sized> ScoredMessage for &M {
    fn text(&self) -> &str {
        (**self).text()
    }

    fn length_chars(&self) -> i64 {
        (**self).length_chars()
    }

    fn is_repetitive(&self) -> bool {
        (**self).is_repetitive()
    }
}

impl ScoredMessage for kindle_types::models::Message {
    fn text(&self) -> &str {
        &self.text
    }

    fn length_chars(&self) -> i64 {
        self.length_chars
    }

    fn is_repetitive(&self) -> bool {
        self.is_repetitive
    }
}

/// Loosely-typed message record, as handed over by callers that build
/// snapshots from JSON. Malformed fields degrade to neutral values instead
/// of failing: a non-numeric or negative length reads as 0 and a missing
/// or non-boolean flag reads as `false`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageSample {
    #[serde(default)]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_length")]
    pub length_chars: i64,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_repetitive: bool,
}

impl MessageSample {
    pub fn new(length_chars: i64, is_repetitive: bool) -> Self {
        Self {
            text: String::new(),
            length_chars,
            is_repetitive,
        }
    }
}

impl ScoredMessage for MessageSample {
    fn text(&self) -> &str {
        &self.text
    }

    fn length_chars(&self) -> i64 {
        self.length_chars
    }

    fn is_repetitive(&self) -> bool {
        self.is_repetitive
    }
}

fn lenient_length<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let length = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f as i64)
            .unwrap_or(0),
        _ => 0,
    };
    Ok(length.max(0))
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(matches!(value, Value::Bool(true)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_length_counts_chars_not_bytes() {
        let text = "café ☕";
        assert_eq!(text.length_chars(), 6);
    }

    #[test]
    fn sample_parses_well_formed_record() {
        let sample: MessageSample =
            serde_json::from_str(r#"{"text":"hi","length_chars":42,"is_repetitive":true}"#).unwrap();
        assert_eq!(sample.length_chars, 42);
        assert!(sample.is_repetitive);
    }

    #[test]
    fn sample_tolerates_malformed_fields() {
        let cases = [
            r#"{"length_chars":"lots"}"#,
            r#"{"length_chars":-12}"#,
            r#"{"length_chars":null}"#,
            r#"{"length_chars":[1,2]}"#,
            r#"{}"#,
        ];
        for json in cases {
            let sample: MessageSample = serde_json::from_str(json).unwrap();
            assert_eq!(sample.length_chars, 0, "{json}");
            assert!(!sample.is_repetitive, "{json}");
        }
    }

    #[test]
    fn sample_accepts_numeric_strings_and_floats() {
        let sample: MessageSample =
            serde_json::from_str(r#"{"length_chars":"37","is_repetitive":"yes"}"#).unwrap();
        assert_eq!(sample.length_chars, 37);
        assert!(!sample.is_repetitive);

        let sample: MessageSample = serde_json::from_str(r#"{"length_chars":55.9}"#).unwrap();
        assert_eq!(sample.length_chars, 55);
    }
}
