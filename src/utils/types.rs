use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, PartialEq, Debug)]
pub enum AppView {
    Chat,
    Simulation,
    History(String),
    Settings,
}

impl AppView {
    pub fn name(&self) -> &'static str {
        match self {
            AppView::Chat => "Chat",
            AppView::Simulation => "Simulation",
            AppView::History(_) => "History",
            AppView::Settings => "Settings",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Distinguishes the two parallel assistant replies to one user turn.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum OutputNumber {
    First,
    Second,
}

impl OutputNumber {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(OutputNumber::First),
            2 => Some(OutputNumber::Second),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            OutputNumber::First => 1,
            OutputNumber::Second => 2,
        }
    }

    pub fn sibling(self) -> Self {
        match self {
            OutputNumber::First => OutputNumber::Second,
            OutputNumber::Second => OutputNumber::First,
        }
    }
}

/// The backend hands out ids as either JSON strings or integers.
pub(crate) fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

pub(crate) fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    de_opt_id(deserializer)?.ok_or_else(|| serde::de::Error::custom("missing id"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_number_sibling() {
        assert_eq!(OutputNumber::First.sibling(), OutputNumber::Second);
        assert_eq!(OutputNumber::Second.sibling(), OutputNumber::First);
        assert_eq!(OutputNumber::from_u8(3), None);
        assert_eq!(OutputNumber::from_u8(2).map(OutputNumber::as_u8), Some(2));
    }

    #[test]
    fn test_ids_accept_numbers_and_strings() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(default, deserialize_with = "de_opt_id")]
            chat_id: Option<String>,
        }

        let numeric: Probe = serde_json::from_str(r#"{"chat_id": 42}"#).unwrap();
        assert_eq!(numeric.chat_id.as_deref(), Some("42"));

        let text: Probe = serde_json::from_str(r#"{"chat_id": "a1b2"}"#).unwrap();
        assert_eq!(text.chat_id.as_deref(), Some("a1b2"));

        let null: Probe = serde_json::from_str(r#"{"chat_id": null}"#).unwrap();
        assert_eq!(null.chat_id, None);

        let missing: Probe = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.chat_id, None);
    }
}
