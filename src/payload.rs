//! Message payloads carried by communications.

/// Opaque payload moved from sender to receiver when a communication
/// finishes.
///
/// The simulated transfer time depends only on the declared size given
/// to `put`, never on the payload contents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum MessagePayload {
    /// Raw bytes.
    Data(Vec<u8>),
    /// Human-readable text (convenient for examples and tests).
    Text(String),
    /// Empty payload (acks, pings).
    #[default]
    Empty,
}

impl MessagePayload {
    /// Borrow the text of a `Text` payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessagePayload::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MessagePayload {
    fn from(s: &str) -> Self {
        MessagePayload::Text(s.to_string())
    }
}

impl From<Vec<u8>> for MessagePayload {
    fn from(bytes: Vec<u8>) -> Self {
        MessagePayload::Data(bytes)
    }
}

impl std::fmt::Display for MessagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessagePayload::Data(d) => write!(f, "Data({} bytes)", d.len()),
            MessagePayload::Text(s) => {
                if s.chars().count() > 32 {
                    let head: String = s.chars().take(32).collect();
                    write!(f, "Text(\"{}…\")", head)
                } else {
                    write!(f, "Text({:?})", s)
                }
            }
            MessagePayload::Empty => write!(f, "Empty"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_truncates_long_text() {
        let p = MessagePayload::Text("x".repeat(40));
        assert!(p.to_string().ends_with("…\")"));
        assert_eq!(MessagePayload::from("hi").to_string(), "Text(\"hi\")");
    }

    #[test]
    fn test_as_text() {
        assert_eq!(MessagePayload::from("ok").as_text(), Some("ok"));
        assert_eq!(MessagePayload::Data(vec![1]).as_text(), None);
    }
}
