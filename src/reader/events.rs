//! Parse Event Types
//!
//! Owned events handed from the event source to the branch collector.
//! Everything is copied out of the read buffer, so an event never pins the
//! bytes it came from.

/// Structural XML parse event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    /// Start of an element: <name attrs...> (also emitted for <name/>)
    ElementStart {
        name: String,
        attributes: Vec<(String, String)>,
    },
    /// Character data; one element's text may arrive in several chunks
    Text(String),
    /// End of an element: </name> (also emitted right after <name/>)
    ElementEnd { name: String },
}

impl ParseEvent {
    /// Start event without attributes
    pub fn start(name: impl Into<String>) -> Self {
        ParseEvent::ElementStart {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Start event with attributes
    pub fn start_with<N, V>(name: impl Into<String>, attributes: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        ParseEvent::ElementStart {
            name: name.into(),
            attributes: attributes
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        ParseEvent::Text(content.into())
    }

    pub fn end(name: impl Into<String>) -> Self {
        ParseEvent::ElementEnd { name: name.into() }
    }

    /// Element name for start and end events
    pub fn name(&self) -> Option<&str> {
        match self {
            ParseEvent::ElementStart { name, .. } | ParseEvent::ElementEnd { name } => Some(name),
            ParseEvent::Text(_) => None,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, ParseEvent::ElementStart { .. })
    }

    pub fn is_end(&self) -> bool {
        matches!(self, ParseEvent::ElementEnd { .. })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParseEvent::Text(t) => Some(t),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let start = ParseEvent::start_with("item", [("id", "7")]);
        assert!(start.is_start());
        assert_eq!(start.name(), Some("item"));
        if let ParseEvent::ElementStart { attributes, .. } = &start {
            assert_eq!(attributes, &vec![("id".to_string(), "7".to_string())]);
        }

        assert_eq!(ParseEvent::text("x").as_text(), Some("x"));
        assert!(ParseEvent::end("item").is_end());
        assert_eq!(ParseEvent::text("x").name(), None);
    }
}
