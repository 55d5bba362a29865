//! Notable-moment flags raised out-of-band from scoring

use serde::{Deserialize, Serialize};

/// Direction of a notable moment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    /// Exceptionally weak or concerning
    Red,
    /// Exceptionally strong
    Green,
}

/// Out-of-band annotation marking a turn as exceptionally strong or weak
///
/// At most one flag is produced per turn. Immutable after creation except
/// for attaching an audio clip reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flag {
    /// Index of the turn this flag refers to
    pub turn_index: usize,
    /// Red or green
    pub kind: FlagKind,
    /// Short category, e.g. "communication", "depth"
    pub category: String,
    /// What stood out
    pub description: String,
    /// Supporting quote from the answer, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    /// Reference to a stored audio clip of the moment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_ref: Option<String>,
}

impl Flag {
    pub fn new(
        turn_index: usize,
        kind: FlagKind,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            turn_index,
            kind,
            category: category.into(),
            description: description.into(),
            quote: None,
            clip_ref: None,
        }
    }

    pub fn with_quote(mut self, quote: impl Into<String>) -> Self {
        self.quote = Some(quote.into());
        self
    }

    /// Attach an audio clip reference after the fact
    pub fn attach_clip(&mut self, clip_ref: impl Into<String>) {
        self.clip_ref = Some(clip_ref.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_builder() {
        let mut flag = Flag::new(3, FlagKind::Green, "depth", "unusually concrete metrics")
            .with_quote("we cut p99 latency from 900ms to 120ms");
        assert!(flag.clip_ref.is_none());
        flag.attach_clip("clips/3.wav");
        assert_eq!(flag.clip_ref.as_deref(), Some("clips/3.wav"));
    }
}
