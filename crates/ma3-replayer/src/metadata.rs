//! Format-independent metadata view
//!
//! Front ends list songs of both formats side by side; [`MetadataFields`]
//! gives them one accessor set over [`SongInfo`] and [`Song`].

use crate::song::{Song, SongInfo};

/// Unified song metadata accessors
pub trait MetadataFields {
    /// Song title
    fn title(&self) -> &str;

    /// Author or artist
    fn author(&self) -> &str;

    /// Copyright notice; empty when absent
    fn copyright(&self) -> &str {
        ""
    }

    /// Free-text comments; empty when absent
    fn comments(&self) -> &str {
        ""
    }

    /// Container name, e.g. "MLD" or "SMAF"
    fn format(&self) -> &str;

    /// Song length in seconds (to the loop end for looping songs)
    fn duration_seconds(&self) -> f64;

    /// Loop start in seconds, if the song loops
    fn loop_seconds(&self) -> Option<f64> {
        None
    }

    /// Human-readable `m:ss` length
    fn duration_label(&self) -> String {
        let total = self.duration_seconds().max(0.0).round() as u64;
        format!("{}:{:02}", total / 60, total % 60)
    }
}

impl MetadataFields for SongInfo {
    fn title(&self) -> &str {
        &self.title
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn copyright(&self) -> &str {
        &self.copyright
    }

    fn comments(&self) -> &str {
        &self.comments
    }

    // SongInfo alone does not know its container
    fn format(&self) -> &str {
        ""
    }

    fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    fn loop_seconds(&self) -> Option<f64> {
        self.loop_seconds
    }
}

impl MetadataFields for Song {
    fn title(&self) -> &str {
        &self.info.title
    }

    fn author(&self) -> &str {
        &self.info.author
    }

    fn copyright(&self) -> &str {
        &self.info.copyright
    }

    fn comments(&self) -> &str {
        &self.info.comments
    }

    fn format(&self) -> &str {
        self.format.name()
    }

    fn duration_seconds(&self) -> f64 {
        self.info.duration_seconds
    }

    fn loop_seconds(&self) -> Option<f64> {
        self.info.loop_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_label() {
        let info = SongInfo {
            title: "Ring".into(),
            duration_seconds: 83.4,
            ..Default::default()
        };
        assert_eq!(info.title(), "Ring");
        assert_eq!(info.duration_label(), "1:23");
        assert_eq!(info.loop_seconds(), None);
    }
}
