//! Segment watcher configuration
//!
//! Lets a broker restrict which tiers and data sources it indexes. The
//! default watches everything.

use std::collections::HashSet;

/// Filters applied to segment events before they reach the timelines
#[derive(Debug, Clone, Default)]
pub struct SegmentWatcherConfig {
    /// Only index segments announced by servers in these tiers; `None` watches all
    pub watched_tiers: Option<HashSet<String>>,
    /// Only index segments of these data sources; `None` watches all
    pub watched_data_sources: Option<HashSet<String>>,
}

impl SegmentWatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict indexing to the given tiers.
    pub fn watch_tiers<I, S>(mut self, tiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.watched_tiers = Some(tiers.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict indexing to the given data sources.
    pub fn watch_data_sources<I, S>(mut self, data_sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.watched_data_sources = Some(data_sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn watches_tier(&self, tier: &str) -> bool {
        match &self.watched_tiers {
            Some(tiers) => tiers.contains(tier),
            None => true,
        }
    }

    pub fn watches_data_source(&self, data_source: &str) -> bool {
        match &self.watched_data_sources {
            Some(sources) => sources.contains(data_source),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_watches_everything() {
        let config = SegmentWatcherConfig::default();
        assert!(config.watches_tier("hot"));
        assert!(config.watches_data_source("events"));
    }

    #[test]
    fn test_filters() {
        let config = SegmentWatcherConfig::new()
            .watch_tiers(["hot"])
            .watch_data_sources(["events", "metrics"]);

        assert!(config.watches_tier("hot"));
        assert!(!config.watches_tier("cold"));
        assert!(config.watches_data_source("metrics"));
        assert!(!config.watches_data_source("logs"));
    }
}
