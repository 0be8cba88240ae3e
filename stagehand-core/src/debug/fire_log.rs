//! Channel fire logging with pattern-based filtering and in-memory storage
//!
//! Every fire on the bus, including fires on disabled channels, can be
//! recorded into a ring buffer for diagnostics. Channels are filtered by
//! name using glob patterns.
//!
//! # Example
//!
//! ```
//! use stagehand_core::debug::{FireLog, FireLogConfig};
//! use stagehand_core::Channel;
//!
//! let mut log = FireLog::new(FireLogConfig::default());
//! log.record(Channel::Faction, true, 3);
//! log.record(Channel::Appearance, false, 0);
//!
//! let newest = log.recent(1).next().unwrap();
//! assert_eq!(newest.channel, Channel::Appearance);
//! assert!(!newest.delivered);
//! ```

use crate::channel::Channel;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Instant;

/// Configuration for the fire log.
///
/// Patterns support:
/// - `*` matches any sequence of characters
/// - `?` matches any single character
/// - Literal text matches exactly
///
/// Patterns are matched against [`Channel::name`], e.g. `slot*` matches
/// `slot`, `slot_content` and `slot_mutated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireLogConfig {
    /// Whether the bus keeps an in-memory log at all
    pub enabled: bool,
    /// Maximum number of entries to keep
    pub capacity: usize,
    /// If non-empty, only log channels matching these patterns
    pub include: Vec<String>,
    /// Exclude channels matching these patterns (applied after include)
    pub exclude: Vec<String>,
}

impl Default for FireLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: 100,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl FireLogConfig {
    /// An enabled log with the given capacity and no filtering
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            enabled: true,
            capacity,
            ..Default::default()
        }
    }

    /// Create a config from comma-separated pattern strings
    ///
    /// ```
    /// use stagehand_core::debug::FireLogConfig;
    ///
    /// let config = FireLogConfig::from_patterns(Some("slot*,faction"), Some("slot"));
    /// assert!(config.should_log("slot_mutated"));
    /// assert!(config.should_log("faction"));
    /// assert!(!config.should_log("slot"));
    /// assert!(!config.should_log("population"));
    /// ```
    pub fn from_patterns(include: Option<&str>, exclude: Option<&str>) -> Self {
        let split = |s: &str| -> Vec<String> {
            s.split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        };

        Self {
            enabled: true,
            include: include.map(split).unwrap_or_default(),
            exclude: exclude.map(split).unwrap_or_default(),
            ..Default::default()
        }
    }

    /// Check if a channel name should be logged based on include/exclude patterns
    pub fn should_log(&self, channel_name: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|p| glob_match(p, channel_name))
        {
            return false;
        }

        !self.exclude.iter().any(|p| glob_match(p, channel_name))
    }
}

/// An entry in the fire log
#[derive(Debug, Clone)]
pub struct FireRecord {
    /// The fired channel
    pub channel: Channel,
    /// Sequence number for ordering
    pub sequence: u64,
    /// False when the channel was disabled and nothing was invoked
    pub delivered: bool,
    /// Number of live listeners and handlers at fire time
    pub listeners: usize,
    /// When the fire happened
    pub timestamp: Instant,
}

impl FireRecord {
    /// Time since this fire was logged
    pub fn elapsed(&self) -> std::time::Duration {
        self.timestamp.elapsed()
    }

    /// Format the elapsed time for display (e.g., "2.3s", "150ms")
    pub fn elapsed_display(&self) -> String {
        let elapsed = self.elapsed();
        if elapsed.as_secs() >= 1 {
            format!("{:.1}s", elapsed.as_secs_f64())
        } else {
            format!("{}ms", elapsed.as_millis())
        }
    }
}

/// In-memory ring buffer of recent fires
#[derive(Debug, Clone)]
pub struct FireLog {
    entries: VecDeque<FireRecord>,
    config: FireLogConfig,
    next_sequence: u64,
}

impl Default for FireLog {
    fn default() -> Self {
        Self::new(FireLogConfig::with_capacity(100))
    }
}

impl FireLog {
    /// Create a new fire log with configuration
    pub fn new(config: FireLogConfig) -> Self {
        Self {
            entries: VecDeque::with_capacity(config.capacity),
            config,
            next_sequence: 0,
        }
    }

    /// Record a fire (if it passes the filter)
    ///
    /// Returns the entry if it was logged, None if filtered out.
    pub fn record(
        &mut self,
        channel: Channel,
        delivered: bool,
        listeners: usize,
    ) -> Option<&FireRecord> {
        if self.config.capacity == 0 || !self.config.should_log(channel.name()) {
            return None;
        }

        let entry = FireRecord {
            channel,
            sequence: self.next_sequence,
            delivered,
            listeners,
            timestamp: Instant::now(),
        };
        self.next_sequence += 1;

        if self.entries.len() >= self.config.capacity {
            self.entries.pop_front();
        }

        self.entries.push_back(entry);
        self.entries.back()
    }

    /// All entries (oldest first)
    pub fn entries(&self) -> impl Iterator<Item = &FireRecord> {
        self.entries.iter()
    }

    /// The most recent N entries (newest first)
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &FireRecord> {
        self.entries.iter().rev().take(count)
    }

    /// Channels in fire order (oldest first)
    pub fn channels(&self) -> Vec<Channel> {
        self.entries.iter().map(|e| e.channel).collect()
    }

    /// Number of entries currently stored
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Get configuration
    pub fn config(&self) -> &FireLogConfig {
        &self.config
    }
}

/// Simple glob pattern matching supporting `*` and `?`.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut pi = 0;
    let mut ti = 0;
    let mut star_pi = None;
    let mut star_ti = 0;

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star_pi = Some(pi);
            star_ti = ti;
            pi += 1;
        } else if let Some(spi) = star_pi {
            pi = spi + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }

    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }

    pi == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("slot", "slot"));
        assert!(!glob_match("slot", "slot_content"));
        assert!(glob_match("slot*", "slot_content"));
        assert!(glob_match("*ion", "conversion"));
        assert!(glob_match("s?ot", "slot"));
        assert!(!glob_match("s?ot", "sot"));
    }

    #[test]
    fn test_config_include_and_exclude() {
        let config = FireLogConfig::from_patterns(Some("slot*"), Some("slot_mutated"));
        assert!(config.should_log("slot"));
        assert!(config.should_log("slot_content"));
        assert!(!config.should_log("slot_mutated"));
        assert!(!config.should_log("faction"));
    }

    #[test]
    fn test_log_capacity() {
        let mut log = FireLog::new(FireLogConfig::with_capacity(2));
        log.record(Channel::Faction, true, 1);
        log.record(Channel::Entity, true, 1);
        log.record(Channel::Slot, true, 1);

        assert_eq!(log.len(), 2);
        assert_eq!(log.channels(), vec![Channel::Entity, Channel::Slot]);
        assert_eq!(log.entries().next().unwrap().sequence, 1);
    }

    #[test]
    fn test_log_filtering() {
        let mut log = FireLog::new(FireLogConfig::from_patterns(None, Some("appearance")));
        assert!(log.record(Channel::Appearance, true, 0).is_none());
        assert!(log.record(Channel::Training, true, 0).is_some());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_recent_is_newest_first() {
        let mut log = FireLog::default();
        log.record(Channel::Faction, true, 0);
        log.record(Channel::Population, false, 0);

        let recent: Vec<_> = log.recent(2).map(|r| r.channel).collect();
        assert_eq!(recent, vec![Channel::Population, Channel::Faction]);
        assert!(log.recent(1).next().unwrap().elapsed_display().ends_with('s'));
    }
}
