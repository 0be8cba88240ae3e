//! Invalidation channels and channel sets

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A category of change that views can subscribe to
///
/// Channels are fixed for the lifetime of the process. Firing a channel never
/// carries a payload; interested parties re-read whatever they need from the
/// session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Selected faction changed
    Faction,
    /// Selected entity changed
    Entity,
    /// Slot data was rebuilt for a new sub-item
    SlotContent,
    /// Selected slot changed
    Slot,
    /// A single slot's content or staged change was mutated
    SlotMutated,
    /// Visual overlays need to refresh
    Appearance,
    /// Attribute values or staged training changed
    Training,
    /// Conversion candidates or their staged amounts changed
    Conversion,
    /// Population counts changed
    Population,
}

impl Channel {
    /// Channel name used in configuration and logs
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Faction => "faction",
            Channel::Entity => "entity",
            Channel::SlotContent => "slot_content",
            Channel::Slot => "slot",
            Channel::SlotMutated => "slot_mutated",
            Channel::Appearance => "appearance",
            Channel::Training => "training",
            Channel::Conversion => "conversion",
            Channel::Population => "population",
        }
    }

    /// Parse a channel from its name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.name() == name)
    }

    /// Every channel, in declaration order
    pub fn all() -> &'static [Self] {
        &[
            Channel::Faction,
            Channel::Entity,
            Channel::SlotContent,
            Channel::Slot,
            Channel::SlotMutated,
            Channel::Appearance,
            Channel::Training,
            Channel::Conversion,
            Channel::Population,
        ]
    }

    /// The single-bit set for this channel
    pub fn flag(&self) -> ChannelSet {
        match self {
            Channel::Faction => ChannelSet::FACTION,
            Channel::Entity => ChannelSet::ENTITY,
            Channel::SlotContent => ChannelSet::SLOT_CONTENT,
            Channel::Slot => ChannelSet::SLOT,
            Channel::SlotMutated => ChannelSet::SLOT_MUTATED,
            Channel::Appearance => ChannelSet::APPEARANCE,
            Channel::Training => ChannelSet::TRAINING,
            Channel::Conversion => ChannelSet::CONVERSION,
            Channel::Population => ChannelSet::POPULATION,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Channel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Channel::from_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown channel: {name}")))
    }
}

bitflags! {
    /// A set of channels
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChannelSet: u16 {
        const FACTION = 1 << 0;
        const ENTITY = 1 << 1;
        const SLOT_CONTENT = 1 << 2;
        const SLOT = 1 << 3;
        const SLOT_MUTATED = 1 << 4;
        const APPEARANCE = 1 << 5;
        const TRAINING = 1 << 6;
        const CONVERSION = 1 << 7;
        const POPULATION = 1 << 8;
    }
}

impl ChannelSet {
    /// Whether the set contains `channel`
    pub fn has(&self, channel: Channel) -> bool {
        self.contains(channel.flag())
    }

    /// Channels in this set, in declaration order
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        Channel::all().iter().copied().filter(|c| self.has(*c))
    }
}

impl FromIterator<Channel> for ChannelSet {
    fn from_iter<I: IntoIterator<Item = Channel>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ChannelSet::empty(), |set, c| set | c.flag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_roundtrip() {
        for channel in Channel::all() {
            assert_eq!(Channel::from_name(channel.name()), Some(*channel));
        }
        assert_eq!(Channel::from_name("nope"), None);
    }

    #[test]
    fn test_flags_are_distinct() {
        let all: ChannelSet = Channel::all().iter().copied().collect();
        assert_eq!(all, ChannelSet::all());
        assert_eq!(all.bits().count_ones() as usize, Channel::all().len());
    }

    #[test]
    fn test_channel_set_iteration() {
        let set: ChannelSet = [Channel::Population, Channel::Faction].into_iter().collect();
        let channels: Vec<_> = set.channels().collect();
        assert_eq!(channels, vec![Channel::Faction, Channel::Population]);
        assert!(set.has(Channel::Faction));
        assert!(!set.has(Channel::Slot));
    }

    #[test]
    fn test_serde_by_name() {
        let json = serde_json::to_string(&Channel::SlotMutated).unwrap();
        assert_eq!(json, "\"slot_mutated\"");

        let parsed: Channel = serde_json::from_str("\"conversion\"").unwrap();
        assert_eq!(parsed, Channel::Conversion);

        assert!(serde_json::from_str::<Channel>("\"bogus\"").is_err());
    }
}
