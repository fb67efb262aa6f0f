//! Dedup / forced-refresh layer.
//!
//! Owned by the event loop. For every response it decides whether the
//! scaled value reaches the publisher:
//!
//! - invalid responses are dropped and leave the channel state untouched,
//! - forced responses are always published,
//! - other responses are published only when the scaled value differs from
//!   the last published one.

use hakit_core::{ChannelId, Error, RawValue, Response, Result, ValueFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn default_scale() -> f64 {
    1.0
}

/// Static description of one channel of a driver instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Device channel the requests address.
    pub id: ChannelId,

    /// Output name handed to the publisher.
    pub name: String,

    /// Name of a per-channel trigger input, if any.
    #[serde(default)]
    pub trigger: Option<String>,

    /// Factor applied to the raw value before comparison and formatting.
    #[serde(default = "default_scale")]
    pub scale: f64,

    #[serde(default)]
    pub format: ValueFormat,
}

impl ChannelSpec {
    pub fn new(id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            trigger: None,
            scale: default_scale(),
            format: ValueFormat::Integer,
        }
    }

    pub fn with_trigger(mut self, input: impl Into<String>) -> Self {
        self.trigger = Some(input.into());
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_format(mut self, format: ValueFormat) -> Self {
        self.format = format;
        self
    }

    /// Scale a raw value, truncating toward zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use hakit_bridge::{ChannelId, ChannelSpec};
    ///
    /// let spec = ChannelSpec::new(ChannelId::new(0).unwrap(), "out0").with_scale(3300.0 / 1024.0);
    /// assert_eq!(spec.convert(1023), 3296);
    /// assert_eq!(spec.convert(-1), -3);
    /// ```
    pub fn convert(&self, raw: RawValue) -> i64 {
        // Float to int casts saturate, NaN becomes 0.
        (f64::from(raw) * self.scale).trunc() as i64
    }
}

/// Event-loop view of one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelState {
    /// Last scaled value handed to the publisher.
    pub last_published: Option<i64>,

    /// Forced requests issued and not answered yet.
    pub pending_force: u32,
}

/// A value that must be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication<'a> {
    pub channel: &'a str,
    pub value: String,
}

/// What the dedup layer did with a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<'a> {
    Published(Publication<'a>),
    /// Valid but unchanged, not forced.
    Suppressed,
    /// The read failed.
    Invalid,
    /// The response names a channel this driver does not have.
    Unknown,
}

#[derive(Debug)]
struct Slot {
    spec: ChannelSpec,
    state: ChannelState,
}

/// Per-channel specs and states, indexed by channel id.
#[derive(Debug)]
pub struct ChannelTable {
    slots: Vec<Option<Slot>>,
    order: Vec<ChannelId>,
}

impl ChannelTable {
    /// Build the table from the configured channels.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty list, or an invalid
    /// channel error for a repeated id or output name.
    pub fn new(specs: Vec<ChannelSpec>) -> Result<Self> {
        if specs.is_empty() {
            return Err(Error::configuration("no channels configured"));
        }

        let mut slots: Vec<Option<Slot>> = Vec::new();
        let mut order = Vec::with_capacity(specs.len());
        let mut names = HashSet::new();
        for spec in specs {
            let index = spec.id.index();
            if slots.len() <= index {
                slots.resize_with(index + 1, || None);
            }
            if slots[index].is_some() {
                return Err(Error::invalid_channel(spec.id, "configured twice"));
            }
            if !names.insert(spec.name.clone()) {
                return Err(Error::invalid_channel(
                    spec.id,
                    format!("output name '{}' already used", spec.name),
                ));
            }
            order.push(spec.id);
            slots[index] = Some(Slot {
                spec,
                state: ChannelState::default(),
            });
        }

        Ok(Self { slots, order })
    }

    /// Configured channel ids, in configuration order.
    pub fn ids(&self) -> &[ChannelId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Highest configured channel id.
    pub fn max_id(&self) -> Option<ChannelId> {
        self.order.iter().max().copied()
    }

    pub fn contains(&self, channel: ChannelId) -> bool {
        self.slot(channel).is_some()
    }

    pub fn spec(&self, channel: ChannelId) -> Option<&ChannelSpec> {
        self.slot(channel).map(|slot| &slot.spec)
    }

    pub fn specs(&self) -> impl Iterator<Item = &ChannelSpec> {
        self.order
            .iter()
            .filter_map(|id| self.slot(*id))
            .map(|slot| &slot.spec)
    }

    pub fn state(&self, channel: ChannelId) -> Option<&ChannelState> {
        self.slot(channel).map(|slot| &slot.state)
    }

    fn slot(&self, channel: ChannelId) -> Option<&Slot> {
        self.slots.get(channel.index()).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, channel: ChannelId) -> Option<&mut Slot> {
        self.slots.get_mut(channel.index()).and_then(Option::as_mut)
    }

    /// Record that a request for `channel` was enqueued.
    pub fn note_request(&mut self, channel: ChannelId, force: bool) {
        if force && let Some(slot) = self.slot_mut(channel) {
            slot.state.pending_force += 1;
        }
    }

    /// Undo [`note_request`](Self::note_request) for a request that never
    /// made it into the queue.
    pub fn cancel_request(&mut self, channel: ChannelId, force: bool) {
        if force && let Some(slot) = self.slot_mut(channel) {
            slot.state.pending_force = slot.state.pending_force.saturating_sub(1);
        }
    }

    /// Apply a response and decide whether to publish.
    pub fn apply(&mut self, response: Response) -> Outcome<'_> {
        let Some(slot) = self.slots.get_mut(response.channel.index()).and_then(Option::as_mut)
        else {
            return Outcome::Unknown;
        };

        if response.force {
            slot.state.pending_force = slot.state.pending_force.saturating_sub(1);
        }

        let Some(raw) = response.value else {
            return Outcome::Invalid;
        };

        let value = slot.spec.convert(raw);
        if !response.force && slot.state.last_published == Some(value) {
            return Outcome::Suppressed;
        }

        slot.state.last_published = Some(value);
        Outcome::Published(Publication {
            channel: &slot.spec.name,
            value: slot.spec.format.format(value),
        })
    }
}
