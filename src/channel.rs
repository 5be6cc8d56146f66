//! Channels and the registry that owns them.

use crate::modes;
use ircserv_tokens::{rpl, MessageBuffer};
use std::collections::{HashMap, HashSet};

/// Identifier of a client session, stable for the lifetime of its connection.
pub type ClientId = usize;

/// Modes applied to clients on a per-channel basis.
///
/// <https://tools.ietf.org/html/rfc2811.html#section-4.1>
#[derive(Clone, Copy, Debug, Default)]
pub struct MemberModes {
    pub operator: bool,
}

impl MemberModes {
    pub fn symbol(self) -> Option<char> {
        if self.operator {
            Some('@')
        } else {
            None
        }
    }
}

/// Channel data.
#[derive(Debug, Default)]
pub struct Channel {
    /// Set of channel members, identified by their session, and associated with their channel
    /// modes.  Operators are the members whose modes have `operator` set.
    pub members: HashMap<ClientId, MemberModes>,

    /// The topic, `None` when no topic is set.
    pub topic: Option<String>,

    /// Sessions allowed to join once while the channel is invite-only.
    pub invites: HashSet<ClientId>,

    pub user_limit: Option<usize>,
    pub key: Option<String>,

    // Modes: https://tools.ietf.org/html/rfc2811.html#section-4.2
    pub invite_only: bool,
    pub topic_restricted: bool,
}

impl Channel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member.  The first member is the creator of the channel, and is operator.
    pub fn add_member(&mut self, id: ClientId) {
        let modes = if self.members.is_empty() {
            MemberModes { operator: true }
        } else {
            MemberModes::default()
        };
        self.members.insert(id, modes);
        self.invites.remove(&id);
    }

    /// Removes a member.  Returns whether it was a member.
    pub fn remove_member(&mut self, id: ClientId) -> bool {
        self.members.remove(&id).is_some()
    }

    pub fn has_client(&self, id: ClientId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn is_operator(&self, id: ClientId) -> bool {
        self.members.get(&id).map_or(false, |m| m.operator)
    }

    pub fn add_invite(&mut self, id: ClientId) {
        self.invites.insert(id);
    }

    pub fn is_invited(&self, id: ClientId) -> bool {
        self.invites.contains(&id)
    }

    /// Whether the channel can take one more member.
    pub fn is_full(&self) -> bool {
        self.user_limit.map_or(false, |limit| limit <= self.members.len())
    }

    /// Whether `key` opens the channel.  Channels without a key accept anything.
    pub fn accepts_key(&self, key: &str) -> bool {
        self.key.as_ref().map_or(true, |chan_key| key == chan_key)
    }

    /// Writes the mode string of the channel, and its parameters when `full_info` is set.
    pub fn modes(&self, mut out: MessageBuffer<'_>, full_info: bool) {
        let modes = out.raw_param();
        modes.push('+');
        if self.invite_only {
            modes.push('i');
        }
        if self.topic_restricted {
            modes.push('t');
        }
        if self.key.is_some() {
            modes.push('k');
        }
        if self.user_limit.is_some() {
            modes.push('l');
        }
        if full_info {
            if let Some(ref key) = self.key {
                out = out.param(key);
            }
            if let Some(user_limit) = self.user_limit {
                out = out.fmt_param(user_limit);
            }
        }
    }

    /// Applies a mode change.  Returns whether the channel changed.
    ///
    /// On failure, returns the numeric reply to send back: 441 for an unknown operator target, 461
    /// for a limit that is not a number.
    ///
    /// `id_of` maps a nickname to its session, for operator changes.
    pub fn apply_mode_change<F>(
        &mut self,
        change: modes::ChannelModeChange<'_>,
        id_of: F,
    ) -> Result<bool, &'static str>
    where
        F: Fn(&str) -> Option<ClientId>,
    {
        use modes::ChannelModeChange::*;
        let mut applied = false;
        match change {
            InviteOnly(value) => {
                applied = self.invite_only != value;
                self.invite_only = value;
            }
            TopicRestricted(value) => {
                applied = self.topic_restricted != value;
                self.topic_restricted = value;
            }
            Key(value, key) => {
                if value {
                    applied = self.key.as_deref() != Some(key);
                    self.key = Some(key.to_owned());
                } else if self.key.is_some() {
                    applied = true;
                    self.key = None;
                }
            }
            UserLimit(Some(s)) => {
                let limit = s.parse::<usize>().map_err(|_| rpl::ERR_NEEDMOREPARAMS)?;
                applied = self.user_limit != Some(limit);
                self.user_limit = Some(limit);
            }
            UserLimit(None) => {
                applied = self.user_limit.is_some();
                self.user_limit = None;
            }
            ChangeOperator(value, nick) => {
                let modes = id_of(nick)
                    .and_then(|id| self.members.get_mut(&id))
                    .ok_or(rpl::ERR_USERNOTINCHANNEL)?;
                applied = modes.operator != value;
                modes.operator = value;
            }
        }
        Ok(applied)
    }
}

/// Owns every channel, indexed by name.
///
/// Names are compared exactly, case included.  A channel exists as long as it has members.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: HashMap<String, Channel>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the channel named `name`, or `None` if there is no such channel.
    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.get_mut(name)
    }

    /// Returns the channel named `name`, creating an empty one if needed.
    ///
    /// The caller must add a member right away.
    pub fn get_or_create(&mut self, name: &str) -> &mut Channel {
        if !self.channels.contains_key(name) {
            log::debug!("Creating channel {:?}", name);
        }
        self.channels.entry(name.to_owned()).or_insert_with(Channel::new)
    }

    /// Removes `id` from the channel named `name`, and deletes the channel if it is now empty.
    ///
    /// Returns whether `id` was a member.
    pub fn remove_member(&mut self, name: &str, id: ClientId) -> bool {
        let channel = match self.channels.get_mut(name) {
            Some(channel) => channel,
            None => return false,
        };
        let was_member = channel.remove_member(id);
        if channel.members.is_empty() {
            log::debug!("Removing empty channel {:?}", name);
            self.channels.remove(name);
        }
        was_member
    }

    /// Forgets any invitation given to `id`.  Used when the session goes away, since ids are
    /// reused by later connections.
    pub fn remove_invites(&mut self, id: ClientId) {
        for channel in self.channels.values_mut() {
            channel.invites.remove(&id);
        }
    }
}
