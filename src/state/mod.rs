//! Shared state and API to handle incoming commands.
//!
//! This module is split in several files:
//!
//! - `mod.rs`: public API of the server state, command dispatch and send utilities
//! - `rfc2812.rs`: handlers for the commands defined in the RFC 2812

use crate::channel::{Channel, ChannelRegistry, ClientId, MemberModes};
use crate::client::{Client, MessageQueue, MessageQueueItem};
use crate::config;
use crate::lines;
use crate::modes;
use crate::util::time_str;
use ircserv_tokens::{rpl, Buffer, Command, Message, ReplyBuffer};
use slab::Slab;
use std::collections::HashMap;
use std::sync::Arc;
use std::{fs, io, net};
use tokio::sync::Mutex;

#[macro_export]
macro_rules! server_version {
    () => {
        concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"))
    };
}

mod rfc2812;
#[cfg(test)]
mod test;

const MAX_CHANNEL_NAME_LENGTH: usize = 50;
const MAX_NICKNAME_LENGTH: usize = 16;

type HandlerResult = Result<(), ()>;

/// A command handler.
///
/// On failure, the handler has already written the numeric reply explaining why in `ctx.rb`.
type Handler = fn(&mut StateInner, &mut CommandContext<'_>, &Message<'_>) -> HandlerResult;

struct CommandContext<'a> {
    id: ClientId,
    rb: &'a mut ReplyBuffer,
}

/// Builds the table used to route commands to their handler.
fn handlers() -> HashMap<Command, Handler> {
    let mut res: HashMap<Command, Handler> = HashMap::new();
    res.insert(Command::Invite, StateInner::cmd_invite);
    res.insert(Command::Join, StateInner::cmd_join);
    res.insert(Command::Kick, StateInner::cmd_kick);
    res.insert(Command::Mode, StateInner::cmd_mode);
    res.insert(Command::Nick, StateInner::cmd_nick);
    res.insert(Command::Notice, StateInner::cmd_notice);
    res.insert(Command::Part, StateInner::cmd_part);
    res.insert(Command::Pass, StateInner::cmd_pass);
    res.insert(Command::Ping, StateInner::cmd_ping);
    res.insert(Command::Pong, StateInner::cmd_pong);
    res.insert(Command::PrivMsg, StateInner::cmd_privmsg);
    res.insert(Command::Quit, StateInner::cmd_quit);
    res.insert(Command::Topic, StateInner::cmd_topic);
    res.insert(Command::User, StateInner::cmd_user);
    res
}

/// State of the chat server.
///
/// This is an `Arc` to the real data, so it's cheap to clone and clones share the same data.
/// Every call locks the whole state, so commands are applied one at a time, in the order the
/// connection tasks submit them.
///
/// # Example
///
/// ```rust
/// # use ircserv::State;
/// # use ircserv::config;
/// # use ircserv_tokens::Message;
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let state = State::new(config::State::sample());
///
/// // The state pushes the messages meant to be sent to the client onto the queue.
/// let client_addr = std::net::SocketAddr::from(([127, 0, 0, 1], 12345));
/// let (msg_queue, mut outgoing_msgs) = tokio::sync::mpsc::unbounded_channel();
/// let id = state.peer_joined(client_addr, msg_queue).await;
///
/// let nick = Message::parse("NICK alice\r\n").unwrap();
/// let user = Message::parse("USER alice 0 * :Alice\r\n").unwrap();
/// state.handle_message(id, nick).await.unwrap();
/// state.handle_message(id, user).await.unwrap();
///
/// // The client has registered, the first reply is RPL_WELCOME.
/// let msg = outgoing_msgs.recv().await.unwrap();
/// let msg: &str = msg.as_ref();
/// assert_eq!(msg.split("\r\n").next().unwrap(),
///            ":ircserver 001 alice :Welcome to the Internet Relay Network alice!alice@127.0.0.1");
/// # });
/// ```
#[derive(Clone)]
pub struct State(Arc<Mutex<StateInner>>);

impl State {
    /// Initializes the server state from the given configuration.
    pub fn new(config: config::State) -> Self {
        let inner = StateInner::new(config);
        Self(Arc::new(Mutex::new(inner)))
    }

    /// Adds a new connection to the state, and returns its identifier.
    ///
    /// The queue is used to push messages back to the peer.
    pub async fn peer_joined(&self, addr: net::SocketAddr, queue: MessageQueue) -> ClientId {
        self.0.lock().await.peer_joined(addr, queue)
    }

    /// Removes the given connection from the state, with an optional error.
    ///
    /// Channels peers are not notified, only a QUIT command does that.
    pub async fn peer_quit(&self, id: ClientId, err: Option<io::Error>) {
        self.0.lock().await.peer_quit(id, err);
    }

    /// Updates the state according to the given message from the given client.
    ///
    /// Returns `Err(())` when the connection must be closed.
    pub async fn handle_message(&self, id: ClientId, msg: Message<'_>) -> Result<(), ()> {
        self.0.lock().await.handle_message(id, msg)
    }
}

/// The actual shared data (state) of the server.
pub(crate) struct StateInner {
    /// The domain of the server. This string is used as a prefix for replies sent to clients.
    domain: String,

    /// Sessions, indexed by their identifier.
    clients: Slab<Client>,

    channels: ChannelRegistry,

    /// The formatted time when this instance is created. It is sent to the client when they
    /// register (in a "003 RPL_CREATED" reply).
    created_at: String,

    motd: Option<String>,

    /// Clients need to issue a PASS command with this password to register.
    password: Option<String>,

    handlers: HashMap<Command, Handler>,
}

impl StateInner {
    pub fn new(config: config::State) -> Self {
        let motd = config.motd_file.and_then(|file| match fs::read_to_string(&file) {
            Ok(motd) => Some(motd),
            Err(err) => {
                log::warn!("Failed to read {:?}: {}", file, err);
                None
            }
        });
        Self {
            domain: config.domain,
            clients: Slab::new(),
            channels: ChannelRegistry::new(),
            created_at: time_str(),
            motd,
            password: config.password,
            handlers: handlers(),
        }
    }

    pub fn peer_joined(&mut self, addr: net::SocketAddr, queue: MessageQueue) -> ClientId {
        let client = Client::new(queue, addr.ip().to_string(), self.password.is_some());
        let id = self.clients.insert(client);
        log::debug!("{}: Connected from {}", id, addr);
        id
    }

    pub fn peer_quit(&mut self, id: ClientId, err: Option<io::Error>) {
        if !self.clients.contains(id) {
            return;
        }
        match err {
            Some(err) => log::debug!("{}: Disconnected: {}", id, err),
            None => log::debug!("{}: Disconnected", id),
        }
        let client = self.clients.remove(id);
        self.remove_client(id, client, None);
    }

    /// Does the cleanup needed when a client disconnects:
    ///
    /// - send a QUIT message to the peers of the client if a reason is given,
    /// - remove the client from each channel it was in, and delete the channels left empty,
    /// - forget the invitations given to the client.
    ///
    /// The client must already be removed from `StateInner::clients`.
    fn remove_client(&mut self, id: ClientId, client: Client, reason: Option<&str>) {
        if let Some(reason) = reason {
            let mut response = Buffer::new();
            response
                .message(client.full_name(), Command::Quit)
                .trailing_param(reason);
            let msg = MessageQueueItem::from(response);
            let mut peers: Vec<ClientId> = client
                .channels()
                .iter()
                .filter_map(|name| self.channels.get(name))
                .flat_map(|channel| channel.members.keys().copied())
                .filter(|&member| member != id)
                .collect();
            peers.sort_unstable();
            peers.dedup();
            for peer in peers {
                self.send(peer, msg.clone());
            }
        }

        for name in client.channels() {
            self.channels.remove_member(name, id);
        }
        self.channels.remove_invites(id);
    }

    pub fn handle_message(&mut self, id: ClientId, msg: Message<'_>) -> Result<(), ()> {
        let client = match self.clients.get(id) {
            Some(client) => client,
            None => return Err(()),
        };
        let mut rb = ReplyBuffer::new(&self.domain, client.nick());

        let command = match msg.command {
            Ok(cmd) => cmd,
            Err(unknown) => {
                log::debug!("{}: Unknown command {:?}", id, unknown);
                return Ok(());
            }
        };

        if let Err(reply) = client.can_issue_command(command) {
            if reply == rpl::ERR_ALREADYREGISTRED {
                rb.reply(reply).trailing_param(lines::ALREADY_REGISTERED);
            } else {
                rb.reply(reply).trailing_param(lines::NOT_REGISTERED);
            }
            log::debug!("{}: {}: Not allowed in stage {:?}", id, command, client.stage());
            client.send(rb);
            return Ok(());
        }

        if !msg.has_enough_params() {
            match command {
                Command::PrivMsg | Command::Notice if msg.num_params == 0 => {
                    rb.reply(rpl::ERR_NORECIPIENT)
                        .fmt_trailing_param(format_args!("{} ({})", lines::NO_RECIPIENT, command));
                }
                Command::PrivMsg | Command::Notice => {
                    rb.reply(rpl::ERR_NOTEXTTOSEND)
                        .trailing_param(lines::NO_TEXT_TO_SEND);
                }
                _ => {
                    rb.reply(rpl::ERR_NEEDMOREPARAMS)
                        .param(command.as_str())
                        .trailing_param(lines::NEED_MORE_PARAMS);
                }
            }
            log::debug!("{}: {}: Not enough parameters", id, command);
            client.send(rb);
            return Ok(());
        }

        let handler = match self.handlers.get(&command) {
            Some(handler) => *handler,
            None => return Ok(()),
        };

        log::debug!("{}: {} {:?}", id, command, &msg.params[..msg.num_params]);
        let mut ctx = CommandContext { id, rb: &mut rb };
        let cmd_result = handler(self, &mut ctx, &msg);

        if !rb.is_empty() {
            self.send(id, MessageQueueItem::from(rb));
        }
        if command == Command::Quit {
            return Err(());
        }
        if cmd_result.is_ok() {
            if let Some(client) = self.clients.get_mut(id) {
                let old_stage = client.stage();
                let new_stage = client.apply_command(command);
                if new_stage != old_stage {
                    log::debug!("{}: {:?} -> {:?}", id, old_stage, new_stage);
                }
                if client.is_registered() && old_stage != new_stage {
                    let client = &self.clients[id];
                    let mut rb = ReplyBuffer::new(&self.domain, client.nick());
                    self.write_welcome(&mut rb, client.full_name());
                    client.send(rb);
                }
            }
        }
        Ok(())
    }
}

/// Returns `Ok(channel)` when `name` is an existing channel name.  Otherwise returns `Err(())` and
/// writes an error to the client.
fn find_channel<'a>(
    id: ClientId,
    rb: &mut ReplyBuffer,
    channels: &'a ChannelRegistry,
    name: &str,
) -> Result<&'a Channel, ()> {
    match channels.get(name) {
        Some(channel) => Ok(channel),
        None => {
            log::debug!("{}:         no such channel", id);
            rb.reply(rpl::ERR_NOSUCHCHANNEL)
                .param(name)
                .trailing_param(lines::NO_SUCH_CHANNEL);
            Err(())
        }
    }
}

/// Returns `Ok(member_modes)` when the client identified by `id` is in the given `channel`.
/// Otherwise returns `Err(())` and writes an error to the client.
///
/// `channel_name` is needed for the error reply.
fn find_member(
    id: ClientId,
    rb: &mut ReplyBuffer,
    channel: &Channel,
    channel_name: &str,
) -> Result<MemberModes, ()> {
    match channel.members.get(&id) {
        Some(modes) => Ok(*modes),
        None => {
            log::debug!("{}:         not on channel", id);
            rb.reply(rpl::ERR_NOTONCHANNEL)
                .param(channel_name)
                .trailing_param(lines::NOT_ON_CHANNEL);
            Err(())
        }
    }
}

/// Returns `Ok((id, client))` when the client identified by the nickname `nick` is connected and
/// registered.  Otherwise returns `Err(())` and writes an error to the client.
fn find_nick<'a>(
    id: ClientId,
    rb: &mut ReplyBuffer,
    clients: &'a Slab<Client>,
    nick: &str,
) -> Result<(ClientId, &'a Client), ()> {
    match lookup_nick(clients, nick) {
        Some(found) => Ok(found),
        None => {
            log::debug!("{}:         nick doesn't exist", id);
            rb.reply(rpl::ERR_NOSUCHNICK)
                .param(nick)
                .trailing_param(lines::NO_SUCH_NICK);
            Err(())
        }
    }
}

/// Returns the registered client with the nickname `nick`, if any.
fn lookup_nick<'a>(clients: &'a Slab<Client>, nick: &str) -> Option<(ClientId, &'a Client)> {
    clients
        .iter()
        .find(|(_, client)| client.is_registered() && client.has_nick(nick))
}

// Send utilities
impl StateInner {
    /// Sends the given message to the given client.
    fn send(&self, id: ClientId, msg: MessageQueueItem) {
        if let Some(client) = self.clients.get(id) {
            client.send(msg);
        }
    }

    /// Sends the given message to all members of the given channel.
    fn broadcast(&self, channel_name: &str, msg: MessageQueueItem) {
        self.broadcast_except(channel_name, None, msg);
    }

    /// Sends the given message to all members of the given channel, except `except`.
    fn broadcast_except(&self, channel_name: &str, except: Option<ClientId>, msg: MessageQueueItem) {
        let channel = match self.channels.get(channel_name) {
            Some(channel) => channel,
            None => return,
        };
        for &member in channel.members.keys() {
            if Some(member) != except {
                self.send(member, msg.clone());
            }
        }
    }

    fn write_motd(&self, rb: &mut ReplyBuffer) {
        if let Some(ref motd) = self.motd {
            rb.reply(rpl::MOTDSTART)
                .fmt_trailing_param(lines_motd_start!(&self.domain));
            for line in motd.lines() {
                let mut msg = rb.reply(rpl::MOTD);
                let trailing = msg.raw_trailing_param();
                trailing.push_str("- ");
                trailing.push_str(line);
            }
            rb.reply(rpl::ENDOFMOTD).trailing_param(lines::END_OF_MOTD);
        } else {
            rb.reply(rpl::ERR_NOMOTD).trailing_param(lines::NO_MOTD);
        }
    }

    /// Writes the list of nicknames in the channel `channel_name`.
    fn write_names(&self, rb: &mut ReplyBuffer, channel_name: &str) {
        if let Some(channel) = self.channels.get(channel_name) {
            let mut message = rb.reply(rpl::NAMREPLY).param("=").param(channel_name);
            let trailing = message.raw_trailing_param();
            for (&member, modes) in &channel.members {
                if let Some(client) = self.clients.get(member) {
                    if let Some(s) = modes.symbol() {
                        trailing.push(s);
                    }
                    trailing.push_str(client.nick());
                    trailing.push(' ');
                }
            }
            trailing.pop(); // Remove last space
        }
        rb.reply(rpl::ENDOFNAMES)
            .param(channel_name)
            .trailing_param(lines::END_OF_NAMES);
    }

    /// Writes the topic of the channel `channel_name`, or RPL_NOTOPIC.
    fn write_topic(&self, rb: &mut ReplyBuffer, channel_name: &str) {
        let topic = self.channels.get(channel_name).and_then(|c| c.topic.as_ref());
        if let Some(topic) = topic {
            rb.reply(rpl::TOPIC).param(channel_name).trailing_param(topic);
        } else {
            rb.reply(rpl::NOTOPIC)
                .param(channel_name)
                .trailing_param(lines::NO_TOPIC);
        }
    }

    /// Writes welcome messages. Called when a client has completed its registration.
    fn write_welcome(&self, rb: &mut ReplyBuffer, name: &str) {
        rb.reply(rpl::WELCOME).fmt_trailing_param(lines_welcome!(name));
        rb.reply(rpl::YOURHOST)
            .fmt_trailing_param(lines_your_host!(&self.domain, server_version!()));
        rb.reply(rpl::CREATED)
            .fmt_trailing_param(lines_created!(&self.created_at));
        rb.reply(rpl::MYINFO)
            .param(&self.domain)
            .param(server_version!())
            .param(if modes::USER_MODES.is_empty() { "-" } else { modes::USER_MODES })
            .param(modes::SIMPLE_CHAN_MODES)
            .param(modes::EXTENDED_CHAN_MODES);
        self.write_motd(rb);
    }
}
