//! Client sessions and their registration state machine.

use ircserv_tokens::{rpl, Buffer, Command, ReplyBuffer};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A message queued for one or several clients.
///
/// Cloning is cheap, so that broadcasts build the message once.
#[derive(Clone, Debug)]
pub struct MessageQueueItem(Arc<str>);

impl From<String> for MessageQueueItem {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<Buffer> for MessageQueueItem {
    fn from(buf: Buffer) -> Self {
        Self::from(buf.build())
    }
}

impl From<ReplyBuffer> for MessageQueueItem {
    fn from(buf: ReplyBuffer) -> Self {
        Self::from(buf.build())
    }
}

impl AsRef<str> for MessageQueueItem {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<[u8]> for MessageQueueItem {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

pub type MessageQueue = mpsc::UnboundedSender<MessageQueueItem>;

/// Client data.
pub struct Client {
    /// The queue of messages to be sent to the client.
    ///
    /// This is the write end of an unbounded mpsc channel, so sending messages never blocks.
    queue: MessageQueue,

    stage: RegistrationStage,

    nick: String,
    user: String,
    host: String,

    /// `nick!user@host`, kept up to date by the setters.
    full_name: String,

    /// Whether the client has given the connection password.
    authenticated: bool,

    /// Names of the channels the client is in.
    channels: HashSet<String>,
}

impl Client {
    /// Initialize the data for a new client, given its message queue and its host.
    ///
    /// The registration starts at `AwaitingPassword` when the server requires a password.
    pub fn new(queue: MessageQueue, host: String, password_required: bool) -> Self {
        let stage = if password_required {
            RegistrationStage::AwaitingPassword
        } else {
            RegistrationStage::AwaitingNick
        };
        let mut client = Self {
            queue,
            stage,
            nick: String::new(),
            user: String::new(),
            host,
            full_name: String::new(),
            authenticated: false,
            channels: HashSet::new(),
        };
        client.update_full_name();
        client
    }

    /// Add a message to the client message queue.
    ///
    /// Messages sent after the connection task has ended are dropped.
    pub fn send<M>(&self, msg: M)
    where
        M: Into<MessageQueueItem>,
    {
        let _ = self.queue.send(msg.into());
    }

    /// Change the registration stage of the client given the command it just sent.
    ///
    /// Call `Client::can_issue_command` before, the stage is left untouched if the command is not
    /// allowed.
    pub fn apply_command(&mut self, cmd: Command) -> RegistrationStage {
        if let Ok(stage) = self.stage.apply(cmd) {
            self.stage = stage;
        }
        self.stage
    }

    /// Whether or not the client can issue the given command.
    ///
    /// On failure, returns the numeric reply to send back.
    pub fn can_issue_command(&self, cmd: Command) -> Result<(), &'static str> {
        self.stage.apply(cmd).map(|_| ())
    }

    pub fn stage(&self) -> RegistrationStage {
        self.stage
    }

    pub fn is_registered(&self) -> bool {
        self.stage == RegistrationStage::Registered
    }

    /// The nickname of the client, or `*` if it has not chosen one yet.
    pub fn nick(&self) -> &str {
        if self.nick.is_empty() {
            "*"
        } else {
            &self.nick
        }
    }

    /// Whether the client holds the given nickname.
    pub fn has_nick(&self, nick: &str) -> bool {
        !self.nick.is_empty() && self.nick == nick
    }

    pub fn set_nick(&mut self, nick: &str) {
        self.nick.clear();
        self.nick.push_str(nick);
        self.update_full_name();
    }

    pub fn set_user(&mut self, user: &str) {
        self.user.clear();
        self.user.push_str(user);
        self.update_full_name();
    }

    /// The `nick!user@host` prefix of the messages this client sends to others.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }

    pub fn channels(&self) -> &HashSet<String> {
        &self.channels
    }

    pub(crate) fn joined(&mut self, channel: &str) {
        self.channels.insert(channel.to_owned());
    }

    pub(crate) fn left(&mut self, channel: &str) {
        self.channels.remove(channel);
    }

    fn update_full_name(&mut self) {
        let nick = if self.nick.is_empty() { "*" } else { &self.nick };
        self.full_name.clear();
        self.full_name.push_str(nick);
        self.full_name.push('!');
        self.full_name.push_str(&self.user);
        self.full_name.push('@');
        self.full_name.push_str(&self.host);
    }
}

/// A state machine that represents the registration (process of sending "PASS", "NICK" and
/// "USER").
///
/// It keeps track of what commands the client can send.  For example, a client that has only sent
/// "NICK" cannot send "JOIN".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationStage {
    /// The server requires a password and the client has not given it yet.
    AwaitingPassword,

    /// The client must choose a nickname.
    AwaitingNick,

    /// The client has a nickname and must send "USER".
    AwaitingUser,

    /// The client can send any command except "PASS" and "USER".
    Registered,
}

impl RegistrationStage {
    /// Given a registration stage and a command, returns the next stage after the client has
    /// successfully sent the command, or a reply code if the command cannot be issued.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ircserv::client::RegistrationStage;
    /// use ircserv_tokens::{rpl, Command};
    ///
    /// let stage = RegistrationStage::AwaitingUser;
    /// assert_eq!(stage.apply(Command::User), Ok(RegistrationStage::Registered));
    ///
    /// let stage = RegistrationStage::Registered;
    /// assert_eq!(stage.apply(Command::User), Err(rpl::ERR_ALREADYREGISTRED));
    /// ```
    pub fn apply(self, cmd: Command) -> Result<Self, &'static str> {
        use RegistrationStage::*;

        match (self, cmd) {
            (_, Command::Quit) | (_, Command::Ping) | (_, Command::Pong) => Ok(self),
            (AwaitingPassword, Command::Pass) => Ok(AwaitingNick),
            (AwaitingPassword, _) => Err(rpl::ERR_NOTREGISTERED),
            (_, Command::Pass) => Err(rpl::ERR_ALREADYREGISTRED),
            (AwaitingNick, Command::Nick) | (AwaitingUser, Command::Nick) => Ok(AwaitingUser),
            (AwaitingUser, Command::User) => Ok(Registered),
            (Registered, Command::User) => Err(rpl::ERR_ALREADYREGISTRED),
            (Registered, _) => Ok(Registered),
            (_, _) => Err(rpl::ERR_NOTREGISTERED),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(password_required: bool) -> Client {
        let (queue, _) = mpsc::unbounded_channel();
        Client::new(queue, "127.0.0.1".to_owned(), password_required)
    }

    #[test]
    fn test_set_authenticated() {
        let mut c = client(true);
        assert!(!c.is_authenticated());
        c.set_authenticated(true);
        assert!(c.is_authenticated());
        c.set_authenticated(false);
        assert!(!c.is_authenticated());
    }

    #[test]
    fn test_full_name() {
        let mut c = client(false);
        assert_eq!(c.nick(), "*");
        assert!(!c.has_nick("*"));
        c.set_nick("alice");
        c.set_user("al");
        assert_eq!(c.full_name(), "alice!al@127.0.0.1");
        assert!(c.has_nick("alice"));
        assert!(!c.has_nick("Alice"));
    }

    #[test]
    fn test_registration_with_password() {
        let mut c = client(true);
        assert_eq!(c.stage(), RegistrationStage::AwaitingPassword);
        assert_eq!(c.can_issue_command(Command::Nick), Err(rpl::ERR_NOTREGISTERED));
        assert_eq!(c.can_issue_command(Command::Join), Err(rpl::ERR_NOTREGISTERED));
        assert_eq!(c.can_issue_command(Command::Ping), Ok(()));

        assert_eq!(c.apply_command(Command::Pass), RegistrationStage::AwaitingNick);
        assert_eq!(c.can_issue_command(Command::Pass), Err(rpl::ERR_ALREADYREGISTRED));
        assert_eq!(c.can_issue_command(Command::User), Err(rpl::ERR_NOTREGISTERED));

        assert_eq!(c.apply_command(Command::Nick), RegistrationStage::AwaitingUser);
        assert_eq!(c.apply_command(Command::Nick), RegistrationStage::AwaitingUser);
        assert_eq!(c.apply_command(Command::User), RegistrationStage::Registered);
        assert!(c.is_registered());
    }

    #[test]
    fn test_registered_is_terminal() {
        let mut c = client(false);
        assert_eq!(c.stage(), RegistrationStage::AwaitingNick);
        c.apply_command(Command::Nick);
        c.apply_command(Command::User);

        assert_eq!(c.can_issue_command(Command::User), Err(rpl::ERR_ALREADYREGISTRED));
        assert_eq!(c.can_issue_command(Command::Pass), Err(rpl::ERR_ALREADYREGISTRED));
        assert_eq!(c.apply_command(Command::Nick), RegistrationStage::Registered);
        assert_eq!(c.apply_command(Command::Kick), RegistrationStage::Registered);
    }
}
