use crate::{Command, MESSAGE_LENGTH};
use std::fmt;

/// Helper to build a protocol message.
///
/// Use with `Buffer::message` and `ReplyBuffer::reply`.
pub struct MessageBuffer<'a> {
    buf: &'a mut String,
}

impl<'a> MessageBuffer<'a> {
    fn with_prefix<C>(buf: &'a mut String, prefix: &str, command: C) -> Self
    where
        C: Into<Command>,
    {
        if !prefix.is_empty() {
            buf.push(':');
            buf.push_str(prefix);
            buf.push(' ');
        }
        buf.push_str(command.into().as_str());
        MessageBuffer { buf }
    }

    /// Appends a parameter to the message.
    ///
    /// The parameter is trimmed before insertion.  If `param` is whitespace, it is not appended.
    ///
    /// **Note**: It is up to the caller to make sure there is no remaning whitespace or newline in
    /// the parameter.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use ircserv_tokens::{Command, Buffer};
    /// let mut response = Buffer::new();
    ///
    /// response.message("nick!user@127.0.0.1", Command::Quit)
    ///     .param("")
    ///     .param("  chiao ");
    ///
    /// assert_eq!(&response.build(), ":nick!user@127.0.0.1 QUIT chiao\r\n");
    /// ```
    pub fn param(self, param: &str) -> Self {
        let param = param.trim();
        if param.is_empty() {
            return self;
        }
        self.buf.push(' ');
        self.buf.push_str(param);
        self
    }

    /// Formats, then appends a parameter to the message.
    ///
    /// The parameter is **NOT** trimmed before insertion, is appended even if it's empty.  Use
    /// `MessageBuffer::param` to append strings, especially untrusted ones.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use ircserv_tokens::{Command, Buffer};
    /// let mut response = Buffer::new();
    ///
    /// response.message("", Command::Mode)
    ///     .param("#space")
    ///     .param("+l")
    ///     .fmt_param(42);
    ///
    /// assert_eq!(&response.build(), "MODE #space +l 42\r\n");
    /// ```
    pub fn fmt_param<T>(self, param: T) -> Self
    where
        T: fmt::Display,
    {
        use std::fmt::Write as _;

        self.buf.push(' ');
        let _ = write!(self.buf, "{}", param);
        self
    }

    /// Appends the trailing parameter to the message and consumes the buffer.
    ///
    /// Contrary to `MessageBuffer::param`, the parameter is not trimmed before insertion.  Even if
    /// `param` is just whitespace, it is appended.
    ///
    /// **Note**: It is up to the caller to make sure there is no newline in the parameter.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use ircserv_tokens::{Command, Buffer};
    /// let mut response = Buffer::new();
    ///
    /// response.message("nick!user@127.0.0.1", Command::PrivMsg)
    ///     .param("#room")
    ///     .trailing_param("hello   world");
    ///
    /// assert_eq!(&response.build(), ":nick!user@127.0.0.1 PRIVMSG #room :hello   world\r\n");
    /// ```
    pub fn trailing_param(self, param: &str) {
        self.buf.push(' ');
        self.buf.push(':');
        self.buf.push_str(param);
    }

    /// Formats, then appends the trailing parameter to the message and consumes the buffer.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use ircserv_tokens::{Buffer, rpl};
    /// let mut response = Buffer::new();
    ///
    /// response.message("ircserver", rpl::WELCOME)
    ///     .param("alice")
    ///     .fmt_trailing_param(format_args!("Welcome {}", "alice!alice@localhost"));
    ///
    /// assert_eq!(&response.build(), ":ircserver 001 alice :Welcome alice!alice@localhost\r\n");
    /// ```
    pub fn fmt_trailing_param<T>(self, param: T)
    where
        T: fmt::Display,
    {
        use std::fmt::Write as _;

        self.buf.push(' ');
        self.buf.push(':');
        let _ = write!(self.buf, "{}", param);
    }

    /// Returns a buffer the caller can use to append characters to a parameter.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use ircserv_tokens::{Command, Buffer};
    /// let mut response = Buffer::new();
    /// {
    ///     let mut msg = response.message("nick!user@127.0.0.1", Command::Mode)
    ///         .param("#my_channel");
    ///     let param = msg.raw_param();
    ///     param.push('+');
    ///     param.push('i');
    ///     param.push('t');
    /// }
    ///
    /// assert_eq!(&response.build(), ":nick!user@127.0.0.1 MODE #my_channel +it\r\n");
    /// ```
    pub fn raw_param(&mut self) -> &mut String {
        self.buf.push(' ');
        self.buf
    }

    /// Returns a buffer the caller can use to append characters to the trailing parameter.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use ircserv_tokens::{Buffer, rpl};
    /// let mut response = Buffer::new();
    /// {
    ///     let mut msg = response.message("ircserver", rpl::NAMREPLY)
    ///         .param("alice")
    ///         .param("=")
    ///         .param("#test");
    ///     let param = msg.raw_trailing_param();
    ///     param.push_str("@alice");
    ///     param.push(' ');
    ///     param.push_str("bob");
    /// }
    ///
    /// assert_eq!(&response.build(), ":ircserver 353 alice = #test :@alice bob\r\n");
    /// ```
    pub fn raw_trailing_param(&mut self) -> &mut String {
        self.buf.push(' ');
        self.buf.push(':');
        self.buf
    }
}

impl Drop for MessageBuffer<'_> {
    /// Appends "\r\n" when the `MessageBuffer` is dropped.
    fn drop(&mut self) {
        self.buf.push('\r');
        self.buf.push('\n');
    }
}

/// Helper to build protocol messages.
///
/// The `Buffer` is used to ease the creation of strings representing valid messages.  If you
/// mainly need to send numeric replies, `ReplyBuffer` might be a better fit.
///
/// # Example
///
/// ```rust
/// # use ircserv_tokens::{Command, Buffer, rpl};
/// let mut response = Buffer::new();
///
/// response.message("nick!user@127.0.0.1", Command::Topic)
///     .param("#hall")
///     .trailing_param("Welcome to new users!");
/// response.message("ircserver", rpl::TOPIC)
///     .param("nickname")
///     .param("#hall")
///     .trailing_param("Welcome to new users!");
///
/// let result = response.build();
/// assert_eq!(&result, ":nick!user@127.0.0.1 TOPIC #hall :Welcome to new users!\r\n\
/// :ircserver 332 nickname #hall :Welcome to new users!\r\n");
/// ```
///
/// # On allocation
///
/// Allocation only occurs on `Buffer::message` calls.  It reserves `MESSAGE_LENGTH` prior to
/// writing on the internal buffer.
#[derive(Debug, Default)]
pub struct Buffer {
    buf: String,
}

impl Buffer {
    /// Creates a `Buffer`.  Does not allocate.
    pub fn new() -> Self {
        Self { buf: String::new() }
    }

    /// Whether the buffer is empty.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use ircserv_tokens::{Command, Buffer};
    /// let empty = Buffer::new();
    /// let mut not_empty = Buffer::new();
    ///
    /// not_empty.message("ircserver", Command::Ping);
    ///
    /// assert_eq!(empty.is_empty(), true);
    /// assert_eq!(not_empty.is_empty(), false);
    /// ```
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Appends a message with a prefix to the buffer.
    ///
    /// If the given `prefix` is empty, no prefix is added.
    pub fn message<C>(&mut self, prefix: &str, command: C) -> MessageBuffer<'_>
    where
        C: Into<Command>,
    {
        self.buf.reserve(MESSAGE_LENGTH);
        MessageBuffer::with_prefix(&mut self.buf, prefix, command)
    }

    /// Consumes the `Buffer` and returns the underlying `String`.
    pub fn build(self) -> String {
        self.buf
    }
}

/// A helper to build responses meant for one client.
///
/// While `Buffer` is able to build any kind of message, `ReplyBuffer` allows for easy creation
/// of numeric replies: messages that have the domain of the server as prefix, and the nickname of
/// the client as first parameter.
///
/// # Example
///
/// ```rust
/// # use ircserv_tokens::{Command, ReplyBuffer, rpl};
/// let mut response = ReplyBuffer::new("ircserver", "alice");
///
/// response.reply(rpl::ERR_NOTONCHANNEL)
///     .param("#test")
///     .trailing_param("You're not on that channel");
/// response.message("bob!bob@127.0.0.1", Command::Invite)
///     .param("alice")
///     .param("#test");
///
/// assert_eq!(&response.build(), ":ircserver 442 alice #test :You're not on that channel\r\n\
/// :bob!bob@127.0.0.1 INVITE alice #test\r\n");
/// ```
#[derive(Debug)]
pub struct ReplyBuffer {
    buf: Buffer,
    domain: String,
    nickname: String,
}

impl ReplyBuffer {
    pub fn new(domain: &str, nickname: &str) -> Self {
        Self {
            buf: Buffer::new(),
            domain: domain.to_owned(),
            nickname: nickname.to_owned(),
        }
    }

    /// Whether the buffer has messages in it or not.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Changes the nickname used as the first parameter of replies.
    pub fn set_nick(&mut self, nickname: &str) {
        self.nickname.clear();
        self.nickname.push_str(nickname);
    }

    /// Appends a reply to the buffer.
    ///
    /// This will push the domain, the reply and the nickname of the client, and then return the
    /// resulting `MessageBuffer`.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use ircserv_tokens::{ReplyBuffer, rpl};
    /// let mut response = ReplyBuffer::new("ircserver", "*");
    ///
    /// response.reply(rpl::ERR_NOTREGISTERED).trailing_param("You have not registered");
    ///
    /// assert_eq!(&response.build(), ":ircserver 451 * :You have not registered\r\n");
    /// ```
    pub fn reply<C>(&mut self, r: C) -> MessageBuffer<'_>
    where
        C: Into<Command>,
    {
        self.buf.buf.reserve(MESSAGE_LENGTH);
        let msg = MessageBuffer::with_prefix(&mut self.buf.buf, &self.domain, r);
        msg.param(&self.nickname)
    }

    /// Appends a command with the domain as prefix, but without the nickname parameter.
    pub fn prefixed_message<C>(&mut self, command: C) -> MessageBuffer<'_>
    where
        C: Into<Command>,
    {
        self.buf.buf.reserve(MESSAGE_LENGTH);
        MessageBuffer::with_prefix(&mut self.buf.buf, &self.domain, command)
    }

    /// Appends a prefixed message like you would do with a `Buffer`.
    pub fn message<C>(&mut self, prefix: &str, command: C) -> MessageBuffer<'_>
    where
        C: Into<Command>,
    {
        self.buf.message(prefix, command)
    }

    /// Consumes the buffer and returns the underlying `String`.
    pub fn build(self) -> String {
        self.buf.build()
    }
}
