use crate::Command;

/// The recommended length of a message.
///
/// `Message::parse` can parse messages longer than that.  It is used by `Buffer` to avoid multiple
/// allocations when building the same message.
pub const MESSAGE_LENGTH: usize = 512;

/// The number of elements in `Message::params`.
pub const PARAMS_LENGTH: usize = 15;

/// Returns `(word, rest)` where `word` is the first word of the given string and `rest` is the
/// substring starting at the first character of the second word.
///
/// Words are separated by any run of whitespace.  `s` must not start with whitespace.
fn parse_word(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(end) => (&s[..end], s[end..].trim_start()),
        None => (s, ""),
    }
}

/// If the given string starts with a prefix, returns `(Some(prefix), rest)` where `rest` starts
/// from the first word after the prefix.
///
/// Otherwise returns `(None, rest)` where `rest` is the substring starting from the first word of
/// the given string.
fn parse_prefix(buf: &str) -> (Option<&str>, &str) {
    if let Some(stripped) = buf.strip_prefix(':') {
        let (prefix, rest) = parse_word(stripped);
        (Some(prefix), rest)
    } else {
        (None, buf.trim_start())
    }
}

/// Parses the first word of the string the same way as `parse_word`, and then tries to parse it as
/// a command.
///
/// On success, it returns `(Ok(command), rest)`.  On failure, when the command is not a variant of
/// `Command`, it returns `(Err(unknown_command), rest)`.
fn parse_command(buf: &str) -> (Result<Command, &str>, &str) {
    let (command_string, rest) = parse_word(buf);
    (Command::parse(command_string).ok_or(command_string), rest)
}

/// A protocol message.
///
/// See `Message::parse` for documentation on how to read messages, and `Buffer` for how to create
/// them.
///
/// The format follows RFC 2812: <https://tools.ietf.org/html/rfc2812.html#section-2.3>.
#[derive(Clone, Debug)]
pub struct Message<'a> {
    /// The prefix of the message.
    pub prefix: Option<&'a str>,

    /// The command of the message.
    ///
    /// It can either be a valid command in the form of `Ok(Command::_)`, or a simple string.
    /// `Message::parse` sets this field to `Err(_)` if the command is not a variant of `Command`.
    pub command: Result<Command, &'a str>,

    /// The number of parameters, and the number of valid elements in `Message::params`.
    pub num_params: usize,

    /// The actual parameters of the message.
    ///
    /// Only the `num_params` first elements are valid.  Other elements are empty strings.
    pub params: [&'a str; PARAMS_LENGTH],

    /// For each parameter, the remainder of the line starting where the parameter starts.
    rests: [&'a str; PARAMS_LENGTH],
}

impl<'a> Message<'a> {
    /// Parses a string and returns information about the message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ircserv_tokens::{Command, Message};
    /// let privmsg = Message::parse(":ser PRIVMSG #fosdem :I'm Simon Sir\r\n").unwrap();
    ///
    /// assert_eq!(privmsg.prefix, Some("ser"));
    /// assert_eq!(privmsg.command, Ok(Command::PrivMsg));
    /// assert_eq!(privmsg.num_params, 2);
    /// assert_eq!(privmsg.params[0], "#fosdem");
    /// assert_eq!(privmsg.params[1], "I'm Simon Sir");
    /// ```
    ///
    /// If the command is unknown, it is stored as `Err(command_string)`, where `command_string` is
    /// taken from the input string:
    ///
    /// ```rust
    /// # use ircserv_tokens::{Command, Message};
    /// let unknown = Message::parse("Typo arg1\r\n").unwrap();
    ///
    /// assert_eq!(unknown.prefix, None);
    /// assert_eq!(unknown.command, Err("Typo"));
    /// assert_eq!(unknown.num_params, 1);
    /// assert_eq!(unknown.params[0], "arg1");
    /// ```
    ///
    /// # Return value
    ///
    /// Returns `Some(msg)` when the message is correctly formed, `None` otherwise.  Correctly
    /// formed means the message has a command.  Only the line terminator is stripped from the end,
    /// so the last parameter keeps its trailing whitespace.
    ///
    /// ```rust
    /// # use ircserv_tokens::Message;
    /// let empty = Message::parse("  \r \n \t ");
    /// let no_command = Message::parse(":prefix");
    ///
    /// assert!(empty.is_none());
    /// assert!(no_command.is_none());
    /// ```
    pub fn parse(s: &'a str) -> Option<Message<'a>> {
        let mut buf = s.trim_end_matches(&['\r', '\n'][..]).trim_start();
        if buf.trim_end().is_empty() || buf.contains('\0') {
            return None;
        }

        let (prefix, rest) = parse_prefix(buf);
        buf = rest;
        let (command, rest) = parse_command(buf);
        buf = rest;

        if let Err("") = command {
            return None;
        }

        let mut params = [""; PARAMS_LENGTH];
        let mut rests = [""; PARAMS_LENGTH];
        let mut num_params = 0;
        while num_params < PARAMS_LENGTH {
            if buf.is_empty() {
                break;
            }
            rests[num_params] = buf;
            if let Some(trailing) = buf.strip_prefix(':') {
                params[num_params] = trailing;
                buf = "";
            } else {
                let (word, rest) = parse_word(buf);
                params[num_params] = word;
                buf = rest;
            }
            num_params += 1;
        }

        Some(Message {
            prefix,
            command,
            num_params,
            params,
            rests,
        })
    }

    /// Returns true if the message has enough parameters for its command.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use ircserv_tokens::Message;
    /// let nick = Message::parse("NICK hello there").unwrap();
    /// assert_eq!(nick.has_enough_params(), true);
    ///
    /// let nick = Message::parse("NICK :").unwrap();
    /// assert_eq!(nick.has_enough_params(), true);
    ///
    /// let nick = Message::parse("NICK").unwrap();
    /// assert_eq!(nick.has_enough_params(), false);
    /// ```
    pub fn has_enough_params(&self) -> bool {
        match self.command {
            Ok(cmd) => cmd.required_params() <= self.num_params,
            Err(_) => false,
        }
    }

    /// Returns the text of the line from the parameter `i` to the end, as the client sent it.
    ///
    /// A leading colon is stripped.  Contrary to `Message::params`, the words are not split, so
    /// whitespace between them is kept as is.  Returns an empty string if there is no such
    /// parameter.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use ircserv_tokens::Message;
    /// let privmsg = Message::parse("PRIVMSG bob hello   world").unwrap();
    ///
    /// assert_eq!(privmsg.params[1], "hello");
    /// assert_eq!(privmsg.raw_param(1), "hello   world");
    /// assert_eq!(privmsg.raw_param(2), "world");
    /// assert_eq!(privmsg.raw_param(3), "");
    /// ```
    pub fn raw_param(&self, i: usize) -> &'a str {
        if self.num_params <= i {
            return "";
        }
        let rest = self.rests[i];
        rest.strip_prefix(':').unwrap_or(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_msg;

    #[test]
    fn test_parse_params() {
        let msg = Message::parse("KICK #test bob :you   know why\r\n").unwrap();
        assert_msg(&msg, None, Ok(Command::Kick), &["#test", "bob", "you   know why"]);

        let msg = Message::parse("   JOIN    #a,#b   key\n").unwrap();
        assert_msg(&msg, None, Ok(Command::Join), &["#a,#b", "key"]);

        let msg = Message::parse("TOPIC #test :").unwrap();
        assert_msg(&msg, None, Ok(Command::Topic), &["#test", ""]);
        assert_eq!(msg.num_params, 2);
    }

    #[test]
    fn test_parse_exact_case() {
        let msg = Message::parse("privmsg #test :hi").unwrap();
        assert_eq!(msg.command, Err("privmsg"));
        assert!(!msg.has_enough_params());
    }

    #[test]
    fn test_raw_param() {
        let msg = Message::parse("PRIVMSG #room :hello   world\r\n").unwrap();
        assert_eq!(msg.raw_param(1), "hello   world");

        let msg = Message::parse("PRIVMSG #room   hi  there :  you\r\n").unwrap();
        assert_eq!(msg.params[1], "hi");
        assert_eq!(msg.raw_param(1), "hi  there :  you");
        assert_eq!(msg.raw_param(3), "  you");

        let msg = Message::parse(":nick PRIVMSG #room ::)").unwrap();
        assert_eq!(msg.raw_param(1), ":)");

        let msg = Message::parse("PRIVMSG #room :hello   world   \r\n").unwrap();
        assert_eq!(msg.params[1], "hello   world   ");
        assert_eq!(msg.raw_param(1), "hello   world   ");
    }

    #[test]
    fn test_parse_tabs() {
        let msg = Message::parse("JOIN\t#test \t key\r\n").unwrap();
        assert_msg(&msg, None, Ok(Command::Join), &["#test", "key"]);

        let msg = Message::parse("PING token  \t").unwrap();
        assert_msg(&msg, None, Ok(Command::Ping), &["token"]);
    }

    #[test]
    fn test_too_many_params() {
        let line = "MODE a b c d e f g h i j k l m n o p q";
        let msg = Message::parse(line).unwrap();
        assert_eq!(msg.num_params, PARAMS_LENGTH);
        assert_eq!(msg.params[PARAMS_LENGTH - 1], "o");
    }
}
