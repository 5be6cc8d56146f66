use std::fmt;

macro_rules! commands {
    ( $( $cmd:ident $cmd_str:literal $n:literal )* ) => {
        /// The list of known commands.
        ///
        /// Unknown commands are kept by `Message` as plain strings, this enum only contains the
        /// verbs the server handles.  Numeric replies use the `Reply` variant.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Command {
            $( $cmd, )*
            Reply(&'static str),
        }

        impl Command {
            /// From a given command string, returns the corresponding command, or `None`
            /// otherwise.
            ///
            /// Verbs are matched exactly, case included.
            ///
            /// # Example
            ///
            /// ```rust
            /// # use ircserv_tokens::Command;
            /// let join = Command::parse("JOIN");
            /// let lowercase = Command::parse("join");
            /// let not_join = Command::parse("not_join");
            ///
            /// assert_eq!(join, Some(Command::Join));
            /// assert_eq!(lowercase, None);
            /// assert_eq!(not_join, None);
            /// ```
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                $(
                    $cmd_str => Some(Command::$cmd),
                )*
                    _ => None,
                }
            }

            /// Returns the number of required arguments for the command.
            ///
            /// The command may accept more arguments.
            ///
            /// # Example
            ///
            /// ```rust
            /// # use ircserv_tokens::Command;
            /// let kick = Command::parse("KICK").unwrap();
            /// let topic = Command::parse("TOPIC").unwrap();
            ///
            /// assert_eq!(kick.required_params(), 2);
            /// assert_eq!(topic.required_params(), 1);
            /// ```
            pub fn required_params(&self) -> usize {
                match self {
                $(
                    Command::$cmd => $n,
                )*
                    Command::Reply(_) => 0,
                }
            }

            /// Returns the command string.
            ///
            /// # Example
            ///
            /// ```rust
            /// # use ircserv_tokens::Command;
            /// assert_eq!(Command::Quit.as_str(), "QUIT");
            /// assert_eq!(Command::Reply("403").as_str(), "403");
            /// ```
            pub fn as_str(&self) -> &'static str {
                match self {
                $(
                    Command::$cmd => $cmd_str,
                )*
                    Command::Reply(s) => s,
                }
            }
        }

        impl From<&'static str> for Command {
            /// `&'static str`s are converted to the `Command::Reply` variant.
            ///
            /// This is used by `Buffer` to accept both `Command` and numeric replies when
            /// building messages.
            fn from(reply: &'static str) -> Self {
                Command::Reply(reply)
            }
        }

        impl fmt::Display for Command {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    }
}

commands! {
//  Ident.   String     Minimum # of params
    Invite   "INVITE"   2
    Join     "JOIN"     1
    Kick     "KICK"     2
    Mode     "MODE"     1
    Nick     "NICK"     1
    Notice   "NOTICE"   2
    Part     "PART"     1
    Pass     "PASS"     1
    Ping     "PING"     1
    Pong     "PONG"     0
    PrivMsg  "PRIVMSG"  2
    Quit     "QUIT"     0
    Topic    "TOPIC"    1
    User     "USER"     1
}
