//
// Network messages
//

pub const CLOSING_LINK: &str = "Closing link";

pub const CONNECTION_RESET: &str = "Connection reset by peer";

pub const DEFAULT_QUIT: &str = "Client quit";

pub const INVALID_UTF8: &str = "Input is not valid UTF-8";

pub const LINE_TOO_LONG: &str = "Input line was too long";

//
// Numeric replies
//

pub const ALREADY_REGISTERED: &str = "You may not reregister";

pub const BAD_CHAN_KEY: &str = "Cannot join channel (+k)";

pub const CANNOT_SEND_TO_CHAN: &str = "Cannot send to channel";

pub const CHAN_O_PRIVS_NEEDED: &str = "You're not a channel operator";

pub const CHANNEL_IS_FULL: &str = "Cannot join channel (+l)";

pub const END_OF_MOTD: &str = "End of MOTD command";

pub const END_OF_NAMES: &str = "End of NAMES list";

pub const ERRONEOUS_NICKNAME: &str = "Erroneous nickname";

pub const INVITE_ONLY_CHAN: &str = "Cannot join channel (+i)";

pub const NEED_MORE_PARAMS: &str = "Not enough parameters";

pub const NICKNAME_IN_USE: &str = "Nickname is already in use";

pub const NO_MOTD: &str = "MOTD File is missing";

pub const NO_RECIPIENT: &str = "No recipient given";

pub const NO_SUCH_CHANNEL: &str = "No such channel";

pub const NO_SUCH_NICK: &str = "No such nick/channel";

pub const NO_TEXT_TO_SEND: &str = "No text to send";

pub const NO_TOPIC: &str = "No topic is set";

pub const NOT_ON_CHANNEL: &str = "You're not on that channel";

pub const NOT_REGISTERED: &str = "You have not registered";

pub const PASSWORD_MISMATCH: &str = "Password incorrect";

pub const UNKNOWN_MODE: &str = "is unknown mode char to me";

pub const USER_NOT_IN_CHANNEL: &str = "They aren't on that channel";

pub const USER_ON_CHANNEL: &str = "is already on channel";

pub const USERS_DONT_MATCH: &str = "Cant change mode for other users";

//
// Welcome messages
//

#[macro_export]
macro_rules! lines_welcome {
    ( $name:expr ) => {
        format_args!("Welcome to the Internet Relay Network {}", $name)
    };
}

#[macro_export]
macro_rules! lines_your_host {
    ( $host:expr, $version:expr ) => {
        format_args!("Your host is {}, running version {}", $host, $version)
    };
}

#[macro_export]
macro_rules! lines_created {
    ( $since:expr ) => {
        format_args!("This server was created {}", $since)
    };
}

#[macro_export]
macro_rules! lines_motd_start {
    ( $domain:expr ) => {
        format_args!("- {} Message of the day -", $domain)
    };
}
