//! Mode parsing and validation

use std::borrow::Borrow;

/// User modes supported by the server.  Advertised in welcome messages.
pub const USER_MODES: &str = "";

/// Channel modes that have no parameters.  Advertised in welcome messages.
pub const SIMPLE_CHAN_MODES: &str = "it";

/// Channel modes that require a parameter.  Advertised in welcome messages.
pub const EXTENDED_CHAN_MODES: &str = "klo";

/// Iterator over the modes of a string.
struct SimpleQuery<'a> {
    modes: &'a [u8],
    value: bool,
}

impl<'a> SimpleQuery<'a> {
    pub fn new(modes: &'a str) -> Self {
        Self {
            modes: modes.as_bytes(),
            value: true,
        }
    }
}

impl Iterator for SimpleQuery<'_> {
    type Item = (bool, u8);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (&c, rest) = self.modes.split_first()?;
            self.modes = rest;
            match c {
                b'+' => self.value = true,
                b'-' => self.value = false,
                c => return Some((self.value, c)),
            }
        }
    }
}

/// `channel_query` related errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// One of the modes in the query is unknown.
    UnknownMode(char),

    /// A mode is missing its required parameter.
    MissingModeParam,
}

/// Alias to std's Result using this module's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Item of a channel mode query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelModeChange<'a> {
    InviteOnly(bool),
    TopicRestricted(bool),
    Key(bool, &'a str),
    UserLimit(Option<&'a str>),
    ChangeOperator(bool, &'a str),
}

impl ChannelModeChange<'_> {
    /// Whether this change is enabling or disabling a mode.
    pub fn value(&self) -> bool {
        use ChannelModeChange::*;
        match self {
            InviteOnly(v) | TopicRestricted(v) | Key(v, _) | ChangeOperator(v, _) => *v,
            UserLimit(l) => l.is_some(),
        }
    }

    /// The letter of this mode change.
    pub fn symbol(&self) -> char {
        use ChannelModeChange::*;
        match self {
            InviteOnly(_) => 'i',
            TopicRestricted(_) => 't',
            Key(_, _) => 'k',
            UserLimit(_) => 'l',
            ChangeOperator(_, _) => 'o',
        }
    }

    /// The parameter of this mode change.
    pub fn param(&self) -> Option<&str> {
        use ChannelModeChange::*;
        match self {
            Key(_, p) | ChangeOperator(_, p) => Some(p),
            UserLimit(l) => *l,
            _ => None,
        }
    }
}

/// An iterator over the changes of a MODE query.
///
/// # Example
///
/// ```rust
/// # use ircserv::modes;
/// # use ircserv::modes::{ChannelModeChange, Error};
/// let mut query = modes::channel_query("-olX+kt", &["admin", "secret_key"]);
///
/// assert_eq!(query.next(), Some(Ok(ChannelModeChange::ChangeOperator(false, "admin"))));
/// assert_eq!(query.next(), Some(Ok(ChannelModeChange::UserLimit(None))));
/// assert_eq!(query.next(), Some(Err(Error::UnknownMode('X'))));
/// assert_eq!(query.next(), Some(Ok(ChannelModeChange::Key(true, "secret_key"))));
/// assert_eq!(query.next(), Some(Ok(ChannelModeChange::TopicRestricted(true))));
/// assert_eq!(query.next(), None);
/// ```
pub fn channel_query<'a, I, S>(
    modes: &'a str,
    params: I,
) -> impl Iterator<Item = Result<ChannelModeChange<'a>>>
where
    I: IntoIterator<Item = &'a S> + 'a,
    S: Borrow<str> + 'a,
{
    let mut params = params
        .into_iter()
        .map(|p| p.borrow())
        .filter(|p| !p.is_empty());
    SimpleQuery::new(modes).map(move |(value, mode)| match mode {
        b'i' => Ok(ChannelModeChange::InviteOnly(value)),
        b't' => Ok(ChannelModeChange::TopicRestricted(value)),
        b'k' => {
            if let Some(param) = params.next() {
                Ok(ChannelModeChange::Key(value, param))
            } else if !value {
                Ok(ChannelModeChange::Key(false, "*"))
            } else {
                Err(Error::MissingModeParam)
            }
        }
        b'l' => {
            if !value {
                Ok(ChannelModeChange::UserLimit(None))
            } else if let Some(param) = params.next() {
                Ok(ChannelModeChange::UserLimit(Some(param)))
            } else {
                Err(Error::MissingModeParam)
            }
        }
        b'o' => match params.next() {
            Some(param) => Ok(ChannelModeChange::ChangeOperator(value, param)),
            None => Err(Error::MissingModeParam),
        },
        other => Err(Error::UnknownMode(other as char)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_query() {
        let mut q = SimpleQuery::new("+ab+C++D+-+E--fg+-h");
        assert_eq!(q.next(), Some((true, b'a')));
        assert_eq!(q.next(), Some((true, b'b')));
        assert_eq!(q.next(), Some((true, b'C')));
        assert_eq!(q.next(), Some((true, b'D')));
        assert_eq!(q.next(), Some((true, b'E')));
        assert_eq!(q.next(), Some((false, b'f')));
        assert_eq!(q.next(), Some((false, b'g')));
        assert_eq!(q.next(), Some((false, b'h')));
        assert_eq!(q.next(), None);

        let mut q = SimpleQuery::new("a");
        assert_eq!(q.next(), Some((true, b'a')));
        assert_eq!(q.next(), None);

        let mut q = SimpleQuery::new("");
        assert_eq!(q.next(), None);
    }

    #[test]
    fn test_chanmode_key() {
        let mut q = channel_query::<_, &str>("+k", &[]);
        assert_eq!(q.next(), Some(Err(Error::MissingModeParam)));
        assert_eq!(q.next(), None);

        let mut q = channel_query("+k", &["beer"]);
        assert_eq!(q.next(), Some(Ok(ChannelModeChange::Key(true, "beer"))));
        assert_eq!(q.next(), None);

        let mut q = channel_query::<_, &str>("-k", &[]);
        assert_eq!(q.next(), Some(Ok(ChannelModeChange::Key(false, "*"))));
        assert_eq!(q.next(), None);

        let mut q = channel_query("+ko", &["beer", "wine"]);
        assert_eq!(q.next(), Some(Ok(ChannelModeChange::Key(true, "beer"))));
        assert_eq!(q.next(), Some(Ok(ChannelModeChange::ChangeOperator(true, "wine"))));
        assert_eq!(q.next(), None);
    }

    #[test]
    fn test_chanmode_limit() {
        let mut q = channel_query("+l-l", &["10"]);
        assert_eq!(q.next(), Some(Ok(ChannelModeChange::UserLimit(Some("10")))));
        assert_eq!(q.next(), Some(Ok(ChannelModeChange::UserLimit(None))));
        assert_eq!(q.next(), None);

        let mut q = channel_query::<_, &str>("+lo", &[]);
        assert_eq!(q.next(), Some(Err(Error::MissingModeParam)));
        assert_eq!(q.next(), Some(Err(Error::MissingModeParam)));
        assert_eq!(q.next(), None);
    }
}
