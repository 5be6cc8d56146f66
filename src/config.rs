//! Configuration structures.
//!
//! The server is configured either from the command line (`<port> <password>`) or from a scfg
//! file:
//!
//! ```text
//! listen 6667
//! password hunter2
//! domain irc.example.org
//! motd /etc/ircserv/motd.txt
//! ```

use std::{fmt, fs, io, path};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Format(String),
    InvalidPort(String),
    MissingSetting(&'static str),
    Usage,
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(val: io::Error) -> Self {
        Self::Io(val)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{}", err),
            Self::Format(msg) => write!(f, "bad configuration: {}", msg),
            Self::InvalidPort(port) => {
                write!(f, "{:?} is not a valid port (expected 1 to 65535)", port)
            }
            Self::MissingSetting(name) => write!(f, "missing {:?} setting", name),
            Self::Usage => write!(f, "expected <port> <password> or --config <file>"),
        }
    }
}

/// Settings for `State`.
#[derive(Clone, Debug, Default)]
pub struct State {
    /// Prefix of numeric replies.
    pub domain: String,

    /// The connection password.  `None` means no password is required.
    pub password: Option<String>,

    pub motd_file: Option<path::PathBuf>,
}

impl State {
    pub fn sample() -> Self {
        Self {
            domain: "ircserver".to_owned(),
            password: None,
            motd_file: None,
        }
    }
}

/// The whole configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// TCP port the server listens on, for every interface.
    pub port: u16,
    pub state: State,
}

/// Parses a TCP port.  Zero is refused.
fn parse_port(s: &str) -> Result<u16> {
    match s.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(Error::InvalidPort(s.to_owned())),
    }
}

impl Config {
    pub fn sample() -> Self {
        Self {
            port: 6667,
            state: State::sample(),
        }
    }

    /// Builds the configuration from the `<port> <password>` command line.
    ///
    /// An empty password means no password is required.
    pub fn from_args(port: &str, password: &str) -> Result<Self> {
        let mut res = Self::sample();
        res.port = parse_port(port)?;
        if !password.is_empty() {
            res.state.password = Some(password.to_owned());
        }
        Ok(res)
    }

    /// Reads the configuration file at the given path.
    pub fn from_file<P>(path: P) -> Result<Self>
    where
        P: AsRef<path::Path>,
    {
        let contents = fs::read_to_string(path)?;
        Self::from_scfg(&contents)
    }

    /// Parses a configuration in the scfg format.
    pub fn from_scfg(contents: &str) -> Result<Self> {
        let doc = contents
            .parse::<scfg::Scfg>()
            .map_err(|err| Error::Format(err.to_string()))?;
        let first_param = |name: &'static str| -> Result<Option<&str>> {
            match doc.get(name) {
                Some(directive) => match directive.params().first() {
                    Some(value) => Ok(Some(value.as_str())),
                    None => Err(Error::Format(format!("{:?} expects a value", name))),
                },
                None => Ok(None),
            }
        };

        let mut res = Self::sample();
        let port = first_param("listen")?.ok_or(Error::MissingSetting("listen"))?;
        res.port = parse_port(port)?;
        if let Some(password) = first_param("password")? {
            if !password.is_empty() {
                res.state.password = Some(password.to_owned());
            }
        }
        if let Some(domain) = first_param("domain")? {
            res.state.domain = domain.to_owned();
        }
        if let Some(motd) = first_param("motd")? {
            res.state.motd_file = Some(path::PathBuf::from(motd));
        }
        Ok(res)
    }
}

/// What the command line asks for.
#[derive(Debug)]
pub enum Args {
    Run(Config),
    Help,
    Version,
}

impl Args {
    /// Parses the arguments of the program, without the program name.
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        match args.as_slice() {
            [flag] if flag == "-h" || flag == "--help" => Ok(Self::Help),
            [flag] if flag == "-v" || flag == "--version" => Ok(Self::Version),
            [flag, path] if flag == "--config" => Config::from_file(path).map(Self::Run),
            [port, password] => Config::from_args(port, password).map(Self::Run),
            _ => Err(Error::Usage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_args() {
        let cfg = Config::from_args("6667", "hunter2").unwrap();
        assert_eq!(cfg.port, 6667);
        assert_eq!(cfg.state.password.as_deref(), Some("hunter2"));
        assert_eq!(cfg.state.domain, "ircserver");

        let cfg = Config::from_args("6697", "").unwrap();
        assert_eq!(cfg.state.password, None);
    }

    #[test]
    fn test_invalid_port() {
        assert!(matches!(Config::from_args("0", "x"), Err(Error::InvalidPort(_))));
        assert!(matches!(Config::from_args("-1", "x"), Err(Error::InvalidPort(_))));
        assert!(matches!(Config::from_args("65536", "x"), Err(Error::InvalidPort(_))));
        assert!(matches!(Config::from_args("irc", "x"), Err(Error::InvalidPort(_))));
    }

    #[test]
    fn test_args() {
        let args = |a: &[&str]| Args::parse(a.iter().map(|s| s.to_string()));

        assert!(matches!(args(&["-h"]), Ok(Args::Help)));
        assert!(matches!(args(&["--version"]), Ok(Args::Version)));
        assert!(matches!(args(&[]), Err(Error::Usage)));
        assert!(matches!(args(&["6667"]), Err(Error::Usage)));
        assert!(matches!(args(&["6667", "pass", "extra"]), Err(Error::Usage)));
        assert!(matches!(args(&["--config", "/nonexistent/ircserv.conf"]), Err(Error::Io(_))));
        match args(&["6667", "pass"]) {
            Ok(Args::Run(cfg)) => assert_eq!(cfg.port, 6667),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_from_scfg() {
        let cfg = Config::from_scfg("listen 7000\npassword secret\ndomain irc.example.org\n")
            .unwrap();
        assert_eq!(cfg.port, 7000);
        assert_eq!(cfg.state.password.as_deref(), Some("secret"));
        assert_eq!(cfg.state.domain, "irc.example.org");
        assert_eq!(cfg.state.motd_file, None);

        let cfg = Config::from_scfg("listen 7000\nmotd motd.txt\n").unwrap();
        assert_eq!(cfg.state.password, None);
        assert_eq!(cfg.state.motd_file, Some(path::PathBuf::from("motd.txt")));
    }

    #[test]
    fn test_scfg_errors() {
        assert!(matches!(Config::from_scfg("domain x\n"), Err(Error::MissingSetting("listen"))));
        assert!(matches!(Config::from_scfg("listen\n"), Err(Error::Format(_))));
        assert!(matches!(Config::from_scfg("listen 0\n"), Err(Error::InvalidPort(_))));
    }
}
