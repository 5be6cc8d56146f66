use ircserv::config::{self, Args};
use ircserv::{net, State};
use std::{env, process};

pub fn main() {
    if cfg!(debug_assertions) {
        env::set_var("RUST_BACKTRACE", "1");
    }

    let log_settings = env_logger::Env::new()
        .filter_or("IRCSERV_LOG", "ircserv=debug")
        .write_style("IRCSERV_LOG_STYLE");
    env_logger::Builder::from_env(log_settings)
        .format(|buf, r| {
            use std::io::Write;
            writeln!(buf, "[{:<5} {}] {}", r.level(), r.target(), r.args())
        })
        .init();

    let cfg = parse_args();
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let shared = State::new(cfg.state);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .unwrap_or_else(|err| {
            log::error!("Failed to start the tokio runtime: {}", err);
            process::exit(1);
        });

    if let Err(err) = runtime.block_on(net::listen(addr, shared)) {
        log::error!("{}", err);
        process::exit(1);
    }
}

fn parse_args() -> config::Config {
    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| env!("CARGO_PKG_NAME").to_owned());

    match Args::parse(args) {
        Ok(Args::Run(cfg)) => cfg,
        Ok(Args::Help) => {
            eprintln!("ircserv {}", env!("CARGO_PKG_VERSION"));
            eprintln!("Usage: {} <port> <password>", program);
            eprintln!("       {} --config CONFIG_FILE", program);
            process::exit(0);
        }
        Ok(Args::Version) => {
            eprintln!("ircserv {}", env!("CARGO_PKG_VERSION"));
            process::exit(0);
        }
        Err(config::Error::Usage) => {
            eprintln!("Usage: {} <port> <password>", program);
            eprintln!("       {} --config CONFIG_FILE", program);
            process::exit(1);
        }
        Err(err) => {
            log::error!("Invalid configuration: {}", err);
            process::exit(1);
        }
    }
}
