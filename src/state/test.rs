//! Testing utilities for `ircserv::state`

use super::State;
use crate::channel::ClientId;
use crate::client::MessageQueueItem;
use crate::config;
use ircserv_tokens::{assert_msg, Command, Message};
use std::net::SocketAddr;
use tokio::sync::mpsc;

pub type Queue = mpsc::UnboundedReceiver<MessageQueueItem>;

pub const PASSWORD: &str = "secret";

pub fn simple_state() -> State {
    State::new(config::State::sample())
}

pub fn state_with_password() -> State {
    let mut config = config::State::sample();
    config.password = Some(PASSWORD.to_owned());
    State::new(config)
}

pub async fn add_client(s: &State) -> (ClientId, Queue) {
    let port = s.0.lock().await.clients.len() as u16;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let (msg_queue, outgoing_msgs) = mpsc::unbounded_channel();
    let res = s.peer_joined(addr, msg_queue).await;
    (res, outgoing_msgs)
}

/// Adds a client and registers it with the given nickname, and the same user name.
///
/// The welcome burst is left in the queue.
pub async fn add_registered_client(s: &State, nickname: &str) -> (ClientId, Queue) {
    let (id, queue) = add_client(s).await;
    if s.0.lock().await.password.is_some() {
        handle_message(s, id, &format!("PASS {}", PASSWORD)).await;
    }
    handle_message(s, id, &format!("NICK :{}", nickname)).await;
    handle_message(s, id, &format!("USER {} 0 * :Real Name", nickname)).await;
    (id, queue)
}

pub async fn handle_message(state: &State, id: ClientId, message: &str) {
    let message = Message::parse(message).unwrap();
    let _ = state.handle_message(id, message).await;
}

pub fn flush(queue: &mut Queue) {
    loop {
        match queue.try_recv() {
            Ok(_msg) => {}
            Err(_) => return,
        }
    }
}

pub fn collect(res: &mut String, queue: &mut Queue) {
    loop {
        match queue.try_recv() {
            Ok(item) => {
                let s: &str = item.as_ref();
                res.push_str(s);
            }
            Err(_) => return,
        }
    }
}

pub fn messages(s: &str) -> impl Iterator<Item = Message<'_>> {
    s.lines()
        .map(|line| Message::parse(line).expect("bad message"))
}

type ExpectedMessage<'a> = (Option<&'a str>, Result<Command, &'a str>, &'a [&'a str]);

pub fn assert_msgs(s: &str, expected: &[ExpectedMessage<'_>]) {
    let mut i = 0;
    for msg in messages(s) {
        assert!(i < expected.len(), "unexpected message {:?}", msg);
        let (prefix, command, params) = expected[i];
        assert_msg(&msg, prefix, command, params);
        i += 1;
    }
    assert_eq!(i, expected.len());
}
