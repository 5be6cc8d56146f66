//! RFC2812 implementation
//!
//! <https://tools.ietf.org/html/rfc2812.html>

use super::{find_channel, find_member, find_nick, lookup_nick, CommandContext, HandlerResult};
use crate::channel::ClientId;
use crate::client::MessageQueueItem;
use crate::lines;
use crate::modes;
use crate::util::is_channel_name;
use ircserv_tokens::{rpl, Buffer, Command, Message};
use std::collections::BTreeSet;

fn is_valid_channel_name(s: &str) -> bool {
    // https://tools.ietf.org/html/rfc2811.html#section-2.1
    let ctrl_g = '\u{7}';
    1 < s.len()
        && s.len() <= super::MAX_CHANNEL_NAME_LENGTH
        && is_channel_name(s)
        && s.chars().all(|c| c != ' ' && c != ',' && c != ctrl_g && c != ':')
}

fn is_valid_nickname(s: &str) -> bool {
    let s = s.as_bytes();
    let is_valid_nickname_char = |&c: &u8| {
        c.is_ascii_alphanumeric()
            // "[", "]", "\", "`", "_", "^", "{", "|", "}", "-"
            || (0x5b..=0x60).contains(&c)
            || (0x7b..=0x7d).contains(&c)
            || c == b'-'
    };
    !s.is_empty()
        && s.len() <= super::MAX_NICKNAME_LENGTH
        && s.iter().all(is_valid_nickname_char)
        && s[0] != b'-'
        && !s[0].is_ascii_digit()
}

// Command handlers
impl super::StateInner {
    // INVITE

    pub fn cmd_invite(&mut self, ctx: &mut CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let (target_nick, channel_name) = (msg.params[0], msg.params[1]);
        let channel = find_channel(ctx.id, ctx.rb, &self.channels, channel_name)?;
        let member_modes = find_member(ctx.id, ctx.rb, channel, channel_name)?;
        let (target_id, _) = find_nick(ctx.id, ctx.rb, &self.clients, target_nick)?;
        if channel.has_client(target_id) {
            log::debug!("{}:         target already on channel", ctx.id);
            ctx.rb
                .reply(rpl::ERR_USERONCHANNEL)
                .param(target_nick)
                .param(channel_name)
                .trailing_param(lines::USER_ON_CHANNEL);
            return Err(());
        }
        if channel.invite_only && !member_modes.operator {
            log::debug!("{}:         not operator", ctx.id);
            ctx.rb
                .reply(rpl::ERR_CHANOPRIVSNEEDED)
                .param(channel_name)
                .trailing_param(lines::CHAN_O_PRIVS_NEEDED);
            return Err(());
        }

        if let Some(channel) = self.channels.get_mut(channel_name) {
            channel.add_invite(target_id);
        }

        let mut invite = Buffer::new();
        invite
            .message(self.clients[ctx.id].full_name(), Command::Invite)
            .param(target_nick)
            .param(channel_name);
        self.send(target_id, MessageQueueItem::from(invite));

        ctx.rb
            .reply(rpl::INVITING)
            .param(target_nick)
            .param(channel_name);

        Ok(())
    }

    // JOIN

    /// Checks whether the client can join the channel.  Returns `Ok(false)` when it is already a
    /// member.
    fn check_join(&self, ctx: &mut CommandContext<'_>, name: &str, key: &str) -> Result<bool, ()> {
        if !is_valid_channel_name(name) {
            log::debug!("{}:         invalid channel name {:?}", ctx.id, name);
            ctx.rb
                .reply(rpl::ERR_NOSUCHCHANNEL)
                .param(name)
                .trailing_param(lines::NO_SUCH_CHANNEL);
            return Err(());
        }
        let channel = match self.channels.get(name) {
            Some(channel) => channel,
            None => return Ok(true),
        };
        if channel.has_client(ctx.id) {
            log::debug!("{}:         already in {:?}", ctx.id, name);
            return Ok(false);
        }
        let error = if !channel.accepts_key(key) {
            Some((rpl::ERR_BADCHANKEY, lines::BAD_CHAN_KEY))
        } else if channel.is_full() {
            Some((rpl::ERR_CHANNELISFULL, lines::CHANNEL_IS_FULL))
        } else if channel.invite_only && !channel.is_invited(ctx.id) {
            Some((rpl::ERR_INVITEONLYCHAN, lines::INVITE_ONLY_CHAN))
        } else {
            None
        };
        if let Some((reply, line)) = error {
            log::debug!("{}:         cannot join {:?} ({})", ctx.id, name, reply);
            ctx.rb.reply(reply).param(name).trailing_param(line);
            return Err(());
        }
        Ok(true)
    }

    pub fn cmd_join(&mut self, ctx: &mut CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let mut keys = msg.params[1].split(',');
        for name in msg.params[0].split(',') {
            let key = keys.next().unwrap_or("");
            match self.check_join(ctx, name, key) {
                Ok(true) => {}
                Ok(false) | Err(()) => continue,
            }

            self.channels.get_or_create(name).add_member(ctx.id);
            let client = &mut self.clients[ctx.id];
            client.joined(name);
            let full_name = client.full_name();

            let mut join_response = Buffer::new();
            join_response.message(full_name, Command::Join).param(name);
            ctx.rb.message(full_name, Command::Join).param(name);
            self.broadcast_except(name, Some(ctx.id), MessageQueueItem::from(join_response));
            if self.channels.get(name).map_or(false, |c| c.topic.is_some()) {
                self.write_topic(ctx.rb, name);
            }
            self.write_names(ctx.rb, name);
        }

        Ok(())
    }

    // KICK

    pub fn cmd_kick(&mut self, ctx: &mut CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let (channel_name, target_nick) = (msg.params[0], msg.params[1]);
        let channel = find_channel(ctx.id, ctx.rb, &self.channels, channel_name)?;
        let member_modes = find_member(ctx.id, ctx.rb, channel, channel_name)?;
        if !member_modes.operator {
            log::debug!("{}:         not operator", ctx.id);
            ctx.rb
                .reply(rpl::ERR_CHANOPRIVSNEEDED)
                .param(channel_name)
                .trailing_param(lines::CHAN_O_PRIVS_NEEDED);
            return Err(());
        }
        let target_id = match lookup_nick(&self.clients, target_nick) {
            Some((target_id, _)) if channel.has_client(target_id) => target_id,
            _ => {
                log::debug!("{}:         target not on channel", ctx.id);
                ctx.rb
                    .reply(rpl::ERR_USERNOTINCHANNEL)
                    .param(target_nick)
                    .param(channel_name)
                    .trailing_param(lines::USER_NOT_IN_CHANNEL);
                return Err(());
            }
        };

        let client = &self.clients[ctx.id];
        let reason = match msg.raw_param(2) {
            "" => client.nick(),
            reason => reason,
        };
        let mut kick_response = Buffer::new();
        kick_response
            .message(client.full_name(), Command::Kick)
            .param(channel_name)
            .param(target_nick)
            .trailing_param(reason);
        self.broadcast(channel_name, MessageQueueItem::from(kick_response));

        self.channels.remove_member(channel_name, target_id);
        self.clients[target_id].left(channel_name);

        Ok(())
    }

    // MODE

    fn cmd_mode_chan_get(&self, ctx: &mut CommandContext<'_>, target: &str) -> HandlerResult {
        let channel = find_channel(ctx.id, ctx.rb, &self.channels, target)?;
        let msg = ctx.rb.reply(rpl::CHANNELMODEIS).param(target);
        channel.modes(msg, channel.has_client(ctx.id));
        Ok(())
    }

    fn cmd_mode_chan_set(
        &mut self,
        ctx: &mut CommandContext<'_>,
        target: &str,
        modes: &str,
        modeparams: &[&str],
    ) -> HandlerResult {
        let channel = find_channel(ctx.id, ctx.rb, &self.channels, target)?;
        let member_modes = find_member(ctx.id, ctx.rb, channel, target)?;
        if !member_modes.operator {
            log::debug!("{}:         not operator", ctx.id);
            ctx.rb
                .reply(rpl::ERR_CHANOPRIVSNEEDED)
                .param(target)
                .trailing_param(lines::CHAN_O_PRIVS_NEEDED);
            return Err(());
        }

        let clients = &self.clients;
        let channel = match self.channels.get_mut(target) {
            Some(channel) => channel,
            None => return Err(()),
        };
        let id_of = |nick: &str| lookup_nick(clients, nick).map(|(id, _)| id);

        let mut applied_modes = String::new();
        let mut applied_modeparams = Vec::new();
        let mut value = None;
        for maybe_change in modes::channel_query(modes, modeparams) {
            match maybe_change {
                Ok(change) => match channel.apply_mode_change(change, id_of) {
                    Ok(true) => {
                        log::debug!("  - Applied {:?}", change);
                        if value != Some(change.value()) {
                            applied_modes.push(if change.value() { '+' } else { '-' });
                            value = Some(change.value());
                        }
                        applied_modes.push(change.symbol());
                        if let Some(param) = change.param() {
                            applied_modeparams.push(param.to_owned());
                        }
                    }
                    Ok(false) => {}
                    Err(rpl::ERR_USERNOTINCHANNEL) => {
                        ctx.rb
                            .reply(rpl::ERR_USERNOTINCHANNEL)
                            .param(change.param().unwrap_or(""))
                            .param(target)
                            .trailing_param(lines::USER_NOT_IN_CHANNEL);
                    }
                    Err(reply) => {
                        log::debug!("  - Invalid parameter for {:?}", change);
                        ctx.rb
                            .reply(reply)
                            .param(Command::Mode.as_str())
                            .trailing_param(lines::NEED_MORE_PARAMS);
                    }
                },
                Err(modes::Error::UnknownMode(mode)) => {
                    ctx.rb
                        .reply(rpl::ERR_UNKNOWNMODE)
                        .fmt_param(mode)
                        .trailing_param(lines::UNKNOWN_MODE);
                }
                Err(modes::Error::MissingModeParam) => {
                    ctx.rb
                        .reply(rpl::ERR_NEEDMOREPARAMS)
                        .param(Command::Mode.as_str())
                        .trailing_param(lines::NEED_MORE_PARAMS);
                }
            }
        }

        if !applied_modes.is_empty() {
            let mut response = Buffer::new();
            {
                let mut msg = response
                    .message(self.clients[ctx.id].full_name(), Command::Mode)
                    .param(target)
                    .param(&applied_modes);
                for mp in &applied_modeparams {
                    msg = msg.param(mp);
                }
            }
            self.broadcast(target, MessageQueueItem::from(response));
        }

        Ok(())
    }

    fn cmd_mode_user(&self, ctx: &mut CommandContext<'_>, target: &str) -> HandlerResult {
        let (target_id, _) = find_nick(ctx.id, ctx.rb, &self.clients, target)?;
        if target_id != ctx.id {
            log::debug!("{}:         users don't match", ctx.id);
            ctx.rb
                .reply(rpl::ERR_USERSDONTMATCH)
                .trailing_param(lines::USERS_DONT_MATCH);
            return Err(());
        }
        ctx.rb.reply(rpl::UMODEIS).param("+");
        Ok(())
    }

    pub fn cmd_mode(&mut self, ctx: &mut CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let (target, modes) = (msg.params[0], msg.params[1]);
        if is_channel_name(target) {
            if modes.is_empty() {
                self.cmd_mode_chan_get(ctx, target)
            } else {
                let n = msg.num_params.max(2);
                self.cmd_mode_chan_set(ctx, target, modes, &msg.params[2..n])
            }
        } else {
            self.cmd_mode_user(ctx, target)
        }
    }

    // NICK

    pub fn cmd_nick(&mut self, ctx: &mut CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let nick = msg.params[0];
        if nick.is_empty() {
            ctx.rb
                .reply(rpl::ERR_NEEDMOREPARAMS)
                .param(Command::Nick.as_str())
                .trailing_param(lines::NEED_MORE_PARAMS);
            return Err(());
        }
        if !is_valid_nickname(nick) {
            log::debug!("{}:         bad nickname", ctx.id);
            ctx.rb
                .reply(rpl::ERR_ERRONEUSNICKNAME)
                .param(nick)
                .trailing_param(lines::ERRONEOUS_NICKNAME);
            return Err(());
        }
        if self.clients[ctx.id].has_nick(nick) {
            return Ok(());
        }
        if self.clients.iter().any(|(_, c)| c.has_nick(nick)) {
            log::debug!("{}:         already in use", ctx.id);
            ctx.rb
                .reply(rpl::ERR_NICKNAMEINUSE)
                .param(nick)
                .trailing_param(lines::NICKNAME_IN_USE);
            return Err(());
        }

        let client = &self.clients[ctx.id];
        if !client.is_registered() {
            self.clients[ctx.id].set_nick(nick);
            ctx.rb.set_nick(nick);
            return Ok(());
        }

        let mut response = Buffer::new();
        response
            .message(client.full_name(), Command::Nick)
            .param(nick);
        let msg = MessageQueueItem::from(response);

        let mut noticed: BTreeSet<ClientId> = client
            .channels()
            .iter()
            .filter_map(|name| self.channels.get(name))
            .flat_map(|channel| channel.members.keys().copied())
            .collect();
        noticed.insert(ctx.id);
        for id in noticed {
            self.send(id, msg.clone());
        }

        self.clients[ctx.id].set_nick(nick);
        ctx.rb.set_nick(nick);

        Ok(())
    }

    // PART

    pub fn cmd_part(&mut self, ctx: &mut CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let reason = msg.raw_param(1);
        for name in msg.params[0].split(',') {
            let channel = match find_channel(ctx.id, ctx.rb, &self.channels, name) {
                Ok(channel) => channel,
                Err(()) => continue,
            };
            if find_member(ctx.id, ctx.rb, channel, name).is_err() {
                continue;
            }

            let mut response = Buffer::new();
            {
                let part = response
                    .message(self.clients[ctx.id].full_name(), Command::Part)
                    .param(name);
                if !reason.is_empty() {
                    part.trailing_param(reason);
                }
            }
            self.broadcast(name, MessageQueueItem::from(response));

            self.channels.remove_member(name, ctx.id);
            self.clients[ctx.id].left(name);
        }
        Ok(())
    }

    // PASS

    pub fn cmd_pass(&mut self, ctx: &mut CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let password = msg.params[0];
        if self.password.as_deref() != Some(password) {
            log::debug!("{}:         password mismatch", ctx.id);
            ctx.rb
                .reply(rpl::ERR_PASSWDMISMATCH)
                .trailing_param(lines::PASSWORD_MISMATCH);
            return Err(());
        }
        self.clients[ctx.id].set_authenticated(true);
        Ok(())
    }

    // PING

    pub fn cmd_ping(&mut self, ctx: &mut CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        ctx.rb
            .prefixed_message(Command::Pong)
            .param(&self.domain)
            .trailing_param(msg.params[0]);
        Ok(())
    }

    // PONG

    pub fn cmd_pong(&mut self, _: &mut CommandContext<'_>, _: &Message<'_>) -> HandlerResult {
        Ok(())
    }

    // PRIVMSG and NOTICE

    fn send_text(&mut self, ctx: &mut CommandContext<'_>, command: Command, msg: &Message<'_>) -> HandlerResult {
        let target = msg.params[0];
        let content = msg.raw_param(1);
        if content.is_empty() {
            ctx.rb
                .reply(rpl::ERR_NOTEXTTOSEND)
                .trailing_param(lines::NO_TEXT_TO_SEND);
            return Err(());
        }

        let mut response = Buffer::new();
        response
            .message(self.clients[ctx.id].full_name(), command)
            .param(target)
            .trailing_param(content);
        let response = MessageQueueItem::from(response);

        if is_channel_name(target) {
            let channel = find_channel(ctx.id, ctx.rb, &self.channels, target)?;
            if !channel.has_client(ctx.id) {
                log::debug!("{}:         cannot send to channel", ctx.id);
                ctx.rb
                    .reply(rpl::ERR_CANNOTSENDTOCHAN)
                    .param(target)
                    .trailing_param(lines::CANNOT_SEND_TO_CHAN);
                return Err(());
            }
            self.broadcast_except(target, Some(ctx.id), response);
        } else {
            let (_, target_client) = find_nick(ctx.id, ctx.rb, &self.clients, target)?;
            target_client.send(response);
        }
        Ok(())
    }

    pub fn cmd_notice(&mut self, ctx: &mut CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        self.send_text(ctx, Command::Notice, msg)
    }

    pub fn cmd_privmsg(&mut self, ctx: &mut CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        self.send_text(ctx, Command::PrivMsg, msg)
    }

    // QUIT

    pub fn cmd_quit(&mut self, ctx: &mut CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let reason = match msg.raw_param(0) {
            "" => lines::DEFAULT_QUIT,
            reason => reason,
        };
        let client = self.clients.remove(ctx.id);

        let mut response = Buffer::new();
        response
            .message("", "ERROR")
            .trailing_param(lines::CLOSING_LINK);
        client.send(response);
        self.remove_client(ctx.id, client, Some(reason));

        Ok(())
    }

    // TOPIC

    fn cmd_topic_set(&mut self, ctx: &mut CommandContext<'_>, target: &str, topic: &str) -> HandlerResult {
        let channel = find_channel(ctx.id, ctx.rb, &self.channels, target)?;
        let member_modes = find_member(ctx.id, ctx.rb, channel, target)?;
        if channel.topic_restricted && !member_modes.operator {
            log::debug!("{}:         not operator", ctx.id);
            ctx.rb
                .reply(rpl::ERR_CHANOPRIVSNEEDED)
                .param(target)
                .trailing_param(lines::CHAN_O_PRIVS_NEEDED);
            return Err(());
        }

        if let Some(channel) = self.channels.get_mut(target) {
            channel.topic = if topic.is_empty() {
                None
            } else {
                Some(topic.to_owned())
            };
        }

        let mut response = Buffer::new();
        response
            .message(self.clients[ctx.id].full_name(), Command::Topic)
            .param(target)
            .trailing_param(topic);
        self.broadcast(target, MessageQueueItem::from(response));

        Ok(())
    }

    fn cmd_topic_get(&self, ctx: &mut CommandContext<'_>, target: &str) -> HandlerResult {
        let channel = find_channel(ctx.id, ctx.rb, &self.channels, target)?;
        find_member(ctx.id, ctx.rb, channel, target)?;
        self.write_topic(ctx.rb, target);
        Ok(())
    }

    pub fn cmd_topic(&mut self, ctx: &mut CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let target = msg.params[0];
        if msg.num_params < 2 {
            self.cmd_topic_get(ctx, target)
        } else {
            self.cmd_topic_set(ctx, target, msg.raw_param(1))
        }
    }

    // USER

    pub fn cmd_user(&mut self, ctx: &mut CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let user = msg.params[0];
        if user.is_empty() {
            ctx.rb
                .reply(rpl::ERR_NEEDMOREPARAMS)
                .param(Command::User.as_str())
                .trailing_param(lines::NEED_MORE_PARAMS);
            return Err(());
        }
        self.clients[ctx.id].set_user(user);
        Ok(())
    }
}
