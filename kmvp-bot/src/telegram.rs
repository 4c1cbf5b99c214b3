use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use common::conversation::{Event, Reply, ReplySink};
use common::presenter::{Action, Menu};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};
use teloxide::utils::command::BotCommands;
use teloxide::utils::markdown;

use crate::admin::{self, AdminCommand};
use crate::context::AppContext;

const WELCOME: &str = "🎤 Welcome to KMVP Downloader Bot!\nSend a YouTube link to start.";

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "snake_case", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "show this help message")]
    Help,
    #[command(description = "cancel the current download")]
    Cancel,
    #[command(description = "show bot status (admin)")]
    Status,
    #[command(description = "update cookies.txt from Google Drive (admin)")]
    UpdateCookies,
    #[command(description = "change log level: DEBUG|INFO|WARNING|ERROR (admin)")]
    SetLogLevel(String),
    #[command(description = "show host diagnostics (admin)")]
    Admin,
}

/// Delivers conversation replies to one chat. `origin` is the message whose
/// button was pressed, if any.
struct ChatSink {
    bot: Bot,
    chat: ChatId,
    origin: Option<MessageId>,
}

#[async_trait]
impl ReplySink for ChatSink {
    async fn send(&self, reply: Reply) -> Result<()> {
        match reply {
            Reply::Text(text) => {
                self.bot.send_message(self.chat, text).await?;
            }
            Reply::Menu(menu) => {
                self.bot
                    .send_message(self.chat, render_menu(&menu))
                    .parse_mode(ParseMode::MarkdownV2)
                    .reply_markup(keyboard(&menu))
                    .await?;
            }
            Reply::Update(text) => {
                let edited = match self.origin {
                    Some(id) => self
                        .bot
                        .edit_message_text(self.chat, id, text.clone())
                        .await
                        .map_err(|e| tracing::debug!("Could not edit message {:?}: {}", id, e))
                        .is_ok(),
                    None => false,
                };
                if !edited {
                    self.bot.send_message(self.chat, text).await?;
                }
            }
        }
        Ok(())
    }
}

fn render_menu(menu: &Menu) -> String {
    let mut out = markdown::bold(&markdown::escape(&menu.header));
    if !menu.lines.is_empty() {
        out.push_str("\n\n");
        let lines: Vec<_> = menu.lines.iter().map(|l| markdown::escape(l)).collect();
        out.push_str(&lines.join("\n"));
    }
    out
}

fn keyboard(menu: &Menu) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        menu.buttons
            .iter()
            .map(|b| vec![InlineKeyboardButton::callback(b.label.clone(), b.action.id())]),
    )
}

async fn on_command(bot: Bot, msg: Message, cmd: Command, ctx: Arc<AppContext>) -> Result<()> {
    let Some(user) = msg.from.as_ref().map(|u| u.id.0) else {
        return Ok(());
    };
    tracing::debug!("Command {:?} from {}", cmd, user);

    let reply = match cmd {
        Command::Start => WELCOME.to_owned(),
        Command::Help => Command::descriptions().to_string(),
        Command::Cancel => {
            let sink = ChatSink {
                bot,
                chat: msg.chat.id,
                origin: None,
            };
            return ctx.conversation.handle(user, Event::Cancel, &sink).await;
        }
        Command::Status => admin::execute(&ctx, user, AdminCommand::Status).await,
        Command::UpdateCookies => admin::execute(&ctx, user, AdminCommand::UpdateCookies).await,
        Command::SetLogLevel(level) => {
            admin::execute(&ctx, user, AdminCommand::SetLogLevel(level)).await
        }
        Command::Admin => admin::execute(&ctx, user, AdminCommand::Diagnostics).await,
    };

    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn on_message(bot: Bot, msg: Message, ctx: Arc<AppContext>) -> Result<()> {
    let (Some(user), Some(text)) = (msg.from.as_ref().map(|u| u.id.0), msg.text()) else {
        return Ok(());
    };
    if text.starts_with('/') {
        tracing::debug!("Ignoring unknown command from {}: {}", user, text);
        return Ok(());
    }

    let sink = ChatSink {
        bot,
        chat: msg.chat.id,
        origin: None,
    };
    ctx.conversation
        .handle(user, Event::from_text(text), &sink)
        .await
}

async fn on_callback(bot: Bot, q: CallbackQuery, ctx: Arc<AppContext>) -> Result<()> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let (chat, origin) = match &q.message {
        Some(message) => (message.chat().id, Some(message.id())),
        None => (ChatId::from(q.from.id), None),
    };

    let sink = ChatSink {
        bot,
        chat,
        origin,
    };
    ctx.conversation
        .handle(q.from.id.0, Event::Action(Action::from_id(data)), &sink)
        .await
}

/// Runs the long-polling dispatcher until Ctrl-C.
pub async fn run(bot: Bot, ctx: Arc<AppContext>) -> Result<()> {
    bot.set_my_commands(Command::bot_commands()).await?;

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(on_command),
        )
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx])
        .default_handler(|upd| async move {
            tracing::trace!("Unhandled update: {:?}", upd.kind);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::candidate::CandidateRecord;
    use common::presenter::present;

    #[test]
    fn parses_commands() {
        assert!(matches!(Command::parse("/cancel", "kmvp_bot"), Ok(Command::Cancel)));
        assert!(matches!(
            Command::parse("/set_log_level DEBUG", "kmvp_bot"),
            Ok(Command::SetLogLevel(level)) if level == "DEBUG"
        ));
        assert!(matches!(
            Command::parse("/update_cookies", "kmvp_bot"),
            Ok(Command::UpdateCookies)
        ));
    }

    #[test]
    fn keyboard_has_one_row_per_button() {
        let candidates = vec![CandidateRecord {
            index: 0,
            title: Some("Song".into()),
            artist: None,
            album: None,
        }];
        let markup = keyboard(&present(&candidates, "q", 1));

        assert_eq!(markup.inline_keyboard.len(), 4);
        assert!(markup.inline_keyboard.iter().all(|row| row.len() == 1));
        assert_eq!(markup.inline_keyboard[0][0].text, "1");
    }

    #[test]
    fn menu_text_is_escaped() {
        let candidates = vec![CandidateRecord {
            index: 0,
            title: Some("Song (Remix)".into()),
            artist: Some("A.B".into()),
            album: None,
        }];
        let text = render_menu(&present(&candidates, "q", 1));

        assert!(text.starts_with('*'));
        assert!(text.contains(r"Song \(Remix\)"));
        assert!(text.contains(r"A\.B"));
    }
}
