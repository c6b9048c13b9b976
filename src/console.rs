use crate::chat::{ ChatSession, SubmitOutcome };
use crate::models::chat::Role;
use crate::render::to_terminal;
use std::error::Error;
use std::io::Write;
use tokio::io::{ AsyncBufReadExt, BufReader };
use log::info;

const HELP: &str = "\
Commands:
  /new            start a new conversation
  /list           list conversations (most recent first)
  /switch <n>     select conversation n from /list
  /delete [n]     delete conversation n, or the current one
  /show           print the current conversation
  /help           show this help
  /quit           exit
Anything else is sent as a message.";

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    New,
    List,
    Switch(usize),
    Delete(Option<usize>),
    Show,
    Help,
    Quit,
    Unknown(&'a str),
    Message(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return Input::Message(line);
    };
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let index = parts.next().and_then(|n| n.parse::<usize>().ok());
    match (name, index) {
        ("new", _) => Input::New,
        ("list", _) => Input::List,
        ("switch", Some(n)) => Input::Switch(n),
        ("delete", n) => Input::Delete(n),
        ("show", _) => Input::Show,
        ("help", _) => Input::Help,
        ("quit" | "exit", _) => Input::Quit,
        _ => Input::Unknown(trimmed),
    }
}

/// Line-oriented chat loop over stdin/stdout.
pub async fn run(mut session: ChatSession) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);
    print_current(&session);
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Quit => {
                break;
            }
            Input::Help => println!("{}", HELP),
            Input::New => {
                session.new_conversation().await;
                println!("Started a new conversation.");
            }
            Input::List => print_list(&session),
            Input::Switch(n) => {
                let selected = match nth_id(&session, n) {
                    Some(id) => session.select(&id),
                    None => false,
                };
                if selected {
                    print_current(&session);
                } else {
                    println!("No conversation #{}", n);
                }
            }
            Input::Delete(n) => {
                let target = match n {
                    Some(n) => nth_id(&session, n),
                    None => session.active_id(),
                };
                let deleted = match target {
                    Some(id) => session.delete_conversation(&id).await,
                    None => false,
                };
                if deleted {
                    println!("Deleted.");
                    print_current(&session);
                } else {
                    println!("Nothing to delete.");
                }
            }
            Input::Show => print_conversation(&session),
            Input::Unknown(command) => println!("Unknown command {}. Try /help.", command),
            Input::Message(text) => {
                if text.trim().is_empty() {
                    prompt()?;
                    continue;
                }
                print!("AI: ");
                std::io::stdout().flush()?;
                let outcome = session.submit_with(text, |token| {
                    print!("{}", token);
                    let _ = std::io::stdout().flush();
                }).await;
                match outcome {
                    SubmitOutcome::Finalized { .. } => println!(),
                    SubmitOutcome::Failed { .. } => println!("\n{}", crate::chat::FAILED_REPLY),
                    SubmitOutcome::Rejected => println!("(not sent)"),
                }
            }
        }
        prompt()?;
    }

    info!("Chat session closed");
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}

fn nth_id(session: &ChatSession, n: usize) -> Option<crate::models::chat::ConversationId> {
    n.checked_sub(1).and_then(|i| session.conversations().get(i).map(|c| c.id))
}

fn print_list(session: &ChatSession) {
    let active = session.active_id();
    for (i, chat) in session.conversations().iter().enumerate() {
        let marker = if Some(chat.id) == active { "*" } else { " " };
        println!("{} {:>2}. {} ({} messages)", marker, i + 1, chat.title, chat.messages.len());
    }
}

fn print_current(session: &ChatSession) {
    if let Some(chat) = session.active() {
        println!("[{}]", chat.title);
    }
}

fn print_conversation(session: &ChatSession) {
    let Some(chat) = session.active() else {
        return;
    };
    println!("[{}]", chat.title);
    for message in &chat.messages {
        let who = match message.role {
            Role::User => "You",
            Role::Assistant => "AI",
        };
        let when = message.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S");
        let streaming = if message.is_streaming { " ..." } else { "" };
        println!("{} ({}){}:", who, when, streaming);
        println!("{}", to_terminal(&message.content).trim_end());
    }
}
