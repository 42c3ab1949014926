/**
 * XFFeed Terminal Client - Main Entry Point
 *
 * Line-oriented client for the XFFeed backend. Prints screens, reads
 * commands from stdin and streams chat messages while a thread is open.
 */
use std::collections::HashSet;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use xffeed::client::{
    Config, FileStore, KeyValueStore, LogoutReason, Screen, SendRoute, SessionEvent,
    SessionManager, View, ViewController,
};
use xffeed::shared::{AuthError, ChatMessage, RequestError};

const HELP: &str = "\
Commands:
  login                 log in
  register              create an account
  posts [page]          show the feed
  post <id>             show a post with its comments
  new-post              write a post
  like [id]             like the open post, or post <id>
  comment [text]        comment on the open post
  chats                 list chats
  chat <id>             open a chat thread
  new-chat [username]   start a chat
  send <text>           send into the open thread
  back                  go up one level
  logout                log out
  help                  show this help
  quit                  exit";

/// Lines of stdin with a prompt helper for multi-field commands
struct Input {
    lines: Lines<BufReader<Stdin>>,
}

impl Input {
    fn new() -> Self {
        Self { lines: BufReader::new(tokio::io::stdin()).lines() }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.lines.next_line().await
    }

    async fn ask(&mut self, label: &str) -> std::io::Result<String> {
        print!("{}: ", label);
        flush();
        Ok(self.next_line().await?.unwrap_or_default())
    }
}

/// Messages already printed in the open thread. Polling redelivers the
/// whole history every tick.
#[derive(Default)]
struct Seen {
    keys: HashSet<(Option<u64>, String, String, String)>,
}

impl Seen {
    fn key(message: &ChatMessage) -> (Option<u64>, String, String, String) {
        match message.id {
            Some(id) => (Some(id), String::new(), String::new(), String::new()),
            None => (
                None,
                message.sender_username.clone(),
                message.timestamp.clone(),
                message.content.clone(),
            ),
        }
    }

    fn reset(&mut self, history: &[ChatMessage]) {
        self.keys.clear();
        for message in history {
            self.keys.insert(Self::key(message));
        }
    }

    fn insert(&mut self, message: &ChatMessage) -> bool {
        self.keys.insert(Self::key(message))
    }
}

enum Flow {
    Continue,
    Quit,
}

enum Event {
    Line(Option<String>),
    Message(ChatMessage),
    SessionCheck,
    Ignored,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&env_filter))
        .with_writer(std::io::stderr)
        .init();

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open_default()?);
    let config = Config::resolve(store.as_ref())?;
    tracing::info!(api = config.api_base(), "Starting xffeed");

    let session = Arc::new(SessionManager::new(config, store.clone()));
    let mut session_events = session.subscribe();
    let mut views = ViewController::new(session, store);
    let mut input = Input::new();
    let mut seen = Seen::default();

    let started = views.start().await;
    show(started, &mut seen);
    println!("Type `help` for commands.");

    loop {
        prompt(&views);
        let event = tokio::select! {
            line = input.next_line() => Event::Line(line?),
            Some(message) = next_message(&mut views) => Event::Message(message),
            event = session_events.recv() => match event {
                Ok(SessionEvent::LoggedOut(LogoutReason::SessionExpired))
                | Err(broadcast::error::RecvError::Lagged(_)) => Event::SessionCheck,
                _ => Event::Ignored,
            },
        };

        match event {
            Event::Line(None) => break,
            Event::Line(Some(line)) => {
                match run_command(&mut views, &mut input, &mut seen, line.trim()).await? {
                    Flow::Continue => {}
                    Flow::Quit => break,
                }
            }
            Event::Message(message) => {
                if seen.insert(&message) {
                    println!("\r{}", message.display_line());
                }
            }
            Event::SessionCheck => {
                if !views.session().is_authenticated().await {
                    println!("\rYour session has expired. Please log in again.");
                    show(Ok(views.session_ended().await), &mut seen);
                }
            }
            Event::Ignored => {}
        }
    }

    views.release().await;
    Ok(())
}

async fn next_message(views: &mut ViewController) -> Option<ChatMessage> {
    match views.channel_mut() {
        Some(channel) => channel.recv().await,
        None => std::future::pending().await,
    }
}

async fn run_command(
    views: &mut ViewController,
    input: &mut Input,
    seen: &mut Seen,
    line: &str,
) -> std::io::Result<Flow> {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "help" => println!("{}", HELP),
        "quit" | "exit" => return Ok(Flow::Quit),
        "login" => {
            let username = input.ask("Username").await?;
            let password = input.ask("Password").await?;
            match views.login(&username, &password).await {
                Ok(screen) => show(Ok(screen), seen),
                Err(e) => show_auth_error(&e),
            }
        }
        "register" => {
            let username = input.ask("Username").await?;
            let email = input.ask("Email").await?;
            let password = input.ask("Password").await?;
            let confirm = input.ask("Confirm password").await?;
            match views.register(&username, &email, &password, &confirm).await {
                Ok(()) => println!("Registration successful! Please login."),
                Err(e) => show_auth_error(&e),
            }
        }
        "posts" => {
            let page = rest.parse().unwrap_or(1);
            show(views.show_posts(page).await, seen);
        }
        "post" => match parse_id(rest) {
            Some(id) => show(views.open_post(id).await, seen),
            None => println!("Usage: post <id>"),
        },
        "new-post" => {
            let title = input.ask("Title").await?;
            let content = input.ask("Content").await?;
            show(views.create_post(&title, &content).await, seen);
        }
        "like" => {
            let id = parse_id(rest).or(views.navigation().active_post_id);
            match id {
                Some(id) => show(views.like_post(id).await, seen),
                None => println!("Usage: like <id>"),
            }
        }
        "comment" => {
            let content = if rest.is_empty() {
                input.ask("Comment").await?
            } else {
                rest.to_string()
            };
            show(views.add_comment(&content).await, seen);
        }
        "chats" => show(views.show_chats().await, seen),
        "chat" => match parse_id(rest) {
            Some(id) => show(views.open_chat(id).await, seen),
            None => println!("Usage: chat <id>"),
        },
        "new-chat" => {
            let member = if rest.is_empty() {
                input.ask("Username").await?
            } else {
                rest.to_string()
            };
            show(views.create_chat(&member).await, seen);
        }
        "send" => match views.send_message(rest).await {
            Ok(SendRoute::Streamed) => {}
            // Posted messages only come back with the next poll.
            Ok(SendRoute::Posted) => println!("(sent)"),
            Err(RequestError::SessionExpired) => show(Ok(Screen::Login), seen),
            Err(e) => show_request_error(&e),
        },
        "back" => {
            let screen = match views.navigation().view {
                View::ChatThread => views.leave_chat().await,
                _ => views.show_posts(1).await,
            };
            show(screen, seen);
        }
        "logout" => {
            let screen = views.logout().await;
            show(Ok(screen), seen);
        }
        other => println!("Unknown command `{}`. Type `help` for commands.", other),
    }
    Ok(Flow::Continue)
}

fn parse_id(text: &str) -> Option<u64> {
    text.trim().trim_start_matches('#').parse().ok()
}

fn prompt(views: &ViewController) {
    let view = views.navigation().view;
    print!("[{} | {}] > ", view, views.channel_state());
    flush();
}

fn flush() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

fn show(screen: Result<Screen, RequestError>, seen: &mut Seen) {
    let screen = match screen {
        Ok(screen) => screen,
        Err(e) => return show_request_error(&e),
    };

    match &screen {
        Screen::Login => println!("Not logged in. Use `login` or `register`."),
        Screen::Posts { page, posts } => {
            println!("== Posts (page {}) ==", page);
            if posts.is_empty() {
                println!("No posts yet.");
            }
            for post in posts {
                let liked = if post.is_liked { "*" } else { " " };
                println!(
                    "#{:<5} {} {} by {}  [{} likes, {} comments]",
                    post.id, liked, post.title, post.author_username, post.liked_count, post.comment_count
                );
            }
        }
        Screen::PostDetail { post, comments } => {
            println!("== {} ==", post.title);
            println!("by {}  [{} likes]", post.author_username, post.liked_count);
            println!("{}", post.content);
            println!("-- Comments --");
            if comments.is_empty() {
                println!("No comments yet.");
            }
            for comment in comments {
                println!("{}: {}", comment.author_username, comment.content);
            }
        }
        Screen::Chats(chats) => {
            println!("== Chats ==");
            if chats.is_empty() {
                println!("No chats yet. Start one with `new-chat`.");
            }
            for chat in chats {
                println!("#{:<5} {}", chat.id, chat.title());
            }
        }
        Screen::ChatThread { chat, history } => {
            println!("== {} ==", chat.title());
            for message in history {
                println!("{}", message.display_line());
            }
            seen.reset(history);
        }
    }
}

fn show_auth_error(error: &AuthError) {
    println!("{}", error.user_message());
}

fn show_request_error(error: &RequestError) {
    match error.user_message() {
        Some(message) => println!("Error: {}", message),
        None => println!("Please log in."),
    }
}
