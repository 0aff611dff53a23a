//! Interactive session: reads commands from stdin while applying remote
//! changes as they arrive.

use marks_core::app::{AppEvent, BookmarkApp, MutationOutcome, ViewState};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::common::{
    normalize_bookmark_identifier, print_bookmarks, resolve_bookmark_id, Runtime,
};
use crate::commands::watch::describe_event;
use crate::error::CliError;

const HELP: &str = "\
Commands:
  add <url> <title...>   save a bookmark
  rm <id>                delete a bookmark (full id or unique prefix)
  ls                     show bookmarks
  reload                 fetch bookmarks again
  login                  sign in through the browser
  logout                 sign out
  help                   show this help
  quit                   leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Add { url: String, title: String },
    Delete(String),
    List,
    Reload,
    Login,
    Logout,
    Help,
    Quit,
    Empty,
}

pub fn parse_shell_command(line: &str) -> Result<ShellCommand, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(ShellCommand::Empty);
    };

    match command.to_ascii_lowercase().as_str() {
        "add" | "new" => {
            let url = words.next().ok_or("usage: add <url> <title...>")?;
            let title = words.collect::<Vec<_>>().join(" ");
            if title.is_empty() {
                return Err("usage: add <url> <title...>".to_string());
            }
            Ok(ShellCommand::Add {
                url: url.to_string(),
                title,
            })
        }
        "rm" | "delete" => words
            .next()
            .map(|id| ShellCommand::Delete(id.to_string()))
            .ok_or_else(|| "usage: rm <id>".to_string()),
        "ls" | "list" => Ok(ShellCommand::List),
        "reload" => Ok(ShellCommand::Reload),
        "login" => Ok(ShellCommand::Login),
        "logout" => Ok(ShellCommand::Logout),
        "help" | "?" => Ok(ShellCommand::Help),
        "quit" | "exit" | "q" => Ok(ShellCommand::Quit),
        other => Err(format!("unknown command '{other}'; type `help`")),
    }
}

enum Input {
    Line(Option<String>),
    App(Option<AppEvent>),
}

pub async fn run_shell(runtime: &Runtime) -> Result<(), CliError> {
    let mut app = BookmarkApp::new(runtime.context.clone());
    app.start().await;
    render(&app);
    println!("Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line?),
            event = app.next_event() => Input::App(event),
        };

        match input {
            Input::Line(None) => break,
            Input::Line(Some(line)) => match parse_shell_command(&line) {
                Ok(ShellCommand::Quit) => break,
                Ok(command) => run_command(command, &mut app, runtime).await,
                Err(message) => eprintln!("{message}"),
            },
            Input::App(Some(event)) => {
                if let Some(line) = describe_event(&event) {
                    println!("{line}");
                }
                let was_signed_in = app.identity().is_some();
                app.handle_event(event).await;
                if was_signed_in != app.identity().is_some() {
                    render(&app);
                }
            }
            // Nothing to wait for besides stdin.
            Input::App(None) => {
                if let Some(line) = lines.next_line().await? {
                    match parse_shell_command(&line) {
                        Ok(ShellCommand::Quit) => break,
                        Ok(command) => run_command(command, &mut app, runtime).await,
                        Err(message) => eprintln!("{message}"),
                    }
                } else {
                    break;
                }
            }
        }
        report_notice(&mut app);
    }

    app.teardown();
    Ok(())
}

async fn run_command(command: ShellCommand, app: &mut BookmarkApp, runtime: &Runtime) {
    match command {
        ShellCommand::Add { url, title } => {
            let outcome = app.add_bookmark(&url, &title).await;
            if outcome == MutationOutcome::Skipped {
                eprintln!("Sign in and provide both a URL and a title.");
            }
        }
        ShellCommand::Delete(id) => {
            let resolved = normalize_bookmark_identifier(&id)
                .and_then(|id| resolve_bookmark_id(&id, app.bookmarks()));
            match resolved {
                Ok(id) => {
                    if app.delete_bookmark(&id).await == MutationOutcome::Skipped {
                        eprintln!("Sign in first.");
                    }
                }
                Err(error) => eprintln!("{error}"),
            }
        }
        ShellCommand::List => render(app),
        ShellCommand::Reload => {
            if app.reload().await == MutationOutcome::Skipped {
                eprintln!("Sign in first.");
            }
        }
        ShellCommand::Login => {
            if let Err(error) = runtime.browser_sign_in(app).await {
                eprintln!("{error}");
            }
        }
        ShellCommand::Logout => {
            app.sign_out().await;
        }
        ShellCommand::Help => println!("{HELP}"),
        ShellCommand::Quit | ShellCommand::Empty => {}
    }
}

fn render(app: &BookmarkApp) {
    match app.view_state() {
        ViewState::Loading => println!("Loading..."),
        ViewState::SignedOut => println!("Signed out. Type `login` to sign in."),
        ViewState::SignedIn(identity) => print_bookmarks(&identity, app.bookmarks()),
    }
}

fn report_notice(app: &mut BookmarkApp) {
    if let Some(notice) = app.notice() {
        eprintln!("{notice}");
        app.dismiss_notice();
    }
}
