use marks_core::app::{AppEvent, BookmarkApp};
use marks_core::ChangeEvent;

use crate::commands::common::{print_bookmarks, Runtime};
use crate::error::CliError;

pub async fn run_watch(runtime: &Runtime) -> Result<(), CliError> {
    let mut app = runtime.signed_in_app(true).await?;
    render(&app);
    println!("Watching for changes. Press Ctrl-C to stop.");

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = app.next_event() => event,
        };
        let Some(event) = event else {
            println!("Change feed closed.");
            break;
        };

        if let Some(line) = describe_event(&event) {
            println!("{line}");
        }
        app.handle_event(event).await;

        if app.identity().is_none() {
            println!("Signed out.");
            break;
        }
        if let Some(notice) = app.notice() {
            eprintln!("{notice}");
            app.dismiss_notice();
        }
        render(&app);
    }

    app.teardown();
    Ok(())
}

fn render(app: &BookmarkApp) {
    if let Some(identity) = app.identity() {
        println!();
        print_bookmarks(identity, app.bookmarks());
    }
}

/// One-line summary of a remote change, `None` for events that do not need one.
pub fn describe_event(event: &AppEvent) -> Option<String> {
    match event {
        AppEvent::Change(ChangeEvent::Insert(bookmark)) => {
            Some(format!("+ {} {}", bookmark.title, bookmark.url))
        }
        AppEvent::Change(ChangeEvent::Update(bookmark)) => {
            Some(format!("~ {} {}", bookmark.title, bookmark.url))
        }
        AppEvent::Change(ChangeEvent::Delete { id }) => Some(format!("- {id}")),
        AppEvent::FeedClosed => Some("Change feed disconnected.".to_string()),
        AppEvent::Identity(_) | AppEvent::Loaded(_) | AppEvent::AuthClosed => None,
    }
}
