use marks_core::app::MutationOutcome;

use crate::commands::common::Runtime;
use crate::error::CliError;

pub async fn run_add(url: &str, title_parts: &[String], runtime: &Runtime) -> Result<(), CliError> {
    let title = title_parts.join(" ");
    if url.trim().is_empty() || title.trim().is_empty() {
        return Err(CliError::EmptyBookmark);
    }

    let mut app = runtime.signed_in_app(false).await?;
    let outcome = app.add_bookmark(url, &title).await;
    let result = match outcome {
        MutationOutcome::Applied => {
            if let Some(bookmark) = app.bookmarks().iter().next() {
                println!("{}", bookmark.id);
            }
            Ok(())
        }
        MutationOutcome::Skipped => Err(CliError::EmptyBookmark),
        MutationOutcome::Failed => Err(app
            .notice()
            .map_or(CliError::EmptyBookmark, CliError::Action)),
    };
    app.teardown();
    result
}
