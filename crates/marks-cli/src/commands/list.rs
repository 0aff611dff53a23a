use crate::commands::common::{
    bookmark_to_list_item, format_bookmark_lines, format_header, BookmarkListItem, Runtime,
    EMPTY_LIST_MESSAGE,
};
use crate::error::CliError;

pub async fn run_list(limit: Option<usize>, as_json: bool, runtime: &Runtime) -> Result<(), CliError> {
    let mut app = runtime.signed_in_app(false).await?;
    let limit = limit.unwrap_or(usize::MAX);
    let bookmarks = app.bookmarks();

    if as_json {
        let json_items = bookmarks
            .iter()
            .take(limit)
            .map(bookmark_to_list_item)
            .collect::<Vec<BookmarkListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        if let Some(identity) = app.identity() {
            println!("{}", format_header(identity, bookmarks.len()));
        }
        if bookmarks.is_empty() {
            println!("{EMPTY_LIST_MESSAGE}");
        }
        for line in format_bookmark_lines(bookmarks.iter().take(limit)) {
            println!("{line}");
        }
    }

    app.teardown();
    Ok(())
}
