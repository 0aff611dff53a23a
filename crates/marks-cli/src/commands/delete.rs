use marks_core::app::MutationOutcome;

use crate::commands::common::{normalize_bookmark_identifier, resolve_bookmark_id, Runtime};
use crate::error::CliError;

pub async fn run_delete(id: &str, runtime: &Runtime) -> Result<(), CliError> {
    let normalized_id = normalize_bookmark_identifier(id)?;
    let mut app = runtime.signed_in_app(false).await?;

    let result = match resolve_bookmark_id(&normalized_id, app.bookmarks()) {
        Ok(bookmark_id) => match app.delete_bookmark(&bookmark_id).await {
            MutationOutcome::Failed => Err(app
                .notice()
                .map_or(CliError::NotSignedIn, CliError::Action)),
            MutationOutcome::Skipped => Err(CliError::NotSignedIn),
            MutationOutcome::Applied => {
                println!("{bookmark_id}");
                Ok(())
            }
        },
        Err(error) => Err(error),
    };
    app.teardown();
    result
}
