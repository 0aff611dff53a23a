use std::sync::Arc;

use marks_core::app::{BookmarkApp, MutationOutcome};
use marks_core::auth::RedirectLauncher;

use crate::auth::{BrowserLauncher, PrintLauncher};
use crate::cli::AuthCommands;
use crate::commands::common::Runtime;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        AuthCommands::Login {
            profile,
            no_browser,
        } => run_login(profile.as_deref().or(global_profile), no_browser).await,
        AuthCommands::Status { profile } => run_status(profile.as_deref().or(global_profile)).await,
        AuthCommands::Logout { profile } => run_logout(profile.as_deref().or(global_profile)).await,
    }
}

async fn run_login(profile: Option<&str>, no_browser: bool) -> Result<(), CliError> {
    let launcher: Arc<dyn RedirectLauncher> = if no_browser {
        Arc::new(PrintLauncher)
    } else {
        Arc::new(BrowserLauncher)
    };
    let runtime = Runtime::open_with_launcher(profile, launcher)?;
    let mut app = BookmarkApp::new(runtime.context.clone()).without_live_updates();

    let result = runtime.browser_sign_in(&mut app).await;
    app.teardown();
    let identity = result?;

    println!(
        "Signed in profile '{}' as {}",
        runtime.profile_name,
        identity.display_name()
    );
    Ok(())
}

async fn run_status(profile: Option<&str>) -> Result<(), CliError> {
    let runtime = match Runtime::open(profile) {
        Ok(runtime) => runtime,
        Err(CliError::NotConfigured) => {
            println!("Profile is not configured.");
            return Ok(());
        }
        Err(error) => return Err(error),
    };

    let identity = runtime
        .context
        .auth
        .current_identity()
        .await
        .map_err(|error| CliError::Auth(error.to_string()))?;
    match identity {
        Some(identity) => println!(
            "Profile '{}' is signed in as {}",
            runtime.profile_name,
            identity.display_name()
        ),
        None => println!("Profile '{}' is not signed in.", runtime.profile_name),
    }
    Ok(())
}

async fn run_logout(profile: Option<&str>) -> Result<(), CliError> {
    let runtime = Runtime::open(profile)?;
    let mut app = BookmarkApp::new(runtime.context.clone()).without_live_updates();
    app.start().await;

    let outcome = app.sign_out().await;
    let notice = app.notice();
    app.teardown();
    if outcome == MutationOutcome::Failed {
        return Err(notice.map_or_else(
            || CliError::Auth("sign-out failed".to_string()),
            CliError::Action,
        ));
    }

    println!("Signed out profile '{}'", runtime.profile_name);
    Ok(())
}
