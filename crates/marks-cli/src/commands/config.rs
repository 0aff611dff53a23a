use std::env;

use marks_core::auth::OAuthProvider;
use marks_core::config::DEFAULT_BOOKMARKS_TABLE;

use crate::cli::ConfigCommands;
use crate::config_profiles::{is_http_url, normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            table,
            provider,
            redirect_port,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            ProfileUpdate {
                supabase_url,
                supabase_anon_key,
                table,
                provider,
                redirect_port,
            },
            no_activate,
        ),
        ConfigCommands::Show { profile } => run_config_show(profile.as_deref().or(global_profile)),
    }
}

/// Values passed to `config init`; `None` keeps what the profile already has.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub table: Option<String>,
    pub provider: Option<String>,
    pub redirect_port: Option<u16>,
}

pub fn run_config_init(
    profile_name: Option<&str>,
    update: ProfileUpdate,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    apply_profile_update(config.profile_mut_or_default(&profile_name), update)?;
    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!("Profile '{}' initialized at {}", profile_name, path.display());

    let profile = config
        .profile(&profile_name)
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;
    let missing_fields = missing_fields(profile);
    if missing_fields.is_empty() {
        println!("Profile '{profile_name}' is ready. Run `marks auth login` to sign in.");
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }
    Ok(())
}

/// Merge explicit flags, then `SUPABASE_URL` / `SUPABASE_ANON_KEY`, into the
/// stored profile and validate the result.
pub fn apply_profile_update(profile: &mut CliProfile, update: ProfileUpdate) -> Result<(), CliError> {
    if let Some(url) = normalize_text_option(update.supabase_url)
        .or_else(|| normalize_text_option(env::var("SUPABASE_URL").ok()))
    {
        profile.supabase_url = Some(url.trim_end_matches('/').to_string());
    }
    if let Some(key) = normalize_text_option(update.supabase_anon_key)
        .or_else(|| normalize_text_option(env::var("SUPABASE_ANON_KEY").ok()))
    {
        profile.supabase_anon_key = Some(key);
    }
    if let Some(table) = normalize_text_option(update.table) {
        profile.table = Some(table);
    }
    if let Some(provider) = normalize_text_option(update.provider) {
        let provider = provider
            .parse::<OAuthProvider>()
            .map_err(|error| CliError::Config(error.to_string()))?;
        profile.provider = Some(provider);
    }
    if let Some(port) = update.redirect_port {
        if port == 0 {
            return Err(CliError::Config(
                "redirect_port must be between 1 and 65535".to_string(),
            ));
        }
        profile.redirect_port = Some(port);
    }

    validate_profile(profile)
}

pub fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let Some(profile) = config.profile(&profile_name) else {
        println!("Profile '{profile_name}' is not configured.");
        return Ok(());
    };

    for line in describe_profile(&profile_name, profile) {
        println!("{line}");
    }
    Ok(())
}

pub fn describe_profile(profile_name: &str, profile: &CliProfile) -> Vec<String> {
    let unset = || "(not set)".to_string();
    vec![
        format!("profile:      {profile_name}"),
        format!(
            "supabase_url: {}",
            profile.supabase_url().unwrap_or_else(unset)
        ),
        format!(
            "anon_key:     {}",
            profile
                .supabase_anon_key()
                .map_or_else(unset, |key| mask_secret(&key))
        ),
        format!(
            "table:        {}",
            profile.table.as_deref().unwrap_or(DEFAULT_BOOKMARKS_TABLE)
        ),
        format!(
            "provider:     {}",
            profile.provider.unwrap_or_default().as_str()
        ),
        format!("redirect_url: {}", profile.redirect_url()),
    ]
}

fn mask_secret(value: &str) -> String {
    let visible = value.chars().take(6).collect::<String>();
    format!("{visible}...")
}

fn missing_fields(profile: &CliProfile) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if profile.supabase_url().is_none() {
        missing.push("supabase_url");
    }
    if profile.supabase_anon_key().is_none() {
        missing.push("supabase_anon_key");
    }
    missing
}

fn validate_profile(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = profile.supabase_url() {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
    }
    if let Some(table) = profile.table.as_deref() {
        if !table
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(CliError::Config(
                "table may only contain letters, digits and underscores".to_string(),
            ));
        }
    }
    Ok(())
}
