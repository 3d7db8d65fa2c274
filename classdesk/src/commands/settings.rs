//! Profile and settings commands

use super::read_image;
use crate::app::AppState;
use crate::cli::SettingsCommand;
use crate::database::{AppSettings, Theme, UserProfile};
use crate::error::Result;
use crate::services::data_url;

pub fn settings<S>(state: &AppState<S>, cmd: SettingsCommand) -> Result<String> {
    let service = &state.settings;

    match cmd {
        SettingsCommand::Show => {
            let profile = service.get_profile()?;
            let settings = service.get_settings()?;
            let mut output = format_profile(profile.as_ref());
            output.push_str(&format_settings(&settings));
            if !state.local_store.is_available() {
                output.push_str("(local storage unavailable, changes are not saved)\n");
            }
            Ok(output)
        }
        SettingsCommand::Theme { theme } => {
            let settings = service.set_theme(theme)?;
            Ok(format_settings(&settings))
        }
        SettingsCommand::Notifications { email, push } => {
            let settings = service.set_notifications(email, push)?;
            Ok(format_settings(&settings))
        }
        SettingsCommand::Profile {
            name,
            title,
            branch,
            image,
        } => {
            let current = service.get_profile()?;
            let mut profile = current.unwrap_or(UserProfile {
                name: String::new(),
                title: String::new(),
                branch: String::new(),
                profile_image: None,
            });
            if let Some(name) = name {
                profile.name = name;
            }
            if let Some(title) = title {
                profile.title = title;
            }
            if let Some(branch) = branch {
                profile.branch = branch;
            }
            if let Some(path) = image {
                let (bytes, mime) = read_image(&path)?;
                profile.profile_image = Some(data_url::encode(&mime, &bytes));
            }

            let saved = service.save_profile(profile)?;
            Ok(format_profile(Some(&saved)))
        }
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

pub fn format_profile(profile: Option<&UserProfile>) -> String {
    match profile {
        Some(profile) => format!(
            "Name:    {}\nTitle:   {}\nBranch:  {}\nPhoto:   {}\n",
            profile.name,
            profile.title,
            profile.branch,
            if profile.profile_image.is_some() { "set" } else { "none" }
        ),
        None => "No profile saved\n".to_string(),
    }
}

pub fn format_settings(settings: &AppSettings) -> String {
    let theme = match settings.theme {
        Theme::Light => "light",
        Theme::Dark => "dark",
    };
    format!(
        "Theme:   {}\nEmail:   {}\nPush:    {}\n",
        theme,
        on_off(settings.notifications.email),
        on_off(settings.notifications.push)
    )
}
