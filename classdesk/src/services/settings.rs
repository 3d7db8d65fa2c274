//! Settings service
//!
//! User profile and application settings, both stored locally.

use crate::database::{AppSettings, NotificationSettings, Theme, UserProfile};
use crate::error::{AppError, Result};
use crate::storage::LocalStore;

#[derive(Clone)]
pub struct SettingsService {
    store: LocalStore,
}

impl SettingsService {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn get_profile(&self) -> Result<Option<UserProfile>> {
        self.store.get_user_profile()
    }

    pub fn save_profile(&self, profile: UserProfile) -> Result<UserProfile> {
        let profile = UserProfile {
            name: profile.name.trim().to_string(),
            title: profile.title.trim().to_string(),
            branch: profile.branch.trim().to_string(),
            profile_image: profile.profile_image,
        };
        if profile.name.is_empty() {
            return Err(AppError::Validation("Name is required".into()));
        }

        self.store.save_user_profile(&profile)?;
        tracing::info!("Profile saved for {}", profile.name);
        Ok(profile)
    }

    pub fn get_settings(&self) -> Result<AppSettings> {
        self.store.get_app_settings()
    }

    pub fn save_settings(&self, settings: &AppSettings) -> Result<()> {
        self.store.save_app_settings(settings)?;
        tracing::info!("Settings saved");
        Ok(())
    }

    pub fn set_theme(&self, theme: Theme) -> Result<AppSettings> {
        let mut settings = self.get_settings()?;
        settings.theme = theme;
        self.save_settings(&settings)?;
        Ok(settings)
    }

    /// Change the given notification channels, leaving the others as they are
    pub fn set_notifications(&self, email: Option<bool>, push: Option<bool>) -> Result<AppSettings> {
        let mut settings = self.get_settings()?;
        let current = settings.notifications;
        settings.notifications = NotificationSettings {
            email: email.unwrap_or(current.email),
            push: push.unwrap_or(current.push),
        };
        self.save_settings(&settings)?;
        Ok(settings)
    }
}
