//! Application state and initialization
//!
//! Connects both stores once at startup and builds every service on top
//! of them. The rest of the program only sees `AppState`.

use crate::config::AppConfig;
use crate::database::{DocumentStore, RemoteStore, Repository};
use crate::error::Result;
use crate::services::{
    AttendanceService, LessonPlanService, NotesService, ReportService, RosterService,
    SettingsService,
};
use crate::storage::LocalStore;
use std::path::PathBuf;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState<S = RemoteStore> {
    pub data_dir: PathBuf,
    pub local_store: LocalStore,
    pub roster: RosterService<S>,
    pub attendance: AttendanceService<S>,
    pub reports: ReportService<S>,
    pub notes: NotesService,
    pub lesson_plans: LessonPlanService,
    pub settings: SettingsService,
}

impl<S: DocumentStore> AppState<S> {
    pub fn new(data_dir: PathBuf, store: S, local_store: LocalStore) -> Self {
        let repo = Repository::new(store);

        Self {
            data_dir,
            roster: RosterService::new(repo.clone()),
            attendance: AttendanceService::new(repo.clone()),
            reports: ReportService::new(repo),
            notes: NotesService::new(local_store.clone()),
            lesson_plans: LessonPlanService::new(local_store.clone()),
            settings: SettingsService::new(local_store.clone()),
            local_store,
        }
    }
}

impl AppState<RemoteStore> {
    /// Application setup - called once on startup
    pub async fn initialize(config: &AppConfig) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("Data directory: {:?}", config.data_dir);

        std::fs::create_dir_all(&config.data_dir)?;

        let store = RemoteStore::connect(&config.remote).await?;
        let local_store = LocalStore::open(&config.local_storage_dir());

        tracing::info!("Application initialized successfully");

        Ok(Self::new(config.data_dir.clone(), store, local_store))
    }
}
