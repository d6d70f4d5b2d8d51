//! Application orchestration module

pub mod application;
pub mod handle;
pub mod initialization;
pub mod execution;
pub mod repository;

pub use application::{Application, LoadReport};
pub use handle::{AppHandle, AppState, Route};
pub use repository::resolve_repository_path;
pub use initialization::{
    load_configuration,
    configure_logging,
    build_site_config,
};
pub use execution::{
    list_modules,
    load_plugins,
    show_status,
};
