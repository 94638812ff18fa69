pub mod repository_finder;
pub mod repository_scanner;
pub mod repository_workflow;
pub mod script_scanner;
pub mod update_applier;
pub mod update_service;
pub mod version_control;
