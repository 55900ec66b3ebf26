// Library for tests to access modules

pub mod broadcaster;
pub mod config;
pub mod file_watcher;
pub mod models;
pub mod registry;
pub mod routes;
pub mod services;
pub mod sysinfo_repo;
