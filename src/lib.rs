// Library for tests to access modules

pub mod agent;
pub mod config;
pub mod disk_resolver;
pub mod docker_repo;
pub mod gpu;
pub mod logging;
pub mod models;
pub mod network_accountant;
pub mod routes;
pub mod sensors;
pub mod sysinfo_repo;
pub mod units;
pub mod version;
