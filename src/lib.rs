pub mod config;
pub mod epa;
pub mod formula;
pub mod http_client;
pub mod pairwise_api;
pub mod picklist;
pub mod picklist_export;
pub mod scout_store;
pub mod service;
pub mod tba;
pub mod ttl_cache;
pub mod variability;
