pub mod api;
pub mod archive;
pub mod assemble;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod output;
pub mod registry;
pub mod schema;
pub mod sdmx;
pub mod sdr;
pub mod table;
pub mod version;
pub mod weo;
