// Infrastructure layer - External dependencies and adapters
pub mod chunked_json;
pub mod config;
pub mod file_store;
pub mod footprint_loader;
pub mod geojson_mapper;
pub mod http_response;
pub mod memory_store;
pub mod pvgis_client;
