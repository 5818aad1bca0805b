pub mod api;
pub mod app;
pub mod codec;
pub mod composer;
pub mod config;
pub mod dashboard;
pub mod geo;
pub mod models;
pub mod redirect;
pub mod storage;

mod html;

pub use app::{create_app, open_store};
