pub mod controller;
pub mod handlers;
pub mod pages;
pub mod routes;

pub use controller::{PageLoad, Phase, RecordOutcome, Redirect, RedirectController, TRACKING_PARAM};
pub use handlers::RedirectState;
pub use routes::create_redirect_router;
