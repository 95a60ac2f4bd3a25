pub mod errors;
pub mod observability;
pub mod openapi;
pub mod routes;
pub mod startup;

pub use routes::auth;
pub use startup::run;
