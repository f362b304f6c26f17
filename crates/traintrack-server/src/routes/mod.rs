pub mod artifacts;
pub mod datasets;
pub mod home;
pub mod models;
pub mod users;
