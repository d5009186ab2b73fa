pub mod lifecycle;
pub mod manager;
pub mod poller;
pub mod slider;
