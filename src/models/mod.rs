pub mod booking;
pub mod driver;
