pub mod loose;
pub mod messages;
