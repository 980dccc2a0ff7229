pub mod chat;
pub mod onboard;
pub mod reset;
pub mod status;
