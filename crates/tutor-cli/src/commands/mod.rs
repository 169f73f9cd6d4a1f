pub mod chat;
pub mod history;
pub mod practice;
pub mod stats;
