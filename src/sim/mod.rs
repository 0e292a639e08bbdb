pub mod board;
pub mod content;
pub mod event;
pub mod scheduler;
pub mod session;
