pub mod candidate;
pub mod conversation;
pub mod executor;
pub mod naming;
pub mod presenter;
pub mod search;
pub mod session;
pub mod status;
