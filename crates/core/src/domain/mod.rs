pub mod conversation;
pub mod license;
pub mod terms;
