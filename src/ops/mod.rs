pub mod coordinator;
pub mod group_ops;
pub mod store;
pub mod view;
