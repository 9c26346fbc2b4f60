pub mod adapter;
pub mod config_io;
pub mod data_dir;
pub mod local_store;
pub mod lock;
pub mod recovery;
pub mod remote;
pub mod session;

#[cfg(test)]
pub mod testing;
