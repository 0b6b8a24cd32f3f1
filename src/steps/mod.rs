pub mod collect;
pub mod disk;
pub mod install;
pub mod mount;
pub mod network;
