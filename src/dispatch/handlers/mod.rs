pub mod close;
pub mod create;
pub mod delete;
pub mod echo;
pub mod negotiate;
pub mod read;
pub mod session_setup;
pub mod trans2;
pub mod tree_connect;
pub mod write;
