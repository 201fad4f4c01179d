pub mod drain;
pub mod enqueue;
pub mod purge;
pub mod run;
pub mod status;
