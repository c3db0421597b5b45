pub mod build;
pub mod deploy;
pub mod dev;
pub mod serve;
pub mod task;
