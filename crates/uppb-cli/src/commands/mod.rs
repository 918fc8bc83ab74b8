pub mod bootstrap;
pub mod build;
pub mod list;
