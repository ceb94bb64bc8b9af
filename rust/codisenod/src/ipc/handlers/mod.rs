pub mod catalog;
pub mod core;
pub mod document;
pub mod export;
pub mod project;
