pub mod app;
pub mod config;
pub mod details;
pub mod domain;
pub mod error;
pub mod fanout;
pub mod insight;
pub mod normalize;
pub mod osdr;
pub mod output;
pub mod query;
pub mod session;
pub mod view;
