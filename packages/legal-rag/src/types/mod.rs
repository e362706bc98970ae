pub mod answer;
pub mod config;
pub mod document;
pub mod topic;
