pub mod completions;
pub mod hook;
pub mod report;
pub mod rules;
