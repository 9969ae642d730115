pub mod extraction;
pub mod condense;
pub mod reply;
pub mod processor;
