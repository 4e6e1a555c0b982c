pub mod core;
pub mod drafts;
pub mod nav;
pub mod people;
pub mod schedule;
