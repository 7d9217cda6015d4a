pub mod condition;
pub mod constraints;
pub mod foreign_key;
