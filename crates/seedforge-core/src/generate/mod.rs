pub mod defaults;
pub mod generator;
pub mod pools;
pub mod value;
