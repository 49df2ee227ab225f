pub mod catalog;
pub mod random;
pub mod resolver;
