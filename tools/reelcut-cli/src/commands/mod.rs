pub mod check;
pub mod probe;
pub mod produce;
pub mod validate;
