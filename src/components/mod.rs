pub mod comparison;
pub mod history;
pub mod stroke;
pub mod tools;
