pub mod generate;
pub mod recolor;
