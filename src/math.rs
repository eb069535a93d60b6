pub mod reward;
pub mod risk;
