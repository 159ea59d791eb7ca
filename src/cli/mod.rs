pub mod audit;
pub mod mask;
pub mod serve;
