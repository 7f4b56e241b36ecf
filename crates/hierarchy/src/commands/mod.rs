pub mod browse;
pub mod serve;
