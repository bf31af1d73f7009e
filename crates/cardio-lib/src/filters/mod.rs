pub mod median;
pub mod rr;
