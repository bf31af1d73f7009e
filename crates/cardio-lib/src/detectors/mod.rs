pub mod ecg;
pub mod pulse;
