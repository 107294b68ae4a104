pub mod ask;
pub mod serve;
pub mod status;
