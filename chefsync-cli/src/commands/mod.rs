pub mod master;
pub mod output;
pub mod slave;
pub mod status;
