pub mod fee;
pub mod simulate;
pub mod waterfall;
