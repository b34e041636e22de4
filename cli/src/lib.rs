pub mod level;
pub mod test_runner;
