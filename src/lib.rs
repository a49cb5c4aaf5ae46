pub mod cli;
pub mod config;
pub mod error;
pub mod services;

#[cfg(test)]
pub mod test_support;
