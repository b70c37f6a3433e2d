pub mod middleware;
pub mod rejection;
pub mod token;
