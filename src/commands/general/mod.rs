pub mod health;
pub mod help;
