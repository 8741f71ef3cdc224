pub mod admin;
pub mod events;
pub mod portal;
pub mod public;
