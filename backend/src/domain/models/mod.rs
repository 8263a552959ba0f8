pub mod child;
pub mod events;
