pub mod garet;
pub mod micro;
