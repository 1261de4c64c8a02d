pub mod library;
pub mod tagging;
