// Utility functions
pub mod error;
pub mod validation;
