pub mod decoder;
pub mod scan;
