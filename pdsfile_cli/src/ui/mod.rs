pub mod formatter;
pub mod printer;
