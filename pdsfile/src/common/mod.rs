pub mod category;
pub mod constants;
pub mod memo;
pub mod version;
