pub mod archive;
pub mod assoc;
pub mod list;
pub mod neighbors;
pub mod paths;
pub mod resolve;
pub mod versions;
