pub mod clipfile;
pub mod reader;
pub mod rigfile;
