pub mod convert;
pub mod docs;
