pub mod path;
pub mod prompt;
