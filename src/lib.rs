pub mod ast;
pub mod compiler;
pub mod error;
pub mod keywords;
pub mod parser;
pub mod ranking;
pub mod scan;

pub use ast::Query;
pub use error::{PqlError, Result};
pub use parser::parse;
pub use ranking::compare_clauses;
