// Core modules implementing schema compilation, decoding, and error modeling.
pub mod ast;
pub mod decode;
pub mod descriptor;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod resolve;
