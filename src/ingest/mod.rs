pub mod chunker;
pub mod normalize;
pub mod parser;
pub mod upload;

pub use chunker::*;
pub use normalize::*;
pub use parser::*;
pub use upload::*;
