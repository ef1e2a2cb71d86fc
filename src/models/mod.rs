pub mod chunk;
pub mod meeting;
pub mod transcript;

pub use chunk::*;
pub use meeting::*;
pub use transcript::*;
