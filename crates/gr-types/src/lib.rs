pub mod dates;
pub mod errors;
pub mod exposure;
pub mod hedge;
pub mod market;
pub mod procurement;

pub use dates::*;
pub use errors::*;
pub use exposure::*;
pub use hedge::*;
pub use market::*;
pub use procurement::*;
