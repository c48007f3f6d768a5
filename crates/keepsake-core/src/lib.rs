pub mod branch;
pub mod carousel;
pub mod closing;
pub mod config;
pub mod error;
pub mod flow;
pub mod media;

pub use branch::*;
pub use carousel::*;
pub use closing::*;
pub use config::*;
pub use error::*;
pub use flow::*;
pub use media::*;
