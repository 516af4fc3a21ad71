pub mod cbc;
pub mod padding;

pub use cbc::CBCMode;

use thiserror;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid input size")]
    InvalidInputSize,

    #[error("invalid IV size, want {}, got {}", .0, .1)]
    InvalidIvSize(usize, usize),

    #[error("invalid key size {}", .0)]
    InvalidKeySize(usize),

    #[error("invalid padding")]
    InvalidPadding,
}
pub type Result<T> = core::result::Result<T, Error>;
