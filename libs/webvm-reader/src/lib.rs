use nom::error::VerboseError;

pub use class::*;
pub use consts::*;
pub use error::*;
pub use manifest::*;

mod class;
mod consts;
mod error;
mod manifest;

pub type IResult<'a, O> = nom::IResult<&'a [u8], O, VerboseError<&'a [u8]>>;
