pub mod codec;
pub mod datum;
pub mod error;
pub mod lazy;
pub mod ordering;
