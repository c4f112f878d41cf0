#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use spot_3d as s3d;

#[doc(inline)]
pub use spot_fist as fist;
