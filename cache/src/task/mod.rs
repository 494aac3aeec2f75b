//! Background machinery for expiration: the timer wheel that tracks every
//! entry's deadline and the driver thread that advances it.

pub(crate) mod driver;
pub(crate) mod timer;
