//! The filler: reads ahead from the source on its own thread.

mod control;
mod fill;
mod thread;
mod wake;

pub(crate) use thread::FillerThread;
pub(crate) use wake::{wake_channel, Waker};
