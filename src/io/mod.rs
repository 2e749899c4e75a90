pub mod base;
pub mod mpmc;
pub mod ringbuffer;

pub use base::{BaseRx, BaseTx};
pub use mpmc::{MpmcChannel, MpmcReceiver, MpmcSender};
pub use ringbuffer::{RingBuffer, RingReceiver, RingSender};
