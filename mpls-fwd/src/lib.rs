fn _prevent_compilation() {
    #[cfg(any(not(target_pointer_width = "64"), not(target_os = "linux")))]
    compile_error!("This crate can only be used on 64-bit Linux system.");
}

pub mod error;

mod mbuf;
pub use mbuf::{free_batch, HeapMbuf, Mbuf, MbufMut};

mod mempool;
pub use mempool::{Mempool, MempoolConf};

mod port;
pub use port::{Port, RingConf, RingPort, RingRxQueue, RingTxQueue, RxQueue, TxQueue};

pub mod transform;

pub mod corelist;
pub use corelist::CoreSet;

mod stream;
pub use stream::{assign_streams, select_ports, FwdStream, PortRoles, StreamPort};

mod conf;
pub use conf::FwdConfig;

mod engine;
pub use engine::{DirStats, FwdWorker, StreamStats, MAX_PKT_BURST};

mod lcore;
pub use lcore::{detect_lcores, launch, pin_current, Lcore};
