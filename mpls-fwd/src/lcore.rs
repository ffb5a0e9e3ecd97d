use std::cell::Cell;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::{info, warn};

use crate::corelist::MAX_LCORE;
use crate::engine::{FwdWorker, StreamStats};
use crate::error::*;
use crate::port::Port;

const MAX_NUMA_NODES: u32 = 8;

thread_local! {
    static LCORE: Cell<Option<Lcore>> = const { Cell::new(None) };
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Lcore {
    pub lcore_id: u32,
    pub cpu_id: u32,
    pub socket_id: u32,
}

impl Lcore {
    /// The lcore the calling thread was pinned to, if any.
    pub fn current() -> Option<Lcore> {
        LCORE.with(|tl| tl.get())
    }
}

/// Enumerate the cpus the kernel exposes under sysfs, ordered by lcore id.
pub fn detect_lcores() -> Vec<Lcore> {
    (0..MAX_LCORE as u32)
        .filter(|id| cpu_detected(*id))
        .map(|lcore_id| Lcore {
            lcore_id,
            cpu_id: cpu_core_id(lcore_id).unwrap_or(lcore_id),
            socket_id: cpu_socket_id(lcore_id).unwrap_or(0),
        })
        .collect()
}

fn cpu_detected(lcore_id: u32) -> bool {
    PathBuf::from("/sys/devices/system/cpu")
        .join(format!("cpu{}", lcore_id))
        .join("topology/core_id")
        .exists()
}

fn cpu_socket_id(lcore_id: u32) -> Option<u32> {
    (0..MAX_NUMA_NODES).find(|socket_id| {
        PathBuf::from("/sys/devices/system/node")
            .join(format!("node{}", socket_id))
            .join(format!("cpu{}", lcore_id))
            .exists()
    })
}

fn cpu_core_id(lcore_id: u32) -> Option<u32> {
    let sys_file = PathBuf::from("/sys/devices/system/cpu")
        .join(format!("cpu{}", lcore_id))
        .join("topology/core_id");

    let mut file = File::open(sys_file).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse::<u32>().ok()
}

/// Bind the calling thread to `lcore_id`.
///
/// # Errors
///
/// Fails with `ServiceError` if the thread is already pinned, if the id does
/// not fit a cpu set, or if the kernel refuses the affinity.
pub fn pin_current(lcore_id: u32) -> Result<()> {
    if Lcore::current().is_some() {
        return Error::service_err("thread is pinned").to_err();
    }
    let cpu = usize::try_from(lcore_id)
        .ok()
        .filter(|cpu| *cpu < libc::CPU_SETSIZE as usize)
        .ok_or_else(|| Error::service_err(format!("lcore {} is out of range", lcore_id)))?;

    let res = unsafe {
        let mut cpu_set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut cpu_set);
        libc::CPU_SET(cpu, &mut cpu_set);
        libc::sched_setaffinity(
            0,
            std::mem::size_of::<libc::cpu_set_t>(),
            &cpu_set as *const libc::cpu_set_t,
        )
    };
    if res != 0 {
        return Error::service_err(format!(
            "fail to set thread affinity to lcore {}: {}",
            lcore_id,
            std::io::Error::last_os_error()
        ))
        .to_err();
    }

    LCORE.with(|tl| {
        tl.set(Some(Lcore {
            lcore_id,
            cpu_id: cpu_core_id(lcore_id).unwrap_or(lcore_id),
            socket_id: cpu_socket_id(lcore_id).unwrap_or(0),
        }))
    });
    Ok(())
}

/// Run every worker on its own thread, pinned to the lcore of its stream, and
/// wait until all of them observe `stop`.
///
/// A worker that cannot be pinned still runs, unpinned. A pinned worker warns
/// about stream ports on another NUMA socket. If a thread cannot be spawned,
/// `stop` is raised, the threads already running are joined and the call
/// fails with `ServiceError`. A panicking worker raises `stop` as well, so the
/// other workers wind down and the call fails with `ServiceError`.
pub fn launch<P: Port>(workers: Vec<FwdWorker<P>>, stop: &AtomicBool) -> Result<Vec<StreamStats>> {
    thread::scope(|s| {
        let mut handles = Vec::with_capacity(workers.len());

        for mut worker in workers {
            let lcore_id = worker.stream().lcore_id;
            let res = thread::Builder::new()
                .name(format!("mplsfwd-lcore{}", lcore_id))
                .spawn_scoped(s, move || {
                    let _guard = StopOnPanic(stop);
                    match pin_current(lcore_id) {
                        Ok(()) => {
                            if let Some(lcore) = Lcore::current() {
                                worker.check_numa(lcore.socket_id);
                            }
                        }
                        Err(e) => warn!(lcore = lcore_id, error = %e, "running unpinned"),
                    }
                    worker.run(stop)
                });

            match res {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    abort_launch(handles, stop);
                    return Error::service_err(format!(
                        "fail to launch lcore {}: {}",
                        lcore_id, e
                    ))
                    .to_err();
                }
            }
        }
        info!(nb_streams = handles.len(), "all forwarding streams launched");

        let joined: Vec<_> = handles.into_iter().map(|handle| handle.join()).collect();
        joined
            .into_iter()
            .map(|res| res.map_err(|_| Error::service_err("forwarding thread panicked")))
            .collect()
    })
}

// Raise `stop` and join every launched thread. Returns the number of threads
// that panicked.
fn abort_launch<T>(handles: Vec<thread::ScopedJoinHandle<'_, T>>, stop: &AtomicBool) -> usize {
    stop.store(true, Ordering::Release);
    let mut nb_panicked = 0;
    for handle in handles {
        if handle.join().is_err() {
            warn!("forwarding thread panicked while launch was aborted");
            nb_panicked += 1;
        }
    }
    nb_panicked
}

// Raises the stop flag when the owning thread unwinds.
struct StopOnPanic<'a>(&'a AtomicBool);

impl Drop for StopOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.store(true, Ordering::Release);
        }
    }
}
