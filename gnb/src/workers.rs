//! Worker threads
//!
//! mac2phy, phy2mac and the URLLC worker are plain OS threads pinned to
//! their configured core and promoted to a real-time policy. Failing to
//! pin or promote (no CAP_SYS_NICE, core offline) is only a warning.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use layers::urllc::{self, UrllcMailbox};
use layers::{mac2phy, phy2mac, PhyContext};
use tracing::{error, info, warn};

use crate::config::{WorkerConfig, SCHED_RR};

/// Upper bound on one blocking receive so the exit flag is seen
pub const POLL_TIMEOUT: Duration = Duration::from_millis(10);

#[cfg(target_os = "linux")]
fn pin_to_core(core_id: usize) -> io::Result<()> {
    if core_id >= libc::CPU_SETSIZE as usize {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "core id beyond CPU_SETSIZE"));
    }
    // SAFETY: cpu_set_t is plain data; all-zeroes is the empty set.
    unsafe {
        let mut cpuset: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut cpuset);
        libc::CPU_SET(core_id, &mut cpuset);
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &cpuset) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn set_realtime(policy: u8, priority: u8) -> io::Result<()> {
    let policy = if policy == SCHED_RR { libc::SCHED_RR } else { libc::SCHED_FIFO };
    let param = libc::sched_param { sched_priority: i32::from(priority) };
    // SAFETY: pthread_self is always valid for the calling thread.
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), policy, &param) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn pin_to_core(_core_id: usize) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "core pinning needs Linux"))
}

#[cfg(not(target_os = "linux"))]
fn set_realtime(_policy: u8, _priority: u8) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "real-time scheduling needs Linux"))
}

fn place(name: &str, cfg: &WorkerConfig) {
    match pin_to_core(usize::from(cfg.core_id)) {
        Ok(()) => info!("[{}] pinned to core {}", name, cfg.core_id),
        Err(e) => warn!("[{}] cannot pin to core {}: {}", name, cfg.core_id, e),
    }
    if let Err(e) = set_realtime(cfg.thread_sched_policy, cfg.thread_priority) {
        warn!("[{}] cannot set policy {} priority {}: {}", name, cfg.thread_sched_policy, cfg.thread_priority, e);
    }
}

/// Spawn `body` on a named thread placed per `cfg`
pub fn spawn<F>(name: &'static str, cfg: WorkerConfig, body: F) -> anyhow::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            place(name, &cfg);
            info!("[{}] worker started", name);
            body();
            info!("[{}] worker stopped", name);
        })
        .with_context(|| format!("cannot spawn {}", name))
}

pub fn mac2phy_loop(ctx: Arc<PhyContext>, mailbox: Option<Arc<UrllcMailbox>>) {
    while !ctx.exiting() {
        if let Err(e) = mac2phy::poll(&ctx, Some(POLL_TIMEOUT), mailbox.as_deref()) {
            error!("[MAC2PHY] {}", e);
        }
    }
}

pub fn phy2mac_loop(ctx: Arc<PhyContext>, mailbox: Option<Arc<UrllcMailbox>>) {
    while !ctx.exiting() {
        if let Err(e) = phy2mac::poll(&ctx, Some(POLL_TIMEOUT), mailbox.as_deref()) {
            error!("[PHY2MAC] {}", e);
        }
    }
}

pub fn urllc_loop(ctx: Arc<PhyContext>, mailbox: Arc<UrllcMailbox>) {
    while urllc::serve(&ctx, &mailbox, Some(POLL_TIMEOUT)) {}
}

/// The three worker threads of one translation process
pub struct Workers {
    handles: Vec<JoinHandle<()>>,
    mailbox: Arc<UrllcMailbox>,
}

impl Workers {
    pub fn start(
        ctx: &Arc<PhyContext>,
        mac2phy: WorkerConfig,
        phy2mac: WorkerConfig,
        urllc: WorkerConfig,
    ) -> anyhow::Result<Self> {
        let mailbox = Arc::new(UrllcMailbox::new("urllc"));
        let handles = vec![
            spawn("urllc", urllc, {
                let (ctx, mailbox) = (Arc::clone(ctx), Arc::clone(&mailbox));
                move || urllc_loop(ctx, mailbox)
            })?,
            spawn("phy2mac", phy2mac, {
                let (ctx, mailbox) = (Arc::clone(ctx), Arc::clone(&mailbox));
                move || phy2mac_loop(ctx, Some(mailbox))
            })?,
            spawn("mac2phy", mac2phy, {
                let (ctx, mailbox) = (Arc::clone(ctx), Arc::clone(&mailbox));
                move || mac2phy_loop(ctx, Some(mailbox))
            })?,
        ];
        Ok(Self { handles, mailbox })
    }

    /// Raise the exit flag and join every worker; a receive in progress
    /// completes one more cycle first
    pub fn stop(self, ctx: &PhyContext) {
        ctx.request_exit();
        self.mailbox.close();
        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!("{} worker panicked", name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SCHED_FIFO;

    #[test]
    fn test_spawn_runs_body_despite_placement_failure() {
        // Core 1023 is offline on any test host and RT priority needs privileges
        let cfg = WorkerConfig { core_id: 1023, thread_sched_policy: SCHED_FIFO, thread_priority: 99 };
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = spawn("test", cfg, move || tx.send(42).unwrap()).unwrap();
        handle.join().unwrap();
        assert_eq!(rx.recv().unwrap(), 42);
    }
}
