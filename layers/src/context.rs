//! Translation Context
//!
//! One `PhyContext` is built at start-up and shared by reference with every
//! worker. It owns the per-cell instances, both WLS sessions and the
//! outbound queues of both directions.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use interfaces::fapi::FapiMessage;
use interfaces::iapi::IapiMessage;
use interfaces::wls::{BufferPool, WlsSession, WlsTransport, Reclaim};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tracing::{debug, info};

use crate::queue::{Fapi2MacQueues, Fapi2PhyQueue};
use crate::stats::{PhyStats, PhyStatsEntry, StatsSnapshot};
use crate::ul_slot::UlSlotTable;
use crate::FapiError;

/// Physical cells handled by one translation process
pub const MAX_PHY_INSTANCES: usize = 12;

/// Per-cell lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum PhyState {
    #[default]
    Idle,
    Configured,
    Running,
}

impl std::fmt::Display for PhyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PhyState::Idle => "IDLE",
            PhyState::Configured => "CONFIGURED",
            PhyState::Running => "RUNNING",
        };
        f.write_str(name)
    }
}

/// Cell parameters remembered from CONFIG.request for later translations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhyConfig {
    pub phy_cell_id: u16,
    pub n_nr_of_rx_ant: u16,
    /// EPRE overrides come from the vendor message instead of the FAPI PDUs
    pub use_vendor_epre_x_ssb: bool,
    pub sub_c_common: u8,
}

/// Mutable state of one physical cell
#[derive(Debug, Clone, Default)]
pub struct PhyInstance {
    /// Set when the first CONFIG.request for this cell is accepted
    pub phy_id: u8,
    pub state: PhyState,
    pub config: PhyConfig,
    pub stats: PhyStats,
    pub shutdown_retries: u8,
    pub shutdown_test_type: u32,
}

impl PhyInstance {
    /// Responses from the PHY name the cell they belong to; a mismatch
    /// means the cell was never configured under that id
    pub fn verify(&self, carrier_idx: u8, what: &str) -> Result<(), FapiError> {
        if self.phy_id != carrier_idx {
            return Err(FapiError::InvalidHandle(format!(
                "{}: carrier {} does not match phy instance {}",
                what, carrier_idx, self.phy_id
            )));
        }
        Ok(())
    }

    pub fn require_state(&self, allowed: &[PhyState], msg: &'static str) -> Result<(), FapiError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(FapiError::InvalidState { phy_id: self.phy_id, state: self.state, msg })
        }
    }
}

/// A cell together with its UL correlation table
#[derive(Debug, Default)]
pub struct PhyEntry {
    instance: Mutex<PhyInstance>,
    pub ul_slots: UlSlotTable,
}

impl PhyEntry {
    pub fn lock(&self) -> MutexGuard<'_, PhyInstance> {
        self.instance.lock()
    }

    pub fn state(&self) -> PhyState {
        self.instance.lock().state
    }
}

/// Process-wide translation state
#[derive(Debug)]
pub struct PhyContext {
    phys: Vec<PhyEntry>,
    num_phy_instance: AtomicU8,
    exit: AtomicBool,
    pool: Arc<BufferPool>,
    /// Session towards the MAC
    pub mac: WlsSession<FapiMessage>,
    /// Session towards the PHY
    pub phy: WlsSession<IapiMessage>,
    pub fapi2mac: Fapi2MacQueues,
    pub fapi2phy: Fapi2PhyQueue,
}

impl PhyContext {
    /// Build the context over one shared pool and the two transport
    /// endpoints owned by the translation layer
    pub fn new(pool: Arc<BufferPool>, mac: Arc<dyn WlsTransport>, phy: Arc<dyn WlsTransport>) -> Self {
        info!("[CTX] {} phy instances, pool of {} blocks x {} bytes",
              MAX_PHY_INSTANCES, pool.num_blocks(), pool.payload_capacity());
        Self {
            phys: (0..MAX_PHY_INSTANCES).map(|_| PhyEntry::default()).collect(),
            num_phy_instance: AtomicU8::new(0),
            exit: AtomicBool::new(false),
            mac: WlsSession::new("FAPI2MAC", Arc::clone(&pool), mac, Reclaim::Deferred),
            phy: WlsSession::new("FAPI2PHY", Arc::clone(&pool), phy, Reclaim::Deferred),
            fapi2mac: Fapi2MacQueues::new(MAX_PHY_INSTANCES),
            fapi2phy: Fapi2PhyQueue::new(),
            pool,
        }
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Resolve a cell by carrier index
    pub fn phy(&self, phy_id: u8) -> Result<&PhyEntry, FapiError> {
        self.phys
            .get(phy_id as usize)
            .ok_or_else(|| FapiError::InvalidHandle(format!("phy id {} out of range", phy_id)))
    }

    pub fn phys(&self) -> impl Iterator<Item = (u8, &PhyEntry)> {
        self.phys.iter().enumerate().map(|(i, p)| (i as u8, p))
    }

    /// Cells in one of `states`
    pub fn phys_in(&self, states: &[PhyState]) -> Vec<u8> {
        self.phys()
            .filter(|(_, p)| states.contains(&p.state()))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn num_phy_instance(&self) -> u8 {
        self.num_phy_instance.load(Ordering::Acquire)
    }

    pub(crate) fn add_phy_instance(&self) {
        let n = self.num_phy_instance.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("[CTX] active phy instances: {}", n);
    }

    pub fn request_exit(&self) {
        self.exit.store(true, Ordering::Release);
    }

    pub fn exiting(&self) -> bool {
        self.exit.load(Ordering::Acquire)
    }

    /// Copy of all counters
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        let phys = self
            .phys()
            .map(|(phy_id, entry)| {
                let inst = entry.lock();
                PhyStatsEntry { phy_id, state: inst.state.to_string(), stats: inst.stats.clone() }
            })
            .collect();
        StatsSnapshot::new(phys)
    }

    /// Log the counters of every cell that left IDLE
    pub fn log_stats(&self) {
        for (phy_id, entry) in self.phys() {
            let inst = entry.lock();
            if inst.state != PhyState::Idle {
                inst.stats.log_summary(phy_id);
            }
        }
    }
}
