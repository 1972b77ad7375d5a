//! Per-PHY message counters
//!
//! Every translator counts what it consumed on one side and what it
//! produced on the other. Counters are dumped as a log summary on shutdown
//! and periodically as JSON.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

/// Counters of messages exchanged with the MAC
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FapiCounters {
    pub param_req: u64,
    pub param_res: u64,
    pub config_req: u64,
    pub config_res: u64,
    pub start_req: u64,
    pub stop_req: u64,
    pub stop_ind: u64,
    pub vendor_msg: u64,
    pub vext_shutdown_req: u64,
    pub vext_shutdown_res: u64,
    pub dl_tti_req: u64,
    pub ul_tti_req: u64,
    pub ul_dci_req: u64,
    pub tx_data_req: u64,
    pub slot_ind: u64,
    pub error_ind: u64,
    pub crc_ind: u64,
    pub rx_data_ind: u64,
    pub uci_ind: u64,
    pub srs_ind: u64,
    pub rach_ind: u64,
    pub dl_tti_pdus: u64,
    pub dl_tti_pdcch_pdus: u64,
    pub dl_tti_pdsch_pdus: u64,
    pub dl_tti_csi_rs_pdus: u64,
    pub dl_tti_ssb_pdus: u64,
    pub ul_dci_pdus: u64,
    pub ul_tti_pdus: u64,
    pub ul_tti_prach_pdus: u64,
    pub ul_tti_pusch_pdus: u64,
    pub ul_tti_pucch_pdus: u64,
    pub ul_tti_srs_pdus: u64,
    pub crc_ind_pdus: u64,
    pub rx_data_ind_pdus: u64,
    pub uci_ind_pdus: u64,
    pub srs_ind_pdus: u64,
    pub rach_ind_pdus: u64,
}

/// Counters of messages exchanged with the PHY
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IapiCounters {
    pub config_req: u64,
    pub config_res: u64,
    pub start_req: u64,
    pub start_res: u64,
    pub stop_req: u64,
    pub stop_ind: u64,
    pub shutdown_req: u64,
    pub shutdown_res: u64,
    pub dl_config_req: u64,
    pub ul_config_req: u64,
    pub ul_dci_req: u64,
    pub tx_req: u64,
    pub slot_ind: u64,
    pub error_ind: u64,
    pub crc_ind: u64,
    pub rx_data_ind: u64,
    pub uci_ind: u64,
    pub srs_ind: u64,
    pub rach_ind: u64,
    pub dl_tti_pdus: u64,
    pub dl_tti_pdcch_pdus: u64,
    pub dl_tti_pdsch_pdus: u64,
    pub dl_tti_csi_rs_pdus: u64,
    pub dl_tti_ssb_pdus: u64,
    pub ul_dci_pdus: u64,
    pub ul_tti_pdus: u64,
    pub ul_tti_prach_pdus: u64,
    pub ul_tti_pusch_pdus: u64,
    pub ul_tti_pucch_pdus: u64,
    pub ul_tti_srs_pdus: u64,
    pub crc_ind_pdus: u64,
    pub rx_data_ind_pdus: u64,
    pub uci_ind_pdus: u64,
    pub srs_ind_pdus: u64,
    pub rach_preambles: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhyStats {
    pub fapi: FapiCounters,
    pub iapi: IapiCounters,
}

impl PhyStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Log the headline counters of one PHY
    pub fn log_summary(&self, phy_id: u8) {
        let f = &self.fapi;
        let i = &self.iapi;
        info!("[STATS] phy {} FAPI: dl_tti={} ul_tti={} ul_dci={} tx_data={} slot={} crc={} rx_data={} uci={} srs={} rach={} err={}",
              phy_id, f.dl_tti_req, f.ul_tti_req, f.ul_dci_req, f.tx_data_req, f.slot_ind,
              f.crc_ind, f.rx_data_ind, f.uci_ind, f.srs_ind, f.rach_ind, f.error_ind);
        info!("[STATS] phy {} IAPI: dl_config={} ul_config={} ul_dci={} tx={} slot={} crc={} rx_data={} uci={} srs={} rach={} preambles={}",
              phy_id, i.dl_config_req, i.ul_config_req, i.ul_dci_req, i.tx_req, i.slot_ind,
              i.crc_ind, i.rx_data_ind, i.uci_ind, i.srs_ind, i.rach_ind, i.rach_preambles);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhyStatsEntry {
    pub phy_id: u8,
    pub state: String,
    pub stats: PhyStats,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub timestamp: String,
    pub phys: Vec<PhyStatsEntry>,
}

impl StatsSnapshot {
    pub fn new(phys: Vec<PhyStatsEntry>) -> Self {
        Self { timestamp: Utc::now().to_rfc3339(), phys }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the snapshot to `path`, replacing any previous dump
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_clears_counters() {
        let mut stats = PhyStats::default();
        stats.fapi.crc_ind = 3;
        stats.iapi.rach_preambles = 7;
        stats.reset();
        assert_eq!(stats, PhyStats::default());
    }

    #[test]
    fn test_snapshot_json() {
        let mut stats = PhyStats::default();
        stats.fapi.slot_ind = 42;
        let snapshot = StatsSnapshot::new(vec![PhyStatsEntry { phy_id: 0, state: "Running".into(), stats }]);
        let json = snapshot.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["phys"][0]["stats"]["fapi"]["slot_ind"], 42);
        assert!(value["timestamp"].as_str().is_some());
    }
}
