//! Transaction domain entity

use uuid::Uuid;

/// Identity of one spawned metering task. A tick only acts while the
/// record still carries its own id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeterTaskId(pub u64);

impl std::fmt::Display for MeterTaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "meter-{}", self.0)
    }
}

/// Metering attachment of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterState {
    /// Not charging
    Idle,
    /// Charging before the restart; metering resumes after re-announce
    Suspended,
    /// Metering task running
    Running(MeterTaskId),
}

/// Charging session bound to one EVSE
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Locally generated UUID v4
    pub transaction_id: String,
    pub evse_id: u32,
    /// Sequence number of the last emitted event
    pub seq_no: u64,
    /// Cumulative energy in Wh
    pub energy: f64,
    pub meter: MeterState,
    /// Started remotely, no vehicle plugged in yet
    pub pending_remote_start: bool,
    pub remote_start_id: Option<i64>,
    pub id_token: Option<String>,
}

impl Transaction {
    pub fn new(evse_id: u32) -> Self {
        Self {
            transaction_id: Uuid::new_v4().to_string(),
            evse_id,
            seq_no: 0,
            energy: 0.0,
            meter: MeterState::Idle,
            pending_remote_start: false,
            remote_start_id: None,
            id_token: None,
        }
    }

    /// Placeholder created by a remote start on an EVSE without a vehicle.
    pub fn remote_placeholder(evse_id: u32, remote_start_id: i64, id_token: String) -> Self {
        Self {
            pending_remote_start: true,
            remote_start_id: Some(remote_start_id),
            id_token: Some(id_token),
            ..Self::new(evse_id)
        }
    }

    pub fn is_charging(&self) -> bool {
        !matches!(self.meter, MeterState::Idle)
    }

    /// Advance and return the sequence number for the next event.
    pub fn next_seq(&mut self) -> u64 {
        self.seq_no += 1;
        self.seq_no
    }

    pub fn meter_task(&self) -> Option<MeterTaskId> {
        match self.meter {
            MeterState::Running(id) => Some(id),
            _ => None,
        }
    }

    /// Add energy delivered at `power_w` over `interval_secs`.
    pub fn accumulate(&mut self, power_w: f64, interval_secs: f64) -> f64 {
        self.energy += power_w * interval_secs / 3600.0;
        self.energy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transaction_starts_at_zero() {
        let tx = Transaction::new(1);
        assert_eq!(tx.seq_no, 0);
        assert_eq!(tx.energy, 0.0);
        assert!(!tx.is_charging());
        assert!(Uuid::parse_str(&tx.transaction_id).is_ok());
    }

    #[test]
    fn next_seq_is_strictly_increasing() {
        let mut tx = Transaction::new(1);
        assert_eq!(tx.next_seq(), 1);
        assert_eq!(tx.next_seq(), 2);
        assert_eq!(tx.seq_no, 2);
    }

    #[test]
    fn accumulate_uses_interval_in_hours() {
        let mut tx = Transaction::new(1);
        let energy = tx.accumulate(9999.0, 10.0);
        assert!((energy - 27.775).abs() < 1e-9);
    }

    #[test]
    fn suspended_counts_as_charging() {
        let mut tx = Transaction::new(2);
        tx.meter = MeterState::Suspended;
        assert!(tx.is_charging());
        assert_eq!(tx.meter_task(), None);

        tx.meter = MeterState::Running(MeterTaskId(4));
        assert_eq!(tx.meter_task(), Some(MeterTaskId(4)));
    }

    #[test]
    fn placeholder_carries_remote_ids() {
        let tx = Transaction::remote_placeholder(1, 77, "TAG".into());
        assert!(tx.pending_remote_start);
        assert_eq!(tx.remote_start_id, Some(77));
        assert_eq!(tx.id_token.as_deref(), Some("TAG"));
    }
}
