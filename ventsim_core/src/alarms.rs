//! Alarm Detector (§4.G): compares sensor registers against threshold
//! registers, sets bitmap registers, and maintains a de-duplicated
//! 10-entry recent-alarm ring.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use ventsim_common::consts::{
    HR_ALARM_BITS_BASE, HR_PU1, HR_PX1, HR_RECENT_ALARMS_BASE, HR_TEMPS_BASE, HR_THRESHOLDS_BASE,
    RECENT_ALARM_BLOCK_WORDS, RECENT_ALARM_RING_LEN,
};
use ventsim_common::error::CoreError;

use crate::register_store::RegisterStore;

/// One entry in the recent-alarm ring (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecentAlarm {
    pub code: u16,
    pub kind: u16,
    pub actual_raw: u16,
    pub threshold_raw: u16,
    pub unix_seconds: u32,
    pub ack_status: u16,
}

impl RecentAlarm {
    fn to_words(self) -> [u16; RECENT_ALARM_BLOCK_WORDS as usize] {
        [
            self.code,
            self.kind,
            self.actual_raw,
            self.threshold_raw,
            (self.unix_seconds >> 16) as u16,
            (self.unix_seconds & 0xFFFF) as u16,
            self.ack_status,
            0,
        ]
    }
}

fn unix_seconds_now() -> u32 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as u32).unwrap_or(0)
}

/// The alarm ring plus the detector's own bookkeeping. Owned by the sim
/// thread; the recent-alarm block is re-serialized into HR 7200..7279
/// after every change.
pub struct AlarmDetector {
    ring: VecDeque<RecentAlarm>,
    /// Set this tick if any alarm was newly (re-)signalled.
    signalled_this_tick: bool,
}

impl AlarmDetector {
    pub fn new() -> Self {
        Self { ring: VecDeque::with_capacity(RECENT_ALARM_RING_LEN), signalled_this_tick: false }
    }

    /// Append an alarm, de-duplicating against an existing unacknowledged
    /// entry with the same `(code, kind)`.
    fn add_recent(&mut self, code: u16, kind: u16, actual: u16, threshold: u16) {
        let already_open =
            self.ring.iter().any(|e| e.code == code && e.kind == kind && e.ack_status == 0);
        if already_open {
            return;
        }
        if self.ring.len() >= RECENT_ALARM_RING_LEN {
            self.ring.pop_front();
        }
        self.ring.push_back(RecentAlarm {
            code,
            kind,
            actual_raw: actual,
            threshold_raw: threshold,
            unix_seconds: unix_seconds_now(),
            ack_status: 0,
        });
        self.signalled_this_tick = true;
    }

    pub fn ring_snapshot(&self) -> Vec<RecentAlarm> {
        self.ring.iter().copied().collect()
    }

    /// Run one detection pass and write the updated bitmap and ring.
    pub fn detect(&mut self, store: &RegisterStore) -> Result<(), CoreError> {
        self.signalled_this_tick = false;

        let temps = store.read_holding(HR_TEMPS_BASE, 7)?;
        let thresholds = store.read_holding(HR_THRESHOLDS_BASE, 10)?;
        let px1_raw = store.read_holding_one(HR_PX1)?;
        let pu1_raw = store.read_holding_one(HR_PU1)?;

        let mut temp_bits: u16 = 0;
        for i in 0..7usize {
            if temps[i] > thresholds[i] {
                temp_bits |= 1 << i;
                self.add_recent((i + 1) as u16, 1, temps[i], thresholds[i]);
            }
        }

        let mut press_bits: u16 = 0;
        let px1_bar = px1_raw as f64 / 4608.0;
        let px1_low_thr = thresholds[7] as f64 / 100.0;
        let px1_high_thr = thresholds[8] as f64 / 100.0;
        if px1_bar < px1_low_thr {
            press_bits |= 1 << 0;
            self.add_recent(10, 2, px1_raw, thresholds[7]);
        }
        if px1_bar > px1_high_thr {
            press_bits |= 1 << 1;
            self.add_recent(10, 1, px1_raw, thresholds[8]);
        }

        let pu1_pct = pu1_raw as f64 / 276.48;
        let pu1_thr = thresholds[9] as f64 / 10.0;
        if pu1_pct > pu1_thr {
            press_bits |= 1 << 2;
            self.add_recent(11, 1, pu1_raw, thresholds[9]);
        }

        let unack_count = self.ring.iter().filter(|e| e.ack_status == 0).count() as u16;
        let new_alarm_flag: u16 = if self.signalled_this_tick { 1 } else { 0 };
        store.write_holding(
            HR_ALARM_BITS_BASE,
            &[temp_bits, press_bits, unack_count, new_alarm_flag],
        )?;

        self.write_ring(store)
    }

    fn write_ring(&self, store: &RegisterStore) -> Result<(), CoreError> {
        let mut words = vec![0u16; RECENT_ALARM_RING_LEN * RECENT_ALARM_BLOCK_WORDS as usize];
        for (slot, entry) in self.ring.iter().enumerate() {
            let base = slot * RECENT_ALARM_BLOCK_WORDS as usize;
            words[base..base + RECENT_ALARM_BLOCK_WORDS as usize]
                .copy_from_slice(&entry.to_words());
        }
        store.write_holding(HR_RECENT_ALARMS_BASE, &words)
    }
}

impl Default for AlarmDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ventsim_common::config::default_thresholds;
    use ventsim_common::consts::HR_THRESHOLDS_BASE;

    fn store_with_defaults() -> RegisterStore {
        let store = RegisterStore::new();
        store.write_holding(HR_THRESHOLDS_BASE, &default_thresholds()).unwrap();
        store
    }

    #[test]
    fn tx6_over_threshold_sets_bit_5_and_rings_code_6() {
        let store = store_with_defaults();
        store.write_holding_one(15, 520).unwrap(); // HR15 = TX6, 52.0C
        let mut detector = AlarmDetector::new();
        detector.detect(&store).unwrap();
        let bits = store.read_holding(HR_ALARM_BITS_BASE, 4).unwrap();
        assert_eq!(bits[0] & (1 << 5), 1 << 5);
        assert!(bits[2] >= 1);
        assert!(detector.ring_snapshot().iter().any(|e| e.code == 6 && e.kind == 1));
    }

    #[test]
    fn repeated_alarm_without_ack_does_not_duplicate_ring_entry() {
        let store = store_with_defaults();
        store.write_holding_one(10, 320).unwrap(); // TX1 above 30.0 threshold
        let mut detector = AlarmDetector::new();
        detector.detect(&store).unwrap();
        let first_len = detector.ring_snapshot().len();
        detector.detect(&store).unwrap();
        assert_eq!(detector.ring_snapshot().len(), first_len);
    }

    #[test]
    fn px1_low_and_high_both_use_code_10() {
        let store = store_with_defaults();
        store.write_holding_one(17, ventsim_common::codec::pressure_to_raw(1.0)).unwrap();
        let mut detector = AlarmDetector::new();
        detector.detect(&store).unwrap();
        assert!(detector.ring_snapshot().iter().any(|e| e.code == 10 && e.kind == 2));
    }
}
