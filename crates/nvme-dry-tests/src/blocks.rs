// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Raw NVMe block builders.
//!
//! Each builder lays fields out at their NVMe offsets (little-endian) and
//! produces the exact byte image a probe would capture.

fn put_le(buf: &mut [u8], offset: usize, len: usize, value: u128) {
    let bytes = value.to_le_bytes();
    buf[offset..offset + len].copy_from_slice(&bytes[..len]);
}

fn put_ascii(buf: &mut [u8], offset: usize, len: usize, text: &str) {
    let field = &mut buf[offset..offset + len];
    field.fill(b' ');
    let n = text.len().min(len);
    field[..n].copy_from_slice(&text.as_bytes()[..n]);
}

/// Identify Controller image (4096 bytes).
///
/// # Example
///
/// ```
/// use nvme_dry_tests::IdentifyControllerBuilder;
///
/// let raw = IdentifyControllerBuilder::new().serial("SN-42").build();
/// assert_eq!(raw.len(), 4096);
/// assert_eq!(&raw[4..9], b"SN-42");
/// ```
#[derive(Debug, Clone)]
pub struct IdentifyControllerBuilder {
    vendor_id: u16,
    serial: String,
    model: String,
    firmware: String,
    firmware_slots: u8,
    slot1_read_only: bool,
    namespaces: u32,
    wctemp: u16,
    cctemp: u16,
    total_capacity: u128,
    oacs: u16,
    power_states: Vec<(u16, bool)>,
    version: u32,
}

impl Default for IdentifyControllerBuilder {
    fn default() -> Self {
        Self {
            vendor_id: 0x144d,
            serial: "S4EWNX0N123456".to_owned(),
            model: "Dry Run NVMe 1TB".to_owned(),
            firmware: "1B2QEXM7".to_owned(),
            firmware_slots: 3,
            slot1_read_only: false,
            namespaces: 1,
            wctemp: 358,
            cctemp: 358 + 5,
            total_capacity: 1_000_204_886_016,
            oacs: 0x0017,
            power_states: vec![(800, false), (300, false), (5, true)],
            version: 0x0001_0400,
        }
    }
}

impl IdentifyControllerBuilder {
    /// Defaults describing a healthy single-namespace drive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the serial number.
    pub fn serial(mut self, serial: &str) -> Self {
        self.serial = serial.to_owned();
        self
    }

    /// Set the model number.
    pub fn model(mut self, model: &str) -> Self {
        self.model = model.to_owned();
        self
    }

    /// Set the firmware revision.
    pub fn firmware(mut self, firmware: &str) -> Self {
        self.firmware = firmware.to_owned();
        self
    }

    /// Set the firmware slot layout.
    pub fn firmware_slots(mut self, slots: u8, slot1_read_only: bool) -> Self {
        self.firmware_slots = slots;
        self.slot1_read_only = slot1_read_only;
        self
    }

    /// Set the warning/critical composite temperature thresholds (kelvin).
    pub fn thresholds(mut self, wctemp: u16, cctemp: u16) -> Self {
        self.wctemp = wctemp;
        self.cctemp = cctemp;
        self
    }

    /// Set the namespace count.
    pub fn namespaces(mut self, n: u32) -> Self {
        self.namespaces = n;
        self
    }

    /// Set the OACS capability word.
    pub fn oacs(mut self, oacs: u16) -> Self {
        self.oacs = oacs;
        self
    }

    /// Build the 4096-byte image.
    pub fn build(&self) -> Vec<u8> {
        let mut b = vec![0u8; 4096];
        put_le(&mut b, 0, 2, u128::from(self.vendor_id));
        put_le(&mut b, 2, 2, u128::from(self.vendor_id));
        put_ascii(&mut b, 4, 20, &self.serial);
        put_ascii(&mut b, 24, 40, &self.model);
        put_ascii(&mut b, 64, 8, &self.firmware);
        put_le(&mut b, 73, 3, 0x002538);
        b[77] = 9;
        put_le(&mut b, 80, 4, u128::from(self.version));
        b[111] = 1;
        put_le(&mut b, 256, 2, u128::from(self.oacs));
        b[258] = 3;
        b[259] = 3;
        b[260] = ((self.firmware_slots & 0x07) << 1) | u8::from(self.slot1_read_only) | 0x10;
        b[261] = 0x0f;
        b[262] = 63;
        b[263] = self.power_states.len().saturating_sub(1) as u8;
        put_le(&mut b, 266, 2, u128::from(self.wctemp));
        put_le(&mut b, 268, 2, u128::from(self.cctemp));
        put_le(&mut b, 280, 16, self.total_capacity);
        put_le(&mut b, 516, 4, u128::from(self.namespaces));
        put_le(&mut b, 520, 2, 0x005f);
        b[525] = 1;
        put_ascii(&mut b, 768, 256, "nqn.2014-08.org.nvmexpress:dry-run");
        // Zero padding after the NQN, like real controllers.
        if let Some(end) = b[768..1024].iter().rposition(|c| *c != b' ') {
            b[768 + end + 1..1024].fill(0);
        }
        for (i, (mp, non_op)) in self.power_states.iter().enumerate().take(32) {
            let at = 2048 + i * 32;
            put_le(&mut b, at, 2, u128::from(*mp));
            b[at + 3] = u8::from(*non_op) << 1;
            put_le(&mut b, at + 4, 4, 5);
            put_le(&mut b, at + 8, 4, 5);
        }
        b
    }
}

/// Identify Namespace image (4096 bytes).
#[derive(Debug, Clone)]
pub struct NamespaceBuilder {
    size: u64,
    capacity: u64,
    utilization: u64,
    lbads: u8,
    eui64: [u8; 8],
}

impl Default for NamespaceBuilder {
    fn default() -> Self {
        Self {
            size: 1_953_525_168,
            capacity: 1_953_525_168,
            utilization: 488_381_292,
            lbads: 9,
            eui64: [0x00, 0x25, 0x38, 0x5a, 0x91, 0x50, 0x12, 0x34],
        }
    }
}

impl NamespaceBuilder {
    /// Defaults describing a 1 TB namespace with 512-byte blocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set size, capacity and utilization in logical blocks.
    pub fn blocks(mut self, size: u64, capacity: u64, utilization: u64) -> Self {
        self.size = size;
        self.capacity = capacity;
        self.utilization = utilization;
        self
    }

    /// Set the data size exponent of the format in use (9 → 512 B, 12 → 4 KiB).
    pub fn lbads(mut self, lbads: u8) -> Self {
        self.lbads = lbads;
        self
    }

    /// Build the 4096-byte image.
    pub fn build(&self) -> Vec<u8> {
        let mut b = vec![0u8; 4096];
        put_le(&mut b, 0, 8, u128::from(self.size));
        put_le(&mut b, 8, 8, u128::from(self.capacity));
        put_le(&mut b, 16, 8, u128::from(self.utilization));
        b[24] = 0x01;
        b[25] = 1;
        b[26] = 0;
        b[120..128].copy_from_slice(&self.eui64);
        // LBAF0: the format in use; LBAF1: 4 KiB, better performance.
        b[128 + 2] = self.lbads;
        b[128 + 3] = 0;
        b[132 + 2] = 12;
        b[132 + 3] = 1;
        b
    }
}

/// SMART / Health log image (512 bytes).
///
/// # Example
///
/// ```
/// use nvme_dry_tests::SmartLogBuilder;
///
/// let raw = SmartLogBuilder::new().percentage_used(40).power_on_hours(8760).build();
/// assert_eq!(raw[5], 40);
/// ```
#[derive(Debug, Clone)]
pub struct SmartLogBuilder {
    critical_warning: u8,
    composite_temp: u16,
    available_spare: u8,
    spare_threshold: u8,
    percentage_used: u8,
    counters: [u128; 10],
    warning_temp_time: u32,
    critical_temp_time: u32,
    sensors: [u16; 8],
    tmt: [u32; 4],
}

impl Default for SmartLogBuilder {
    fn default() -> Self {
        Self {
            critical_warning: 0,
            composite_temp: 310,
            available_spare: 98,
            spare_threshold: 10,
            percentage_used: 5,
            // read, written, host reads, host writes, busy, cycles, poh,
            // unsafe shutdowns, media errors, error log entries
            counters: [
                2_000_000, 1_500_000, 90_000_000, 70_000_000, 1_200, 150, 4_000, 12, 0, 0,
            ],
            warning_temp_time: 0,
            critical_temp_time: 0,
            sensors: [310, 305, 0, 0, 0, 0, 0, 0],
            tmt: [0; 4],
        }
    }
}

macro_rules! counter_setter {
    ($name:ident, $idx:expr, $doc:literal) => {
        #[doc = $doc]
        pub fn $name(mut self, value: u128) -> Self {
            self.counters[$idx] = value;
            self
        }
    };
}

impl SmartLogBuilder {
    /// Defaults describing a healthy drive (5 % used, 98 % spare, 310 K).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the critical warning byte.
    pub fn critical_warning(mut self, value: u8) -> Self {
        self.critical_warning = value;
        self
    }

    /// Set the composite temperature (kelvin).
    pub fn composite_temp(mut self, kelvin: u16) -> Self {
        self.composite_temp = kelvin;
        self
    }

    /// Set available spare and its threshold (percent).
    pub fn spare(mut self, available: u8, threshold: u8) -> Self {
        self.available_spare = available;
        self.spare_threshold = threshold;
        self
    }

    /// Set percentage used.
    pub fn percentage_used(mut self, value: u8) -> Self {
        self.percentage_used = value;
        self
    }

    counter_setter!(data_units_read, 0, "Set data units read.");
    counter_setter!(data_units_written, 1, "Set data units written.");
    counter_setter!(host_read_commands, 2, "Set host read commands.");
    counter_setter!(host_write_commands, 3, "Set host write commands.");
    counter_setter!(controller_busy_time, 4, "Set controller busy time (minutes).");
    counter_setter!(power_cycles, 5, "Set power cycles.");
    counter_setter!(power_on_hours, 6, "Set power-on hours.");
    counter_setter!(unsafe_shutdowns, 7, "Set unsafe shutdowns.");
    counter_setter!(media_errors, 8, "Set media and data integrity errors.");
    counter_setter!(error_log_entries, 9, "Set error log entry count.");

    /// Set warning and critical composite temperature time (minutes).
    pub fn temp_time(mut self, warning: u32, critical: u32) -> Self {
        self.warning_temp_time = warning;
        self.critical_temp_time = critical;
        self
    }

    /// Set temperature sensor `n` (1..=8) in kelvin; 0 clears it.
    pub fn sensor(mut self, n: usize, kelvin: u16) -> Self {
        if (1..=8).contains(&n) {
            self.sensors[n - 1] = kelvin;
        }
        self
    }

    /// Set thermal management transition counts and times (seconds).
    pub fn thermal_management(mut self, transitions: [u32; 2], seconds: [u32; 2]) -> Self {
        self.tmt = [transitions[0], transitions[1], seconds[0], seconds[1]];
        self
    }

    /// Build the 512-byte image.
    pub fn build(&self) -> Vec<u8> {
        let mut b = vec![0u8; 512];
        b[0] = self.critical_warning;
        put_le(&mut b, 1, 2, u128::from(self.composite_temp));
        b[3] = self.available_spare;
        b[4] = self.spare_threshold;
        b[5] = self.percentage_used;
        for (i, value) in self.counters.iter().enumerate() {
            put_le(&mut b, 32 + i * 16, 16, *value);
        }
        put_le(&mut b, 192, 4, u128::from(self.warning_temp_time));
        put_le(&mut b, 196, 4, u128::from(self.critical_temp_time));
        for (i, k) in self.sensors.iter().enumerate() {
            put_le(&mut b, 200 + i * 2, 2, u128::from(*k));
        }
        for (i, v) in self.tmt.iter().enumerate() {
            put_le(&mut b, 216 + i * 4, 4, u128::from(*v));
        }
        b
    }
}

/// One Error Information log entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorEntry {
    /// Error count (0 marks an unused slot).
    pub error_count: u64,
    /// Submission queue id.
    pub sqid: u16,
    /// Command id.
    pub cid: u16,
    /// Status field without the phase bit.
    pub status: u16,
    /// LBA.
    pub lba: u64,
    /// Namespace id.
    pub nsid: u32,
}

/// Error Information log image (64 bytes per entry).
pub fn error_log(entries: &[ErrorEntry], slots: usize) -> Vec<u8> {
    let mut b = vec![0u8; 64 * slots.max(entries.len())];
    for (i, e) in entries.iter().enumerate() {
        let at = i * 64;
        put_le(&mut b, at, 8, u128::from(e.error_count));
        put_le(&mut b, at + 8, 2, u128::from(e.sqid));
        put_le(&mut b, at + 10, 2, u128::from(e.cid));
        put_le(&mut b, at + 12, 2, (u128::from(e.status) << 1) | 1);
        put_le(&mut b, at + 16, 8, u128::from(e.lba));
        put_le(&mut b, at + 24, 4, u128::from(e.nsid));
    }
    b
}

/// Firmware Slot Information image (512 bytes).
pub fn firmware_slots(active: u8, next: u8, revisions: &[&str]) -> Vec<u8> {
    let mut b = vec![0u8; 512];
    b[0] = (active & 0x07) | ((next & 0x07) << 4);
    for (i, rev) in revisions.iter().enumerate().take(7) {
        let at = 8 + i * 8;
        let n = rev.len().min(8);
        b[at..at + n].copy_from_slice(&rev.as_bytes()[..n]);
    }
    b
}

/// Get Features completion dword.
pub fn feature_dword(value: u32) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

/// Device Self-test log image (564 bytes).
///
/// `results` are `(result code, test code, power-on hours)`; remaining
/// entries are marked unused.
pub fn selftest_log(current: u8, completion: u8, results: &[(u8, u8, u64)]) -> Vec<u8> {
    let mut b = vec![0u8; 564];
    b[0] = current & 0x0f;
    b[1] = completion & 0x7f;
    for i in 0..20 {
        let at = 4 + i * 28;
        match results.get(i) {
            Some((result, test, poh)) => {
                b[at] = (result & 0x0f) | ((test & 0x0f) << 4);
                put_le(&mut b, at + 4, 8, u128::from(*poh));
            }
            None => b[at] = 0x0f,
        }
    }
    b
}

/// Telemetry host-initiated log header (512 bytes).
pub fn telemetry_header(areas: [u16; 3], generation: u8) -> Vec<u8> {
    let mut b = vec![0u8; 512];
    b[0] = 0x07;
    put_le(&mut b, 5, 3, 0x002538);
    for (i, a) in areas.iter().enumerate() {
        put_le(&mut b, 8 + i * 2, 2, u128::from(*a));
    }
    b[382] = 0;
    b[383] = generation;
    b
}
