//! Hand-written fakes shared by the unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, Operation};

use crate::bc12::regs::{Field, CMP_OUT};
use crate::bc12::ChargerType;
use crate::host::{ChargerHost, Pmic, SecondaryCharger};

// ------------------ I2C register file ------------------

struct I2cState {
    regs: [u8; 256],
    fail: usize,
    writes: Vec<(u8, u8)>,
}

impl Default for I2cState {
    fn default() -> Self { Self { regs: [0; 256], fail: 0, writes: Vec::new() } }
}

/// 8-bit register file behind a fake I2C bus. Clones share state.
#[derive(Clone, Default)]
pub struct FakeI2c(Rc<RefCell<I2cState>>);

impl FakeI2c {
    pub fn new() -> Self { Self::default() }
    pub fn set_reg(&self, reg: u8, val: u8) { self.0.borrow_mut().regs[reg as usize] = val; }
    pub fn reg(&self, reg: u8) -> u8 { self.0.borrow().regs[reg as usize] }
    /// Fail the next `n` bus transactions.
    pub fn fail_next(&self, n: usize) { self.0.borrow_mut().fail = n; }
    pub fn failures_left(&self) -> usize { self.0.borrow().fail }
    /// Register writes seen so far.
    pub fn writes(&self) -> Vec<(u8, u8)> { self.0.borrow().writes.clone() }
}

impl ErrorType for FakeI2c {
    type Error = ErrorKind;
}

impl I2c for FakeI2c {
    async fn transaction(&mut self, _address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        let mut s = self.0.borrow_mut();
        if s.fail > 0 {
            s.fail -= 1;
            return Err(ErrorKind::Other);
        }
        let mut ptr: Option<u8> = None;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    for &b in bytes.iter() {
                        match ptr {
                            None => ptr = Some(b),
                            Some(p) => {
                                s.regs[p as usize] = b;
                                s.writes.push((p, b));
                                ptr = Some(p.wrapping_add(1));
                            }
                        }
                    }
                }
                Operation::Read(buf) => {
                    let mut p = ptr.unwrap_or(0);
                    for b in buf.iter_mut() {
                        *b = s.regs[p as usize];
                        p = p.wrapping_add(1);
                    }
                    ptr = Some(p);
                }
            }
        }
        Ok(())
    }
}

// ------------------ Delay ------------------

/// Completes immediately and records every wait in ms.
#[derive(Clone, Default)]
pub struct FakeDelay(Rc<RefCell<Vec<u32>>>);

impl FakeDelay {
    pub fn new() -> Self { Self::default() }
    pub fn waits(&self) -> Vec<u32> { self.0.borrow().clone() }
    pub fn clear(&self) { self.0.borrow_mut().clear(); }
}

impl DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) { self.0.borrow_mut().push(ns / 1_000_000); }
    async fn delay_us(&mut self, us: u32) { self.0.borrow_mut().push(us / 1_000); }
    async fn delay_ms(&mut self, ms: u32) { self.0.borrow_mut().push(ms); }
}

// ------------------ PMIC ------------------

#[derive(Default)]
struct PmicState {
    regs: HashMap<u16, u16>,
    cmp_script: VecDeque<Result<bool, ()>>,
    vbus_script: VecDeque<Result<u32, ()>>,
    vbus_default: u32,
    vbus_present: bool,
    writes: Vec<(u16, u16, u16)>,
    vbus_reads: usize,
}

/// PMIC with scripted comparator samples and VBUS readings. Clones share state.
#[derive(Clone, Default)]
pub struct FakePmic(Rc<RefCell<PmicState>>);

impl FakePmic {
    pub fn new() -> Self {
        let p = Self::default();
        p.0.borrow_mut().vbus_default = 5000;
        p
    }
    /// Comparator samples returned by successive CMP_OUT reads; `Err` fails the read.
    pub fn script_cmp(&self, samples: &[Result<bool, ()>]) {
        self.0.borrow_mut().cmp_script.extend(samples.iter().copied());
    }
    /// VBUS samples for successive ADC reads; once exhausted `vbus_default` is returned.
    pub fn script_vbus(&self, samples: &[Result<u32, ()>]) {
        self.0.borrow_mut().vbus_script.extend(samples.iter().copied());
    }
    pub fn set_vbus_present(&self, on: bool) { self.0.borrow_mut().vbus_present = on; }
    pub fn field(&self, f: Field) -> u16 {
        f.decode(self.0.borrow().regs.get(&f.addr).copied().unwrap_or(0))
    }
    /// (addr, mask, value) of every update_bits call.
    pub fn writes(&self) -> Vec<(u16, u16, u16)> { self.0.borrow().writes.clone() }
    /// Field values written, in order.
    pub fn field_writes(&self, f: Field) -> Vec<u16> {
        self.0.borrow().writes.iter()
            .filter(|(a, m, _)| *a == f.addr && *m == f.mask)
            .map(|(_, _, v)| f.decode(*v))
            .collect()
    }
    pub fn vbus_reads(&self) -> usize { self.0.borrow().vbus_reads }
    pub fn cmp_left(&self) -> usize { self.0.borrow().cmp_script.len() }
}

impl Pmic for FakePmic {
    type Error = ();

    async fn read_reg(&mut self, addr: u16) -> Result<u16, ()> {
        let mut s = self.0.borrow_mut();
        if addr == CMP_OUT.addr {
            let bit = s.cmp_script.pop_front().unwrap_or(Ok(false))?;
            let cur = s.regs.get(&addr).copied().unwrap_or(0) & !CMP_OUT.mask;
            s.regs.insert(addr, cur | CMP_OUT.encode(bit as u16));
        }
        Ok(s.regs.get(&addr).copied().unwrap_or(0))
    }

    async fn update_bits(&mut self, addr: u16, mask: u16, val: u16) -> Result<(), ()> {
        let mut s = self.0.borrow_mut();
        let cur = s.regs.get(&addr).copied().unwrap_or(0);
        s.regs.insert(addr, (cur & !mask) | (val & mask));
        s.writes.push((addr, mask, val));
        Ok(())
    }

    async fn vbus_mv(&mut self) -> Result<u32, ()> {
        let mut s = self.0.borrow_mut();
        s.vbus_reads += 1;
        let d = s.vbus_default;
        s.vbus_script.pop_front().unwrap_or(Ok(d))
    }

    async fn vbus_present(&mut self) -> bool { self.0.borrow().vbus_present }
}

// ------------------ Upstream ------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostCall {
    Online(bool),
    Type(ChargerType),
    UsbConnect,
    UsbDisconnect,
    UsbReady,
    Acquire,
    Release,
}

#[derive(Default)]
struct HostState {
    calls: Vec<HostCall>,
    ready_after: usize,
}

/// Records every upstream notification. Clones share state.
#[derive(Clone, Default)]
pub struct RecordingHost(Rc<RefCell<HostState>>);

impl RecordingHost {
    pub fn new() -> Self { Self::default() }
    /// `usb_ready` answers false this many times before turning true.
    pub fn usb_ready_after(&self, polls: usize) { self.0.borrow_mut().ready_after = polls; }
    pub fn calls(&self) -> Vec<HostCall> { self.0.borrow().calls.clone() }
    pub fn clear(&self) { self.0.borrow_mut().calls.clear(); }
    pub fn count(&self, call: HostCall) -> usize {
        self.0.borrow().calls.iter().filter(|c| **c == call).count()
    }
}

impl ChargerHost for RecordingHost {
    fn online_changed(&mut self, online: bool) { self.0.borrow_mut().calls.push(HostCall::Online(online)); }
    fn charger_type_changed(&mut self, ty: ChargerType) { self.0.borrow_mut().calls.push(HostCall::Type(ty)); }
    fn usb_connect(&mut self) { self.0.borrow_mut().calls.push(HostCall::UsbConnect); }
    fn usb_disconnect(&mut self) { self.0.borrow_mut().calls.push(HostCall::UsbDisconnect); }
    fn usb_ready(&mut self) -> bool {
        let mut s = self.0.borrow_mut();
        s.calls.push(HostCall::UsbReady);
        if s.ready_after == 0 {
            true
        } else {
            s.ready_after -= 1;
            false
        }
    }
    fn charger_detect_acquire(&mut self) { self.0.borrow_mut().calls.push(HostCall::Acquire); }
    fn charger_detect_release(&mut self) { self.0.borrow_mut().calls.push(HostCall::Release); }
}

// ------------------ Secondary charger ------------------

/// Records the input currents it was asked for and its suspend state.
#[derive(Default)]
struct SecondaryState {
    currents: Vec<u32>,
    suspended: bool,
}

#[derive(Clone, Default)]
pub struct FakeSecondary(Rc<RefCell<SecondaryState>>);

impl FakeSecondary {
    pub fn new() -> Self { Self::default() }
    pub fn currents(&self) -> Vec<u32> { self.0.borrow().currents.clone() }
    pub fn suspended(&self) -> bool { self.0.borrow().suspended }
}

impl SecondaryCharger for FakeSecondary {
    type Error = ();

    async fn set_input_current(&mut self, ma: u32) -> Result<(), ()> {
        self.0.borrow_mut().currents.push(ma);
        Ok(())
    }
    async fn hardware_init(&mut self) -> Result<(), ()> { Ok(()) }
    async fn charging_disable(&mut self) -> Result<(), ()> { Ok(()) }
    async fn suspend(&mut self) -> Result<(), ()> {
        self.0.borrow_mut().suspended = true;
        Ok(())
    }
    async fn unsuspend(&mut self) -> Result<(), ()> {
        self.0.borrow_mut().suspended = false;
        Ok(())
    }
}
