//! 模拟的 SFR 寄存器文件
//!
//! 在主机上替代真实硬件驱动 [`Uart`](crate::Uart)：
//!
//! - SBUF 的发送缓冲与接收缓冲分离，写入的字节记录到“线路”上
//! - 写 SBUF 后经过可配置的轮询次数才置位 TI，也可以让发送器卡死
//! - 可以注入接收字节，或者安排字节在当前发送完成时到达
//! - 记录所有软件写操作、SBUF 接收缓冲的读取顺序、IAP_CONTR 写入次数和 RI 清除次数
//!
//! 记录容量固定，写满之后 [`SimSfr::truncated`] 返回 `true`。
//!
//! 单线程使用，内部用 `Cell`/`RefCell`，不需要 alloc。

use core::cell::{Cell, RefCell};

use heapless::Vec;

use crate::stc15::{
    registers::{SFR_BASE, SFR_IAP_CONTR, SFR_IE, SFR_SBUF, SFR_SCON},
    Kind, RxEvent, RxIrqHandler,
};

pub const WIRE_CAPACITY: usize = 1024;
pub const LOG_CAPACITY: usize = 4096;
pub const IAP_LOG_CAPACITY: usize = 8;

/// 按发生顺序记录的一次软件访问
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SfrAccess {
    /// 读取接收缓冲 SBUF，得到的字节
    ReadRx(u8),
    /// 写寄存器 `(寄存器, 写入后的值)`
    Write(u8, u8),
}

const SCON_RI: u8 = 0x01;
const SCON_TI: u8 = 0x02;
const IE_ES: u8 = 0x10;

pub struct SimSfr {
    sfr: [Cell<u8>; 128],
    rx_buffer: Cell<u8>,
    tx_latency: Cell<u32>,
    tx_countdown: Cell<Option<u32>>,
    tx_stalled: Cell<bool>,
    rx_on_tx_done: Cell<Option<u8>>,
    rx_while_masked: Cell<u32>,
    ri_clears: Cell<u32>,
    wire: RefCell<Vec<u8, WIRE_CAPACITY>>,
    iap_writes: RefCell<Vec<u8, IAP_LOG_CAPACITY>>,
    writes: RefCell<Vec<(u8, u8), LOG_CAPACITY>>,
    accesses: RefCell<Vec<SfrAccess, LOG_CAPACITY>>,
    truncated: Cell<bool>,
}

fn record<T, const N: usize>(log: &RefCell<Vec<T, N>>, truncated: &Cell<bool>, item: T) {
    if log.borrow_mut().push(item).is_err() {
        truncated.set(true);
    }
}

impl SimSfr {
    /// 所有 SFR 复位为 0
    pub fn new() -> Self {
        Self {
            sfr: core::array::from_fn(|_| Cell::new(0)),
            rx_buffer: Cell::new(0),
            tx_latency: Cell::new(0),
            tx_countdown: Cell::new(None),
            tx_stalled: Cell::new(false),
            rx_on_tx_done: Cell::new(None),
            rx_while_masked: Cell::new(0),
            ri_clears: Cell::new(0),
            wire: RefCell::new(Vec::new()),
            iap_writes: RefCell::new(Vec::new()),
            writes: RefCell::new(Vec::new()),
            accesses: RefCell::new(Vec::new()),
            truncated: Cell::new(false),
        }
    }

    fn cell(&self, reg: u8) -> &Cell<u8> {
        &self.sfr[(reg.wrapping_sub(SFR_BASE) & 0x7f) as usize]
    }

    /// 不触发任何副作用地读取寄存器
    pub fn peek(&self, reg: u8) -> u8 {
        if reg == SFR_SBUF {
            return self.rx_buffer.get();
        }
        self.cell(reg).get()
    }

    /// 不记录、不触发副作用地写寄存器，用来预置复位后的状态
    pub fn poke(&self, reg: u8, val: u8) {
        self.cell(reg).set(val);
    }

    /// 写 SBUF 后 TI 置位前需要经过的 SCON 读取次数
    pub fn set_tx_latency(&self, polls: u32) {
        self.tx_latency.set(polls);
    }

    /// 卡死发送器：写 SBUF 后 TI 永不置位
    pub fn stall_tx(&self, stalled: bool) {
        self.tx_stalled.set(stalled);
    }

    /// 一个字节接收完成：装入接收缓冲并置位 RI
    ///
    /// RI 尚未清除时新字节丢失（溢出），返回 `false`。
    pub fn receive(&self, byte: u8) -> bool {
        let scon = self.cell(SFR_SCON);
        if scon.get() & SCON_RI != 0 {
            return false;
        }
        if self.cell(SFR_IE).get() & IE_ES == 0 {
            self.rx_while_masked.set(self.rx_while_masked.get() + 1);
        }
        self.rx_buffer.set(byte);
        scon.set(scon.get() | SCON_RI);
        true
    }

    /// 安排一个字节在当前发送完成（TI 置位）的同一时刻到达
    pub fn receive_during_tx(&self, byte: u8) {
        self.rx_on_tx_done.set(Some(byte));
    }

    /// 串口中断请求：ES 打开且 RI 或 TI 置位
    pub fn irq_pending(&self) -> bool {
        let scon = self.cell(SFR_SCON).get();
        self.cell(SFR_IE).get() & IE_ES != 0 && scon & (SCON_RI | SCON_TI) != 0
    }

    /// 模拟中断向量：有请求时调用处理器一次
    pub fn dispatch(&self, handler: &RxIrqHandler<&SimSfr>) -> Option<RxEvent> {
        if self.irq_pending() {
            Some(handler.handle_irq())
        } else {
            None
        }
    }

    pub fn wire(&self) -> Vec<u8, WIRE_CAPACITY> {
        self.wire.borrow().clone()
    }

    pub fn iap_writes(&self) -> Vec<u8, IAP_LOG_CAPACITY> {
        self.iap_writes.borrow().clone()
    }

    /// 软件写操作记录 `(寄存器, 写入后的值)`
    pub fn writes(&self) -> Vec<(u8, u8), LOG_CAPACITY> {
        self.writes.borrow().clone()
    }

    /// SBUF 读取与全部写操作，按发生顺序
    pub fn accesses(&self) -> Vec<SfrAccess, LOG_CAPACITY> {
        self.accesses.borrow().clone()
    }

    /// 任意一个记录因容量不足丢失过条目
    pub fn truncated(&self) -> bool {
        self.truncated.get()
    }

    /// RI 从 1 变为 0 的次数
    pub fn ri_clears(&self) -> u32 {
        self.ri_clears.get()
    }

    /// ES 关闭期间到达的接收次数
    pub fn rx_while_masked(&self) -> u32 {
        self.rx_while_masked.get()
    }

    /// 清空线路、写记录和计数器，寄存器值保持不变
    pub fn clear_logs(&self) {
        self.wire.borrow_mut().clear();
        self.iap_writes.borrow_mut().clear();
        self.writes.borrow_mut().clear();
        self.accesses.borrow_mut().clear();
        self.truncated.set(false);
        self.ri_clears.set(0);
        self.rx_while_masked.set(0);
    }

    fn store(&self, reg: u8, val: u8) {
        record(&self.writes, &self.truncated, (reg, val));
        record(&self.accesses, &self.truncated, SfrAccess::Write(reg, val));

        match reg {
            SFR_SBUF => {
                record(&self.wire, &self.truncated, val);
                if !self.tx_stalled.get() {
                    self.tx_countdown.set(Some(self.tx_latency.get()));
                }
            }
            SFR_IAP_CONTR => {
                record(&self.iap_writes, &self.truncated, val);
                self.cell(reg).set(val);
            }
            SFR_SCON => {
                let old = self.cell(reg).get();
                if old & SCON_RI != 0 && val & SCON_RI == 0 {
                    self.ri_clears.set(self.ri_clears.get() + 1);
                }
                self.cell(reg).set(val);
            }
            _ => self.cell(reg).set(val),
        }
    }

    fn shift_out(&self) {
        let Some(remaining) = self.tx_countdown.get() else {
            return;
        };

        if remaining > 0 {
            self.tx_countdown.set(Some(remaining - 1));
            return;
        }

        self.tx_countdown.set(None);
        let scon = self.cell(SFR_SCON);
        scon.set(scon.get() | SCON_TI);
        if let Some(byte) = self.rx_on_tx_done.take() {
            self.receive(byte);
        }
    }
}

impl Default for SimSfr {
    fn default() -> Self {
        Self::new()
    }
}

impl Kind for &SimSfr {
    fn read_reg(&self, reg: u8) -> u8 {
        match reg {
            SFR_SBUF => {
                let byte = self.rx_buffer.get();
                record(&self.accesses, &self.truncated, SfrAccess::ReadRx(byte));
                byte
            }
            SFR_SCON => {
                self.shift_out();
                self.cell(reg).get()
            }
            _ => self.cell(reg).get(),
        }
    }

    fn write_reg(&self, reg: u8, val: u8) {
        self.store(reg, val);
    }

    // 位操作直接作用在当前值上，对应 SETB/CLR
    fn set_bits(&self, reg: u8, mask: u8) {
        self.store(reg, self.cell(reg).get() | mask);
    }

    fn clear_bits(&self, reg: u8, mask: u8) {
        self.store(reg, self.cell(reg).get() & !mask);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_latency_counts_scon_reads() {
        let sim = SimSfr::new();
        sim.set_tx_latency(2);

        let kind = &sim;
        kind.write_reg(SFR_SBUF, 0x55);
        assert_eq!(kind.read_reg(SFR_SCON) & SCON_TI, 0);
        assert_eq!(kind.read_reg(SFR_SCON) & SCON_TI, 0);
        assert_eq!(kind.read_reg(SFR_SCON) & SCON_TI, SCON_TI);
        assert_eq!(sim.wire().as_slice(), &[0x55]);
    }

    #[test]
    fn test_sbuf_buffers_are_separate() {
        let sim = SimSfr::new();
        let kind = &sim;

        assert!(sim.receive(0x41));
        kind.write_reg(SFR_SBUF, 0x42);
        assert_eq!(kind.read_reg(SFR_SBUF), 0x41);
        assert_eq!(sim.wire().as_slice(), &[0x42]);
    }

    #[test]
    fn test_overrun_drops_byte() {
        let sim = SimSfr::new();
        assert!(sim.receive(0x01));
        assert!(!sim.receive(0x02));
        assert_eq!(sim.peek(SFR_SBUF), 0x01);
    }

    #[test]
    fn test_full_log_sets_truncated() {
        let sim = SimSfr::new();
        let kind = &sim;

        for _ in 0..IAP_LOG_CAPACITY {
            kind.write_reg(SFR_IAP_CONTR, 0x60);
        }
        assert!(!sim.truncated());

        kind.write_reg(SFR_IAP_CONTR, 0x60);
        assert!(sim.truncated());
        assert_eq!(sim.iap_writes().len(), IAP_LOG_CAPACITY);

        sim.clear_logs();
        assert!(!sim.truncated());
    }

    #[test]
    fn test_accesses_keep_read_write_order() {
        let sim = SimSfr::new();
        let kind = &sim;

        sim.receive(0x33);
        kind.write_reg(SFR_IE, 0x10);
        assert_eq!(kind.read_reg(SFR_SBUF), 0x33);
        kind.clear_bits(SFR_SCON, SCON_RI);

        assert_eq!(
            sim.accesses().as_slice(),
            &[
                SfrAccess::Write(SFR_IE, 0x10),
                SfrAccess::ReadRx(0x33),
                SfrAccess::Write(SFR_SCON, 0x00),
            ]
        );
    }

    #[test]
    fn test_ri_clear_counting() {
        let sim = SimSfr::new();
        let kind = &sim;

        kind.clear_bits(SFR_SCON, SCON_RI);
        assert_eq!(sim.ri_clears(), 0);

        sim.receive(0x10);
        kind.clear_bits(SFR_SCON, SCON_RI);
        assert_eq!(sim.ri_clears(), 1);
    }
}
