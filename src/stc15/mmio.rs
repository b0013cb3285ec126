//! SFR 窗口访问实现
//!
//! 适用于把 0x80..=0xFF 的 SFR 区映射到一段内存的环境（仿真器、调试探针），
//! 地址 = 基地址 + (SFR 地址 & 0x7F)。低于 0x80 的地址同样折叠进窗口，
//! 任何 `u8` 都不会访问到窗口之外。
//!
//! 位操作用原子 OR/AND 完成，对应 SETB/CLR：窗口另一侧（仿真器线程、硬件）
//! 在读写之间置位的标志不会被覆盖。

use super::{registers::SFR_BASE, Kind, Uart};
use crate::{wait::Spin, Settings};
use core::{
    ptr::NonNull,
    sync::atomic::{AtomicU8, Ordering},
};

/// SFR 窗口大小
pub const WINDOW_SIZE: usize = 0x80;

#[derive(Clone, Copy)]
pub struct Mmio {
    base: NonNull<u8>,
}

impl Mmio {
    /// # Safety
    ///
    /// `base` 必须指向一段至少 [`WINDOW_SIZE`] 字节、映射 SFR 区的有效内存，
    /// 并在 `Mmio` 的整个使用期间保持有效。
    pub unsafe fn new(base: NonNull<u8>) -> Self {
        Self { base }
    }

    pub fn base(&self) -> usize {
        self.base.as_ptr() as usize
    }

    fn addr(&self, reg: u8) -> *mut u8 {
        let offset = (reg.wrapping_sub(SFR_BASE) & 0x7f) as usize;
        // SAFETY: offset < WINDOW_SIZE，在 new 约定的窗口之内
        unsafe { self.base.as_ptr().add(offset) }
    }

    fn atomic(&self, reg: u8) -> &AtomicU8 {
        // SAFETY: 地址在窗口之内，u8 没有对齐要求；窗口内存在 new 的约定下一直有效
        unsafe { AtomicU8::from_ptr(self.addr(reg)) }
    }
}

// SAFETY: SFR 访问是单字节的，硬件保证不会被撕裂
unsafe impl Send for Mmio {}

impl Kind for Mmio {
    fn read_reg(&self, reg: u8) -> u8 {
        unsafe { core::ptr::read_volatile(self.addr(reg)) }
    }

    fn write_reg(&self, reg: u8, val: u8) {
        unsafe {
            core::ptr::write_volatile(self.addr(reg), val);
        }
        mbarrier::wmb();
    }

    fn set_bits(&self, reg: u8, mask: u8) {
        self.atomic(reg).fetch_or(mask, Ordering::SeqCst);
        mbarrier::wmb();
    }

    fn clear_bits(&self, reg: u8, mask: u8) {
        self.atomic(reg).fetch_and(!mask, Ordering::SeqCst);
        mbarrier::wmb();
    }
}

impl Uart<Mmio, Spin> {
    /// # Safety
    ///
    /// 同 [`Mmio::new`]。
    pub unsafe fn new_mmio(base: NonNull<u8>, settings: Settings) -> Self {
        Uart::new(unsafe { Mmio::new(base) }, settings)
    }
}
