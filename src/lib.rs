#![cfg_attr(not(test), no_std)]

use bitflags::bitflags;
use thiserror::Error;

pub mod config;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod stc15;
pub mod wait;

pub use config::{Settings, TimerClock, UartConfig};
pub use stc15::{Kind, Mmio, RxEvent, RxIrqHandler, Uart};
pub use wait::{Bounded, Spin, TxWait};

// ============================================================================
// 错误类型定义
// ============================================================================

/// 波特率配置错误，只在常量求值阶段产生
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// 波特率为 0
    #[error("baud rate must be non-zero")]
    ZeroBaudrate,
    /// 计算得到的重装值不在 [1, 255] 之间
    #[error("timer reload out of range: 256 - {divisor} is not in 1..=255")]
    ReloadOutOfRange { divisor: u32 },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferError {
    /// 发送完成标志 TI 在限定轮询次数内没有置位
    #[error("transmit not completed after {polls} polls")]
    Timeout { polls: u32 },
}

// ============================================================================
// 状态标志类型
// ============================================================================

bitflags! {
    /// SCON 中的收发完成标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SerialStatus: u8 {
        const RX_COMPLETE = 0x01;
        const TX_COMPLETE = 0x02;
    }
}

impl SerialStatus {
    pub fn can_read(&self) -> bool {
        self.contains(SerialStatus::RX_COMPLETE)
    }

    pub fn tx_done(&self) -> bool {
        self.contains(SerialStatus::TX_COMPLETE)
    }
}
