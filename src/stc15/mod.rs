//! STC15 UART1 驱动模块
//!
//! - 波特率：定时器 1，8 位自动重装，SMOD 加倍
//! - 发送：轮询 TI，阻塞直到字节移出
//! - 接收：中断 4，只识别 ISP 下载命令字节，其余字节丢弃
//!
//! 寄存器访问通过 [`Kind`] 注入：真实硬件或 SFR 窗口用 [`Mmio`]，
//! 主机测试用 `sim` feature 提供的模拟寄存器文件 `sim::SimSfr`。

use core::{ffi::CStr, fmt};

use log::{debug, info, trace, warn};
use tock_registers::{fields::FieldValue, LocalRegisterCopy, RegisterLongName};

use crate::{
    config::{Settings, TimerClock},
    wait::{Spin, TxWait},
    SerialStatus,
};

pub mod registers;

pub mod mmio;

pub use mmio::*;
pub use registers::{UART1_VECTOR, UART1_VECTOR_ADDR};

use registers::*;

/// SWBS | SWRST：写入 IAP_CONTR 后从 ISP 监控程序区软复位
pub const ISP_REQUEST: u8 = 0x60;

const _: () =
    assert!((IAP_CONTR::SWBS::SET.value | IAP_CONTR::SWRST::SET.value) == ISP_REQUEST);

/// SFR 访问方式
pub trait Kind: Clone {
    fn read_reg(&self, reg: u8) -> u8;
    fn write_reg(&self, reg: u8, val: u8);

    /// 置位 `mask` 中的位
    ///
    /// 位寻址 SFR 上的实现必须等价于 SETB，不能覆盖硬件同时置位的其它标志。
    fn set_bits(&self, reg: u8, mask: u8) {
        let val = self.read_reg(reg);
        self.write_reg(reg, val | mask);
    }

    /// 清除 `mask` 中的位，约束同 [`Kind::set_bits`]
    fn clear_bits(&self, reg: u8, mask: u8) {
        let val = self.read_reg(reg);
        self.write_reg(reg, val & !mask);
    }
}

fn modify<K: Kind, R: RegisterLongName>(kind: &K, reg: u8, field: FieldValue<u8, R>) {
    let mut local = LocalRegisterCopy::<u8, R>::new(kind.read_reg(reg));
    local.modify(field);
    kind.write_reg(reg, local.get());
}

fn read<K: Kind, R: RegisterLongName>(kind: &K, reg: u8) -> LocalRegisterCopy<u8, R> {
    LocalRegisterCopy::new(kind.read_reg(reg))
}

/// UART1 驱动结构体
pub struct Uart<K: Kind, W: TxWait = Spin> {
    kind: K,
    settings: Settings,
    wait: W,
    irq: Option<RxIrqHandler<K>>,
}

impl<K: Kind> Uart<K, Spin> {
    pub fn new(kind: K, settings: Settings) -> Self {
        Self::with_wait(kind, settings, Spin)
    }
}

impl<K: Kind, W: TxWait> Uart<K, W> {
    /// 使用自定义的发送等待策略
    pub fn with_wait(kind: K, settings: Settings, wait: W) -> Self {
        let irq = RxIrqHandler {
            kind: kind.clone(),
            isp_command: settings.isp_command(),
        };

        Self {
            kind,
            settings,
            wait,
            irq: Some(irq),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// 初始化串口 1 和定时器 1
    ///
    /// 可以重复调用，每次都会重新写入全部配置。
    pub fn init(&mut self) {
        let kind = &self.kind;
        let reload = self.settings.reload();

        // 波特率加倍
        modify(kind, SFR_PCON, PCON::SMOD::SET);
        // 模式 1：8 位 UART，允许接收
        kind.write_reg(SFR_SCON, (SCON::MODE::Uart8Bit + SCON::REN::SET).value);
        // 定时器 1：定时方式，8 位自动重装，定时器 0 的配置保持不变
        modify(
            kind,
            SFR_TMOD,
            TMOD::T1_GATE::CLEAR + TMOD::T1_CT::CLEAR + TMOD::T1_MODE::AutoReload8,
        );
        match self.settings.clock() {
            TimerClock::OneT => modify(kind, SFR_AUXR, AUXR::T1X12::SET),
            TimerClock::TwelveT => modify(kind, SFR_AUXR, AUXR::T1X12::CLEAR),
        }
        kind.write_reg(SFR_TH1, reload);
        kind.write_reg(SFR_TL1, reload);

        kind.set_bits(SFR_TCON, TCON::TR1::SET.value);
        kind.set_bits(SFR_IE, IE::ES::SET.value);

        debug!(
            "UART1 init: SCON=0x{:02x}, TMOD=0x{:02x}, AUXR=0x{:02x}, TH1=0x{:02x}",
            kind.read_reg(SFR_SCON),
            kind.read_reg(SFR_TMOD),
            kind.read_reg(SFR_AUXR),
            reload
        );
        debug!(
            "  baud rate: {} requested, {} actual",
            self.settings.config().baudrate,
            self.settings.actual_baudrate()
        );
    }

    /// 发送一个字节，返回时字节已经完全移出
    ///
    /// 发送期间关闭串口中断，期间到达的接收中断会被推迟到返回之前。
    pub fn send_byte(&mut self, byte: u8) -> Result<(), W::Error> {
        let kind = &self.kind;

        kind.clear_bits(SFR_IE, IE::ES::SET.value);
        kind.clear_bits(SFR_SCON, SCON::TI::SET.value);
        kind.write_reg(SFR_SBUF, byte);

        let result = self
            .wait
            .wait_until(|| read::<K, SCON::Register>(kind, SFR_SCON).is_set(SCON::TI));

        // 超时也要清 TI，否则下一次等待会立即返回
        kind.clear_bits(SFR_SCON, SCON::TI::SET.value);
        kind.set_bits(SFR_IE, IE::ES::SET.value);

        if result.is_err() {
            warn!("UART1 transmit of 0x{:02x} did not complete", byte);
        }
        result
    }

    /// 逐字节发送，遇到 0 或切片结束停止，不追加结束符或换行
    pub fn send_string(&mut self, s: &[u8]) -> Result<(), W::Error> {
        for &byte in s.iter().take_while(|&&b| b != 0) {
            self.send_byte(byte)?;
        }
        Ok(())
    }

    pub fn send_cstr(&mut self, s: &CStr) -> Result<(), W::Error> {
        self.send_string(s.to_bytes())
    }

    /// 字符输出适配：`\n` 转换为 `\r\n`
    pub fn put_char(&mut self, c: u8) -> Result<(), W::Error> {
        if c == b'\n' {
            self.send_byte(0x0d)?;
            self.send_byte(0x0a)
        } else {
            self.send_byte(c)
        }
    }

    pub fn status(&self) -> SerialStatus {
        SerialStatus::from_bits_truncate(self.kind.read_reg(SFR_SCON))
    }

    /// 取出接收中断处理器，只能取一次
    pub fn irq_handler(&mut self) -> Option<RxIrqHandler<K>> {
        self.irq.take()
    }

    pub fn release(self) -> K {
        self.kind
    }
}

impl<K: Kind, W: TxWait> fmt::Write for Uart<K, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.put_char(byte).map_err(|_| fmt::Error)?;
        }
        Ok(())
    }
}

/// 一次接收中断的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxEvent {
    /// RI 未置位，没有做任何事
    Spurious,
    /// 普通字节，已丢弃
    Discarded(u8),
    /// 收到 ISP 下载命令，已写 IAP_CONTR
    IspRequested,
}

/// 串口 1 接收中断处理器，绑定到中断 4
///
/// 由中断向量调用，不会自身重入。
pub struct RxIrqHandler<K: Kind> {
    kind: K,
    isp_command: u8,
}

impl<K: Kind> RxIrqHandler<K> {
    pub fn isp_command(&self) -> u8 {
        self.isp_command
    }

    pub fn handle_irq(&self) -> RxEvent {
        let scon = read::<K, SCON::Register>(&self.kind, SFR_SCON);
        if !scon.is_set(SCON::RI) {
            return RxEvent::Spurious;
        }

        let byte = self.kind.read_reg(SFR_SBUF);
        let event = if byte == self.isp_command {
            info!("ISP download command 0x{:02x} received, entering boot ROM", byte);
            self.kind.write_reg(SFR_IAP_CONTR, ISP_REQUEST);
            RxEvent::IspRequested
        } else {
            trace!("UART1 rx 0x{:02x} dropped", byte);
            RxEvent::Discarded(byte)
        };

        self.kind.clear_bits(SFR_SCON, SCON::RI::SET.value);
        event
    }
}
