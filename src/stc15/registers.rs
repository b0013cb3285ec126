//! STC15 UART1 相关的特殊功能寄存器（SFR）定义
//!
//! 参考 STC15 系列数据手册的 SFR 映射表。
//! 地址使用 const 定义，位域使用 tock-registers 描述。

use tock_registers::register_bitfields;

// SFR 地址
/// PCON: 电源控制寄存器，SMOD 位使串口波特率加倍
pub const SFR_PCON: u8 = 0x87;

/// TCON: 定时器控制寄存器（可位寻址）
pub const SFR_TCON: u8 = 0x88;

/// TMOD: 定时器工作模式寄存器，高半字节属于定时器 1
pub const SFR_TMOD: u8 = 0x89;

/// TL1: 定时器 1 计数低字节
pub const SFR_TL1: u8 = 0x8B;

/// TH1: 定时器 1 高字节，模式 2 下作为重装值
pub const SFR_TH1: u8 = 0x8D;

/// AUXR: 辅助寄存器，T1x12 选择定时器 1 的 1T 模式
pub const SFR_AUXR: u8 = 0x8E;

/// SCON: 串口 1 控制寄存器（可位寻址）
pub const SFR_SCON: u8 = 0x98;

/// SBUF: 串口 1 数据缓冲
/// 写入进入发送缓冲，读取得到接收缓冲，两者物理上分离。
pub const SFR_SBUF: u8 = 0x99;

/// IE: 中断允许寄存器（可位寻址）
pub const SFR_IE: u8 = 0xA8;

/// IAP_CONTR: ISP/IAP 控制寄存器
pub const SFR_IAP_CONTR: u8 = 0xC7;

/// SFR 区起始地址
pub const SFR_BASE: u8 = 0x80;

/// 串口 1 中断号，向量地址 = 号 * 8 + 3
pub const UART1_VECTOR: u8 = 4;
pub const UART1_VECTOR_ADDR: u16 = UART1_VECTOR as u16 * 8 + 3;

/// 地址为 8 的倍数的 SFR 支持单个位的原子读写
pub const fn is_bit_addressable(reg: u8) -> bool {
    reg >= SFR_BASE && reg % 8 == 0
}

register_bitfields! [
    u8,

    /// Power Control
    pub PCON [
        IDL OFFSET(0) NUMBITS(1) [],
        PD OFFSET(1) NUMBITS(1) [],
        GF0 OFFSET(2) NUMBITS(1) [],
        GF1 OFFSET(3) NUMBITS(1) [],
        POF OFFSET(4) NUMBITS(1) [],
        LVDF OFFSET(5) NUMBITS(1) [],
        SMOD0 OFFSET(6) NUMBITS(1) [],
        SMOD OFFSET(7) NUMBITS(1) []
    ],

    /// Timer Control
    pub TCON [
        IT0 OFFSET(0) NUMBITS(1) [],
        IE0 OFFSET(1) NUMBITS(1) [],
        IT1 OFFSET(2) NUMBITS(1) [],
        IE1 OFFSET(3) NUMBITS(1) [],
        TR0 OFFSET(4) NUMBITS(1) [],
        TF0 OFFSET(5) NUMBITS(1) [],
        TR1 OFFSET(6) NUMBITS(1) [],
        TF1 OFFSET(7) NUMBITS(1) []
    ],

    /// Timer Mode
    pub TMOD [
        T0_MODE OFFSET(0) NUMBITS(2) [],
        T0_CT OFFSET(2) NUMBITS(1) [],
        T0_GATE OFFSET(3) NUMBITS(1) [],
        T1_MODE OFFSET(4) NUMBITS(2) [
            AutoReload16 = 0,
            Timer16 = 1,
            AutoReload8 = 2,
            Disabled = 3
        ],
        T1_CT OFFSET(6) NUMBITS(1) [],
        T1_GATE OFFSET(7) NUMBITS(1) []
    ],

    /// Auxiliary Register
    pub AUXR [
        S1ST2 OFFSET(0) NUMBITS(1) [],
        EXTRAM OFFSET(1) NUMBITS(1) [],
        T2X12 OFFSET(2) NUMBITS(1) [],
        T2_CT OFFSET(3) NUMBITS(1) [],
        T2R OFFSET(4) NUMBITS(1) [],
        UART_M0X6 OFFSET(5) NUMBITS(1) [],
        T1X12 OFFSET(6) NUMBITS(1) [],
        T0X12 OFFSET(7) NUMBITS(1) []
    ],

    /// Serial Control
    pub SCON [
        RI OFFSET(0) NUMBITS(1) [],
        TI OFFSET(1) NUMBITS(1) [],
        RB8 OFFSET(2) NUMBITS(1) [],
        TB8 OFFSET(3) NUMBITS(1) [],
        REN OFFSET(4) NUMBITS(1) [],
        SM2 OFFSET(5) NUMBITS(1) [],
        MODE OFFSET(6) NUMBITS(2) [
            ShiftRegister = 0,
            Uart8Bit = 1,
            Uart9BitFixed = 2,
            Uart9Bit = 3
        ]
    ],

    /// Interrupt Enable
    pub IE [
        EX0 OFFSET(0) NUMBITS(1) [],
        ET0 OFFSET(1) NUMBITS(1) [],
        EX1 OFFSET(2) NUMBITS(1) [],
        ET1 OFFSET(3) NUMBITS(1) [],
        ES OFFSET(4) NUMBITS(1) [],
        EADC OFFSET(5) NUMBITS(1) [],
        ELVD OFFSET(6) NUMBITS(1) [],
        EA OFFSET(7) NUMBITS(1) []
    ],

    /// ISP/IAP Control
    pub IAP_CONTR [
        WT OFFSET(0) NUMBITS(3) [],
        CMD_FAIL OFFSET(4) NUMBITS(1) [],
        SWRST OFFSET(5) NUMBITS(1) [],
        SWBS OFFSET(6) NUMBITS(1) [],
        IAPEN OFFSET(7) NUMBITS(1) []
    ]
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_values() {
        let scon = SCON::MODE::Uart8Bit + SCON::REN::SET;
        assert_eq!(scon.value, 0x50);

        let isp = IAP_CONTR::SWBS::SET + IAP_CONTR::SWRST::SET;
        assert_eq!(isp.value, 0x60);

        assert_eq!(TMOD::T1_MODE::AutoReload8.value, 0x20);
        assert_eq!(AUXR::T1X12::SET.value, 0x40);
        assert_eq!(PCON::SMOD::SET.value, 0x80);
        assert_eq!(IE::ES::SET.value, 0x10);
        assert_eq!(TCON::TR1::SET.value, 0x40);
    }

    #[test]
    fn test_vector_and_bit_addressing() {
        assert_eq!(UART1_VECTOR_ADDR, 0x0023);
        assert!(is_bit_addressable(SFR_SCON));
        assert!(is_bit_addressable(SFR_IE));
        assert!(is_bit_addressable(SFR_TCON));
        assert!(!is_bit_addressable(SFR_SBUF));
        assert!(!is_bit_addressable(SFR_TMOD));
    }
}
