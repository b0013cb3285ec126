//! 波特率发生器配置
//!
//! UART1 以定时器 1 作为波特率发生器，工作在 8 位自动重装模式，
//! PCON.SMOD 置位（波特率加倍）。重装值：
//!
//! ```text
//! TH1 = 256 - Fosc / divisor / baud
//! divisor = 16   (1T,  SMOD = 1)
//! divisor = 192  (12T, SMOD = 1)
//! ```
//!
//! 所有计算都是 `const fn`，非法的晶振/波特率组合在常量求值时报错。

use crate::ConfigError;

/// 定时器 1 的计数时钟
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerClock {
    /// 每个系统时钟计数一次（AUXR.T1x12 = 1）
    OneT,
    /// 每 12 个系统时钟计数一次，传统 8051 速度
    TwelveT,
}

impl TimerClock {
    /// 已经包含 SMOD 加倍后的总分频系数
    pub const fn divisor(self) -> u32 {
        match self {
            TimerClock::OneT => 16,
            TimerClock::TwelveT => 192,
        }
    }
}

/// UART 编译期配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    pub oscillator_hz: u32,
    pub baudrate: u32,
    pub clock: TimerClock,
    /// 收到该字节时复位进入 ISP 引导程序
    pub isp_command: u8,
}

impl UartConfig {
    pub const DEFAULT_OSCILLATOR_HZ: u32 = 11_059_200;
    pub const DEFAULT_BAUDRATE: u32 = 9600;
    pub const DEFAULT_ISP_COMMAND: u8 = 0x3D;

    pub const fn new() -> Self {
        Self {
            oscillator_hz: Self::DEFAULT_OSCILLATOR_HZ,
            baudrate: Self::DEFAULT_BAUDRATE,
            clock: TimerClock::OneT,
            isp_command: Self::DEFAULT_ISP_COMMAND,
        }
    }

    pub const fn oscillator_hz(self, oscillator_hz: u32) -> Self {
        Self {
            oscillator_hz,
            ..self
        }
    }

    pub const fn baudrate(self, baudrate: u32) -> Self {
        Self { baudrate, ..self }
    }

    pub const fn clock(self, clock: TimerClock) -> Self {
        Self { clock, ..self }
    }

    pub const fn isp_command(self, isp_command: u8) -> Self {
        Self {
            isp_command,
            ..self
        }
    }

    /// 检查配置并计算定时器重装值
    ///
    /// 重装值必须落在 `[1, 255]`，即 `Fosc / divisor / baud` 在 `[1, 255]`。
    pub const fn validate(&self) -> Result<Settings, ConfigError> {
        if self.baudrate == 0 {
            return Err(ConfigError::ZeroBaudrate);
        }

        let divisor = self.oscillator_hz / self.clock.divisor() / self.baudrate;
        if divisor == 0 || divisor > 255 {
            return Err(ConfigError::ReloadOutOfRange { divisor });
        }

        Ok(Settings {
            config: *self,
            reload: (256 - divisor) as u8,
        })
    }

    /// 常量上下文中使用：配置非法时编译失败
    ///
    /// ```ignore
    /// const SETTINGS: Settings = UartConfig::new().baudrate(4800).settings();
    /// ```
    pub const fn settings(self) -> Settings {
        match self.validate() {
            Ok(settings) => settings,
            Err(ConfigError::ZeroBaudrate) => panic!("UART baud rate must be non-zero"),
            Err(ConfigError::ReloadOutOfRange { .. }) => {
                panic!("oscillator/baud rate pair gives a timer 1 reload outside 1..=255")
            }
        }
    }
}

impl Default for UartConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// 校验通过的配置，驱动只接受这种类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    config: UartConfig,
    reload: u8,
}

impl Settings {
    /// TH1 重装值
    pub const fn reload(&self) -> u8 {
        self.reload
    }

    pub const fn config(&self) -> &UartConfig {
        &self.config
    }

    pub const fn clock(&self) -> TimerClock {
        self.config.clock
    }

    pub const fn isp_command(&self) -> u8 {
        self.config.isp_command
    }

    /// 截断误差之后实际得到的波特率
    pub const fn actual_baudrate(&self) -> u32 {
        self.config.oscillator_hz / self.config.clock.divisor() / (256 - self.reload as u32)
    }
}

impl Default for Settings {
    fn default() -> Self {
        DEFAULT_SETTINGS
    }
}

/// 11.0592 MHz, 9600 baud, 1T
pub const DEFAULT_SETTINGS: Settings = UartConfig::new().settings();

#[cfg(test)]
mod tests {
    use super::*;

    const OSCILLATORS: &[u32] = &[
        1_843_200, 4_000_000, 6_000_000, 11_059_200, 12_000_000, 18_432_000, 22_118_400,
        24_000_000, 27_000_000, 30_000_000, 33_177_600, 35_000_000,
    ];

    const BAUDRATES: &[u32] = &[
        1200, 2400, 4800, 9600, 14_400, 19_200, 38_400, 57_600, 115_200, 230_400,
    ];

    #[test]
    fn test_default_reload() {
        let settings = UartConfig::new().validate().unwrap();
        assert_eq!(settings.reload(), 184);
        assert_eq!(settings.reload(), 0xB8);
        assert_eq!(settings.actual_baudrate(), 9600);
        assert_eq!(settings.isp_command(), 0x3D);
        assert_eq!(Settings::default(), settings);
    }

    #[test]
    fn test_reload_formula_over_grid() {
        let mut checked = 0;
        for &clock in &[TimerClock::OneT, TimerClock::TwelveT] {
            for &osc in OSCILLATORS {
                for &baud in BAUDRATES {
                    let config = UartConfig::new()
                        .oscillator_hz(osc)
                        .baudrate(baud)
                        .clock(clock);
                    let divisor = osc / clock.divisor() / baud;

                    match config.validate() {
                        Ok(settings) => {
                            assert_eq!(settings.reload() as u32, 256 - divisor);
                            assert!(settings.reload() >= 1);
                            checked += 1;
                        }
                        Err(e) => {
                            assert_eq!(e, ConfigError::ReloadOutOfRange { divisor });
                            assert!(divisor == 0 || divisor > 255);
                        }
                    }
                }
            }
        }
        assert!(checked > 100);
    }

    #[test]
    fn test_twelve_t_reload() {
        let settings = UartConfig::new()
            .clock(TimerClock::TwelveT)
            .validate()
            .unwrap();
        assert_eq!(settings.reload(), 250);
    }

    #[test]
    fn test_invalid_pairs() {
        assert_eq!(
            UartConfig::new().baudrate(0).validate(),
            Err(ConfigError::ZeroBaudrate)
        );
        // 1.8432 MHz 12T 无法产生 115200
        assert_eq!(
            UartConfig::new()
                .oscillator_hz(1_843_200)
                .clock(TimerClock::TwelveT)
                .baudrate(115_200)
                .validate(),
            Err(ConfigError::ReloadOutOfRange { divisor: 0 })
        );
        // 48 MHz 1T 下 9600 需要 312 分频，超出 8 位
        assert_eq!(
            UartConfig::new()
                .oscillator_hz(48_000_000)
                .validate(),
            Err(ConfigError::ReloadOutOfRange { divisor: 312 })
        );
    }

    #[test]
    fn test_settings_in_const_context() {
        const FAST: Settings = UartConfig::new().baudrate(115_200).settings();
        assert_eq!(FAST.reload(), 250);
        assert_eq!(FAST.config().baudrate, 115_200);
    }

    #[test]
    #[should_panic]
    fn test_settings_panics_at_runtime_when_invalid() {
        let _ = UartConfig::new().baudrate(0).settings();
    }
}
