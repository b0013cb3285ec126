//! 发送完成等待策略
//!
//! `send_byte` 写入 SBUF 后需要等待 TI 置位。等待方式从驱动中分离出来，
//! 默认 [`Spin`] 无限忙等，[`Bounded`] 在有限次轮询后返回超时。

use core::convert::Infallible;

use crate::TransferError;

pub trait TxWait {
    type Error;

    /// 反复调用 `ready` 直到返回 `true`
    fn wait_until<F: FnMut() -> bool>(&mut self, ready: F) -> Result<(), Self::Error>;
}

/// 无限忙等，硬件不置位 TI 时永不返回
#[derive(Debug, Default, Clone, Copy)]
pub struct Spin;

impl TxWait for Spin {
    type Error = Infallible;

    fn wait_until<F: FnMut() -> bool>(&mut self, mut ready: F) -> Result<(), Infallible> {
        while !ready() {
            core::hint::spin_loop();
        }
        Ok(())
    }
}

/// 最多轮询 `polls` 次
#[derive(Debug, Clone, Copy)]
pub struct Bounded {
    polls: u32,
}

impl Bounded {
    pub const fn new(polls: u32) -> Self {
        Self {
            polls: if polls == 0 { 1 } else { polls },
        }
    }

    pub const fn polls(&self) -> u32 {
        self.polls
    }
}

impl TxWait for Bounded {
    type Error = TransferError;

    fn wait_until<F: FnMut() -> bool>(&mut self, mut ready: F) -> Result<(), TransferError> {
        for _ in 0..self.polls {
            if ready() {
                return Ok(());
            }
            core::hint::spin_loop();
        }

        Err(TransferError::Timeout { polls: self.polls })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spin_returns_once_ready() {
        let mut calls = 0;
        let result = Spin.wait_until(|| {
            calls += 1;
            calls == 5
        });
        assert_eq!(result, Ok(()));
        assert_eq!(calls, 5);
    }

    #[test]
    fn test_bounded_success_within_limit() {
        let mut calls = 0;
        let result = Bounded::new(10).wait_until(|| {
            calls += 1;
            calls == 10
        });
        assert_eq!(result, Ok(()));
        assert_eq!(calls, 10);
    }

    #[test]
    fn test_bounded_timeout() {
        let mut calls = 0;
        let result = Bounded::new(3).wait_until(|| {
            calls += 1;
            false
        });
        assert_eq!(result, Err(TransferError::Timeout { polls: 3 }));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_bounded_zero_polls_checks_once() {
        let wait = Bounded::new(0);
        assert_eq!(wait.polls(), 1);

        let mut wait = wait;
        assert_eq!(wait.wait_until(|| true), Ok(()));
    }
}
