//! Well-known lock keys, one per logical channel.
//!
//! The key values are shared with every other process (and language
//! runtime) that talks to the same chip, so they are fixed by the
//! vendor protocol rather than chosen here. Distinct keys mean
//! unrelated channels never contend with each other.

/// Base key for the chip's lock namespace.
pub const KEY_BASE: i32 = 20_486_832;

/// A well-known cross-process lock key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    SpiBus0,
    SpiBus1,
    Transaction,
    Reset,
    Wakeup,
    I2cBus,
    SdioBus,
}

impl LockKey {
    /// The System V IPC key for this lock.
    pub fn key(self) -> i32 {
        match self {
            LockKey::SpiBus0 => KEY_BASE,
            LockKey::SpiBus1 => KEY_BASE + 129,
            LockKey::Transaction => KEY_BASE + 257,
            LockKey::Reset => KEY_BASE + 1236,
            LockKey::Wakeup => KEY_BASE + 1286,
            LockKey::I2cBus => KEY_BASE + 1352,
            LockKey::SdioBus => KEY_BASE + 1632,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LockKey::SpiBus0 => "spi0",
            LockKey::SpiBus1 => "spi1",
            LockKey::Transaction => "trans",
            LockKey::Reset => "reset",
            LockKey::Wakeup => "wakeup",
            LockKey::I2cBus => "i2c",
            LockKey::SdioBus => "sdio",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_pairwise_distinct() {
        let all = [
            LockKey::SpiBus0,
            LockKey::SpiBus1,
            LockKey::Transaction,
            LockKey::Reset,
            LockKey::Wakeup,
            LockKey::I2cBus,
            LockKey::SdioBus,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.key(), b.key(), "{a:?} and {b:?} collide");
            }
        }
    }
}
