//! Protocol constants shared across the link stack.
//!
//! Sizes and timing budgets come from the chip vendor's protocol; the
//! SDIO transport carries a larger body than the byte-oriented buses.

use std::time::Duration;

/// Maximum frame body for SPI, I²C and socket channels.
pub const MAX_BODY_LEN: usize = 2040;
/// Maximum frame body for the high-throughput SDIO channel.
pub const MAX_SDIO_BODY_LEN: usize = 8184;

/// Maximum complete frame (header + body) for SPI/I²C/socket.
pub const MAX_MSG_LEN: usize = 2048;
/// Maximum complete frame for SDIO.
pub const MAX_SDIO_MSG_LEN: usize = 8192;

/// Maximum proxy envelope body. A Business envelope carries a complete
/// chip frame, so this equals [`MAX_MSG_LEN`].
pub const MAX_SRV_BODY_LEN: usize = 2048;

/// How long the proxy may take to service a reset request.
pub const PROXY_RESET_WAIT: Duration = Duration::from_millis(3000);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdio_budget_is_the_large_one() {
        assert!(MAX_SDIO_BODY_LEN > MAX_BODY_LEN);
        assert_eq!(MAX_MSG_LEN - MAX_BODY_LEN, 8);
        assert_eq!(MAX_SDIO_MSG_LEN - MAX_SDIO_BODY_LEN, 8);
    }
}
