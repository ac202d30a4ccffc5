//! Register Layout Constants
//!
//! Physical addresses and register word offsets for the supported SoC
//! families, plus crate-wide defaults.

use std::time::Duration;

/// Default privileged memory device
pub const DEFAULT_MEM_DEVICE: &str = "/dev/mem";

/// Size of one mapped register block
pub const BLOCK_SIZE: usize = 4 * 1024;

// --- BCM283x -------------------------------------------------------------

/// Peripheral base on BCM2835 (Raspberry Pi 1, Zero)
pub const BCM2835_PERI_BASE: u64 = 0x2000_0000;

/// Peripheral base on BCM2836 / BCM2837 (Raspberry Pi 2, 3)
pub const BCM2836_PERI_BASE: u64 = 0x3F00_0000;

/// Peripheral base on BCM2711 (Raspberry Pi 4), low-peripheral mode
pub const BCM2711_PERI_BASE: u64 = 0xFE00_0000;

/// Offset of the GPIO block from the peripheral base
pub const BCM_GPIO_OFFSET: u64 = 0x0020_0000;

/// Number of MCU pins on the BCM283x GPIO block
pub const BCM_PIN_COUNT: u32 = 54;

/// Function select registers GPFSEL0..GPFSEL5 (word offsets)
pub const BCM_GPFSEL0: usize = 0;

/// Output set register GPSET0 (word offset)
pub const BCM_GPSET0: usize = 7;

/// Output clear register GPCLR0 (word offset)
pub const BCM_GPCLR0: usize = 10;

/// Pin level register GPLEV0 (word offset)
pub const BCM_GPLEV0: usize = 13;

/// Pull-up/down enable register GPPUD (word offset)
pub const BCM_GPPUD: usize = 37;

/// Pull-up/down clock register GPPUDCLK0 (word offset)
pub const BCM_GPPUDCLK0: usize = 38;

/// Pull control registers GPIO_PUP_PDN_CNTRL_REG0..3 (BCM2711 only, word offset)
pub const BCM2711_PUP_PDN_CNTRL0: usize = 0xE4 / 4;

/// Setup and hold time around pull register updates
pub const PULL_SETTLE: Duration = Duration::from_micros(10);

// --- Allwinner H3 --------------------------------------------------------

/// PIO block for banks A..G
pub const H3_IO1_BASE: u64 = 0x01C2_0000;

/// R_PIO block for bank L
pub const H3_IO2_BASE: u64 = 0x01F0_2000;

/// Offset of the bank A registers inside the PIO page
pub const H3_PIO_OFFSET: usize = 0x800;

/// Offset of the bank L registers inside the R_PIO page
pub const H3_R_PIO_OFFSET: usize = 0xC00;

/// Distance between two bank register sets
pub const H3_BANK_STRIDE: usize = 0x24;

/// Word offsets inside one bank register set
pub const H3_CFG0: usize = 0;
pub const H3_DAT: usize = 4;
pub const H3_PUL0: usize = 7;

/// Pins per bank, bank B is not bonded out on the H3 and has no pins here
pub const H3_BANK_SIZES: [u32; 8] = [22, 0, 17, 18, 16, 7, 14, 12];

/// Function value that parks an H3 pin (I/O disabled)
pub const H3_FUNC_DISABLED: u32 = 7;

// --- Digital input -------------------------------------------------------

/// Default sampling interval of the input monitor
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Callback failures logged per window before throttling kicks in
pub const CALLBACK_ERROR_LOG_CAP: u32 = 5;

/// Throttle window for callback failure logging (milliseconds)
pub const CALLBACK_ERROR_LOG_WINDOW_MS: u64 = 1000;

/// Number of pins a `PinMask` can address
pub const PIN_MASK_CAPACITY: u32 = 128;
