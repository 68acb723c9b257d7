//! USART register module.
//!
//! Only the asynchronous USART mode is modelled. The baud rate register UBRRn is split into
//! its low and high byte because the high byte has to be written first.

pub const USART_0_BASE_ADDR: usize = 0xC0;
pub const USART_1_BASE_ADDR: usize = 0xC8;
pub const USART_2_BASE_ADDR: usize = 0xD0;
pub const USART_3_BASE_ADDR: usize = 0x130;

#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Asynchronous = 0b00,
    Synchronous = 0b01,
    Reserved = 0b10,
    MasterSpi = 0b11,
}

#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Debug, Default, PartialEq, Eq)]
pub enum Parity {
    #[default]
    Disabled = 0b00,
    Reserved = 0b01,
    Even = 0b10,
    Odd = 0b11,
}

/// Lower two bits of the character size. The third bit UCSZn2 lives in [ControlB].
#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Debug, Default, PartialEq, Eq)]
pub enum CharSize {
    FiveBits = 0b00,
    SixBits = 0b01,
    SevenBits = 0b10,
    #[default]
    EightBits = 0b11,
}

/// UCSRnA
#[bitbybit::bitfield(u8, default = 0x20, debug)]
pub struct StatusA {
    #[bit(7, r)]
    rx_complete: bool,
    /// Cleared by writing a one to it.
    #[bit(6, rw)]
    tx_complete: bool,
    #[bit(5, r)]
    data_register_empty: bool,
    #[bit(4, r)]
    frame_error: bool,
    #[bit(3, r)]
    data_overrun: bool,
    #[bit(2, r)]
    parity_error: bool,
    /// Double the transmission speed in asynchronous mode.
    #[bit(1, rw)]
    double_speed: bool,
    #[bit(0, rw)]
    multi_processor_mode: bool,
}

/// UCSRnB
#[bitbybit::bitfield(u8, default = 0x0, debug)]
pub struct ControlB {
    #[bit(7, rw)]
    rx_complete_irq: bool,
    #[bit(6, rw)]
    tx_complete_irq: bool,
    #[bit(5, rw)]
    data_register_empty_irq: bool,
    #[bit(4, rw)]
    rx_enable: bool,
    #[bit(3, rw)]
    tx_enable: bool,
    /// UCSZn2, selects 9-bit characters together with [CharSize::EightBits].
    #[bit(2, rw)]
    char_size_9: bool,
    #[bit(1, r)]
    rx_bit_8: bool,
    #[bit(0, rw)]
    tx_bit_8: bool,
}

/// UCSRnC
#[bitbybit::bitfield(u8, default = 0x06, debug)]
pub struct ControlC {
    #[bits(6..=7, rw)]
    mode: Mode,
    #[bits(4..=5, rw)]
    parity: Parity,
    /// Two stop bits if set.
    #[bit(3, rw)]
    two_stop_bits: bool,
    #[bits(1..=2, rw)]
    char_size: CharSize,
    #[bit(0, rw)]
    clock_polarity: bool,
}

/// USART register block.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Usart {
    status_a: StatusA,
    ctrl_b: ControlB,
    ctrl_c: ControlC,
    _reserved: u8,
    baud_low: u8,
    /// Only the lower four bits are used.
    baud_high: u8,
    /// Reading pops the receive buffer.
    #[mmio(Read, Write)]
    data: u8,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Usart>(), 7);

impl Usart {
    /// Create a new MMIO instance for USART0 at address [USART_0_BASE_ADDR].
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    #[inline]
    pub const unsafe fn new_mmio_fixed_0() -> MmioUsart<'static> {
        unsafe { Self::new_mmio_at(USART_0_BASE_ADDR) }
    }

    /// Create a new MMIO instance for USART1 at address [USART_1_BASE_ADDR].
    ///
    /// # Safety
    ///
    /// See [Self::new_mmio_fixed_0].
    #[inline]
    pub const unsafe fn new_mmio_fixed_1() -> MmioUsart<'static> {
        unsafe { Self::new_mmio_at(USART_1_BASE_ADDR) }
    }

    /// Create a new MMIO instance for USART2 at address [USART_2_BASE_ADDR].
    ///
    /// # Safety
    ///
    /// See [Self::new_mmio_fixed_0].
    #[inline]
    pub const unsafe fn new_mmio_fixed_2() -> MmioUsart<'static> {
        unsafe { Self::new_mmio_at(USART_2_BASE_ADDR) }
    }

    /// Create a new MMIO instance for USART3 at address [USART_3_BASE_ADDR].
    ///
    /// # Safety
    ///
    /// See [Self::new_mmio_fixed_0].
    #[inline]
    pub const unsafe fn new_mmio_fixed_3() -> MmioUsart<'static> {
        unsafe { Self::new_mmio_at(USART_3_BASE_ADDR) }
    }
}
