//! # Rust peripheral access crate for the ATmega2560
//!
//! This crate covers the register blocks needed by the timer/counter HAL: the 8-bit
//! timer/counters TC0 and TC2, the 16-bit timer/counters TC1, TC3, TC4 and TC5, the shared
//! interrupt mask and flag registers, the general timer/counter control register and the
//! USART blocks used for the serial console.
//!
//! All addresses are data-space addresses, which is what `LDS`/`STS` use. Accesses to the
//! 16-bit registers go through the shared `TEMP` register in hardware, so they must not be
//! interrupted by code touching another 16-bit register of the same unit.
#![no_std]

pub mod gtccr;
pub mod tc;
pub mod tc16;
pub mod tc8;
pub mod usart;
