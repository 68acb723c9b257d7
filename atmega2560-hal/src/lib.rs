//! # HAL for the timer/counters of the ATmega2560
//!
//! This crate is a **H**ardware **A**bstraction **L**ayer on top of the [atmega2560] peripheral
//! access crate. Its core is the [timer] module, which provides one driver per timer/counter
//! unit together with blocking and interrupt driven delays.
//!
//! Misuse of the timers is reported through the three-tier [diag] module. The reports are
//! emitted with the [log](https://docs.rs/log) facade, so [startup::init] should be called
//! first to bring up the serial console and the logger.
//!
//! The blocking delays implement [embedded_hal::delay::DelayNs], so the timers can be used as
//! delay providers for drivers of the embedded Rust ecosystem.
#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(test)]
extern crate std;

#[macro_use]
pub mod diag;

pub mod clocks;
pub mod log;
pub mod prelude;
pub mod startup;
pub mod time;
pub mod timer;
pub mod usart;

pub use atmega2560 as pac;
