#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![no_std]

//! Wire-level helpers for the mplsfwd forwarder: the Ethernet header view and
//! the 32-bit MPLS shim header codec.

#[macro_use]
mod macros;

pub mod ether;
pub mod mpls;
