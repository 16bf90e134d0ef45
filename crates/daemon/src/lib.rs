// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fuel daemon library.
//!
//! Exposes the IPC protocol, pidfile lifecycle, listener, and the shared
//! `host` entrypoint that both the `fueld` binary and `fuel-cli`'s
//! `consume` subcommand drive.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod host;
pub mod lifecycle;
pub mod listener;
pub mod protocol;
pub mod protocol_wire;
pub mod review_support;

pub use host::{HostConfig, HostError};
pub use lifecycle::{Config as LifecycleConfig, LifecycleError, PidfileBody, StartupResult};
pub use protocol::{Request, Response};
pub use protocol_wire::{
    decode, encode, read_message, read_request, write_message, write_response, ProtocolError,
    DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};
