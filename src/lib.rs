//! # Rig Communication Core
//!
//! This crate talks to the microcontroller of a parking-lot automation rig over
//! a serial line. The device streams telemetry lines such as
//! `temp: 26, humidity: 10` and accepts one-line commands such as
//! `BARRIER_OPEN`. The crate is synchronous and pull-based: a periodic driver
//! calls [`DeviceController::poll_once`] and [`DeviceController::write`], and
//! reads the cached readings back.
//!
//! ## Crate Structure
//!
//! - **`controller`**: `DeviceController`, the single owner of the connection,
//!   the telemetry cache and the last raw line.
//! - **`link`**: the serial transport traits (`SerialLink`, `PortOpener`), the
//!   `serialport` backend, connection lifecycle, line reader, command writer,
//!   and an in-memory mock transport.
//! - **`telemetry`**: `label: value` parsing and type coercion into
//!   `TelemetryValue`, plus `TelemetryCache`.
//! - **`ports`**: serial port enumeration.
//! - **`config`**: figment-based configuration (`config/rig.toml` + env).
//! - **`logging`**: tracing subscriber setup.
//! - **`credentials`**: flat-file user credential lookup used to gate access
//!   to the dashboard.
//! - **`error`**: the `LinkError` enum.
//! - **`validation`**: small validators shared by the configuration layer.

pub mod config;
pub mod controller;
pub mod credentials;
pub mod error;
pub mod link;
pub mod logging;
pub mod ports;
pub mod telemetry;
pub mod validation;

pub use controller::DeviceController;
pub use error::{LinkError, LinkResult};
pub use link::connection::ConnectionState;
pub use link::LinkSettings;
pub use telemetry::{TelemetryCache, TelemetryValue};
