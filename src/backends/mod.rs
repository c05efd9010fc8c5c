// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for motion-sensing cameras
//!
//! # Architecture
//!
//! The backend layer abstracts hardware access, providing a consistent API
//! regardless of the underlying device:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                Display Layer                │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌─────────────┐    ┌──────────────────┐    │
//! │  │   Sensor    │    │  Tilt controller │    │
//! │  │   manager   │    │  (single owner)  │    │
//! │  └─────────────┘    └──────────────────┘    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`sensor`]: Device trait, virtual sensor, frame loop and tilt control

pub mod sensor;
