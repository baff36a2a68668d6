// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per group of tables.

pub mod audit;
pub mod destinations;
pub mod hosts;
pub mod transfers;
