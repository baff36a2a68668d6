// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket brokering for the ECPDS master.
//!
//! The master never moves bytes itself. It resolves a logical path, registers
//! a ticket, hands the client a [`ProxySocket`] and later waits for the party
//! doing the I/O to report completion through the [`TicketRepository`].

pub mod proxy_socket;
pub mod repository;
pub mod ticket;

pub use proxy_socket::ProxySocket;
pub use repository::{CheckedTicket, TicketRepository, TicketSettings};
pub use ticket::{Completion, Ticket, TicketDescriptor, TicketTarget};
