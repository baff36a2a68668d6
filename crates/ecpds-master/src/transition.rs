// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Legal data transfer status transitions.

use strum::{Display, EnumString};

use ecpds_core::EcpdsError;
use ecpds_core::types::TransferStatus;

/// Who is asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TransitionKind {
    /// Movers and schedulers reporting forward progress.
    Progress,
    /// Administrators forcing a status.
    Override,
}

/// What applying an accepted transition involves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same status; nothing to write.
    Unchanged,
    Apply {
        /// A retrieval or dissemination may still be running and must be interrupted first.
        interrupt: bool,
        /// The transfer goes back to the queue after having left it.
        requeue: bool,
    },
}

fn progress_targets(from: TransferStatus) -> &'static [TransferStatus] {
    use ecpds_core::types::TransferStatus::*;
    match from {
        Init => &[Sche, Fetc, Wait, Hold],
        Sche => &[Fetc, Wait, Hold],
        Fetc => &[Wait, Hold, Fail, Intr],
        Wait => &[Exec, Hold, Sche],
        Exec => &[Done, Retr, Fail, Intr, Wait],
        Retr => &[Wait, Exec, Fail],
        Intr => &[Wait, Retr],
        Hold => &[Wait, Sche],
        Done | Stop | Fail => &[],
    }
}

const OVERRIDE_TARGETS: [TransferStatus; 3] = [
    TransferStatus::Wait,
    TransferStatus::Hold,
    TransferStatus::Stop,
];

/// Validate `from -> to` for `kind` without side effects.
pub fn check_transition(
    from: TransferStatus,
    to: TransferStatus,
    kind: TransitionKind,
) -> Result<Transition, EcpdsError> {
    if from == to {
        return Ok(Transition::Unchanged);
    }
    let allowed = match kind {
        TransitionKind::Progress => progress_targets(from).contains(&to),
        TransitionKind::Override => {
            OVERRIDE_TARGETS.contains(&to) || progress_targets(from).contains(&to)
        }
    };
    if !allowed {
        return Err(EcpdsError::InvalidTransition(format!(
            "{kind} transition {from} ({}) -> {to} ({}) not allowed",
            from.display_name(),
            to.display_name()
        )));
    }
    Ok(Transition::Apply {
        interrupt: kind == TransitionKind::Override && from.is_in_flight(),
        requeue: to == TransferStatus::Wait
            && matches!(
                from,
                TransferStatus::Done
                    | TransferStatus::Fail
                    | TransferStatus::Stop
                    | TransferStatus::Intr
                    | TransferStatus::Retr
            ),
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use ecpds_core::types::TransferStatus::*;

    #[test]
    fn forward_progress_is_accepted() {
        assert!(check_transition(Wait, Exec, TransitionKind::Progress).is_ok());
        assert!(check_transition(Exec, Done, TransitionKind::Progress).is_ok());
        assert!(check_transition(Fetc, Wait, TransitionKind::Progress).is_ok());
    }

    #[test]
    fn terminal_states_reject_progress() {
        for to in TransferStatus::ALL {
            if to == Done {
                continue;
            }
            assert!(matches!(
                check_transition(Done, to, TransitionKind::Progress),
                Err(EcpdsError::InvalidTransition(_))
            ));
        }
    }

    #[test]
    fn override_requeues_finished_transfers() {
        assert_eq!(
            check_transition(Done, Wait, TransitionKind::Override).unwrap(),
            Transition::Apply {
                interrupt: false,
                requeue: true
            }
        );
    }

    #[test]
    fn override_out_of_exec_interrupts() {
        assert_eq!(
            check_transition(Exec, Stop, TransitionKind::Override).unwrap(),
            Transition::Apply {
                interrupt: true,
                requeue: false
            }
        );
        // Progress out of EXEC is the mover itself reporting; nothing to interrupt.
        assert_eq!(
            check_transition(Exec, Done, TransitionKind::Progress).unwrap(),
            Transition::Apply {
                interrupt: false,
                requeue: false
            }
        );
    }

    #[test]
    fn override_cannot_force_completion() {
        assert!(check_transition(Wait, Done, TransitionKind::Override).is_err());
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!(
            "OVERRIDE".parse::<TransitionKind>().unwrap(),
            TransitionKind::Override
        );
    }

    proptest! {
        #[test]
        fn identity_is_always_a_noop(idx in 0usize..11, progress in any::<bool>()) {
            let status = TransferStatus::ALL[idx];
            let kind = if progress { TransitionKind::Progress } else { TransitionKind::Override };
            prop_assert_eq!(check_transition(status, status, kind).unwrap(), Transition::Unchanged);
        }

        #[test]
        fn override_accepts_everything_progress_accepts(from in 0usize..11, to in 0usize..11) {
            let (from, to) = (TransferStatus::ALL[from], TransferStatus::ALL[to]);
            if check_transition(from, to, TransitionKind::Progress).is_ok() {
                prop_assert!(check_transition(from, to, TransitionKind::Override).is_ok());
            }
        }

        #[test]
        fn administrators_can_always_stop(from in 0usize..11) {
            let from = TransferStatus::ALL[from];
            prop_assert!(check_transition(from, Stop, TransitionKind::Override).is_ok());
        }
    }
}
