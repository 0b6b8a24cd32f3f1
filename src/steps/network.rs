use std::process::{Command, Stdio};

use tracing::{debug, error, info, warn};

use crate::{
    cmd::{CommandSpec, Gateway, Runner},
    error::InstallerError,
    prompt::Prompter,
    ui,
};

pub const PRIMARY_TARGET: &str = "archlinux.org";
pub const SECONDARY_TARGET: &str = "1.1.1.1";
/// Per-probe timeout, in seconds.
pub const PROBE_TIMEOUT: &str = "2";

// ── Probing ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    Unreachable,
    /// The probe itself could not run.
    ToolError(String),
}

pub trait Probe {
    fn probe(&mut self, target: &str) -> ProbeOutcome;
}

/// One ICMP echo via `ping`.
#[derive(Debug, Default)]
pub struct PingProbe;

impl Probe for PingProbe {
    fn probe(&mut self, target: &str) -> ProbeOutcome {
        let status = Command::new("ping")
            .args(["-c", "1", "-W", PROBE_TIMEOUT, target])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(s) => match s.code() {
                Some(0) => ProbeOutcome::Reachable,
                // 1: no reply, 2: name resolution or send failure.
                Some(1) | Some(2) => ProbeOutcome::Unreachable,
                Some(code) => ProbeOutcome::ToolError(format!("ping exited with code {}", code)),
                None => ProbeOutcome::ToolError("ping was killed by a signal".to_string()),
            },
            Err(e) => ProbeOutcome::ToolError(format!("could not run ping: {}", e)),
        }
    }
}

// ── State machine ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    ProbingPrimary,
    ProbingSecondary,
    AwaitingManualFix,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeEvent {
    Reachable,
    Unreachable,
    FixConfirmed,
}

pub const TRANSITIONS: &[(ProbeState, ProbeEvent, ProbeState)] = &[
    (ProbeState::ProbingPrimary, ProbeEvent::Reachable, ProbeState::Ready),
    (ProbeState::ProbingPrimary, ProbeEvent::Unreachable, ProbeState::ProbingSecondary),
    (ProbeState::ProbingSecondary, ProbeEvent::Reachable, ProbeState::Ready),
    (ProbeState::ProbingSecondary, ProbeEvent::Unreachable, ProbeState::AwaitingManualFix),
    (ProbeState::AwaitingManualFix, ProbeEvent::FixConfirmed, ProbeState::ProbingPrimary),
];

pub fn next_state(state: ProbeState, event: ProbeEvent) -> Option<ProbeState> {
    TRANSITIONS
        .iter()
        .find(|(from, on, _)| *from == state && *on == event)
        .map(|(_, _, to)| *to)
}

/// Blocks until the network answers.
///
/// Retries forever: between rounds the operator is sent to `nmtui` and asked
/// to confirm. A probe that cannot even run is fatal.
pub fn wait_for_network<R: Runner>(
    probe: &mut dyn Probe,
    gateway: &mut Gateway<R>,
    prompter: &mut dyn Prompter,
) -> Result<(), InstallerError> {
    let mut state = ProbeState::ProbingPrimary;

    loop {
        let event = match state {
            ProbeState::Ready => {
                info!(target: "network", "Network is ready");
                return Ok(());
            }
            ProbeState::ProbingPrimary => probe_event(probe, PRIMARY_TARGET)?,
            ProbeState::ProbingSecondary => {
                ui::print_info("Trying direct IP…");
                probe_event(probe, SECONDARY_TARGET)?
            }
            ProbeState::AwaitingManualFix => {
                remediate(gateway, prompter)?;
                ProbeEvent::FixConfirmed
            }
        };

        let next = next_state(state, event).ok_or_else(|| {
            InstallerError::ProbeTool(format!("no transition from {:?} on {:?}", state, event))
        })?;
        debug!(target: "network", "{:?} --{:?}--> {:?}", state, event, next);
        state = next;
    }
}

fn probe_event(probe: &mut dyn Probe, target: &str) -> Result<ProbeEvent, InstallerError> {
    let pb = ui::spinner(format!("Checking connection to {}…", target));
    let outcome = probe.probe(target);
    pb.finish_and_clear();

    match outcome {
        ProbeOutcome::Reachable => {
            ui::print_success(&format!("{} is reachable.", target));
            Ok(ProbeEvent::Reachable)
        }
        ProbeOutcome::Unreachable => {
            warn!(target: "network", "Networking has failed ({})", target);
            ui::print_warning(&format!("{} is unreachable.", target));
            Ok(ProbeEvent::Unreachable)
        }
        ProbeOutcome::ToolError(msg) => {
            error!(target: "network", "Probe of {} could not run: {}", target, msg);
            Err(InstallerError::ProbeTool(msg))
        }
    }
}

fn remediate<R: Runner>(
    gateway: &mut Gateway<R>,
    prompter: &mut dyn Prompter,
) -> Result<(), InstallerError> {
    ui::print_info("nmtui will open. Add or activate a connection, then quit it.");
    gateway.execute(&CommandSpec::host("Open network configuration", ["nmtui"]))?;
    prompter.pause("Press Enter once you are done setting up the network")
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;

    use super::*;
    use crate::{
        cmd::{ExecMode, Rooting},
        testing::{RecordingRunner, Reply, ScriptedPrompter},
    };

    struct ScriptedProbe {
        outcomes: VecDeque<ProbeOutcome>,
        targets: Vec<String>,
    }

    impl ScriptedProbe {
        fn new(outcomes: impl IntoIterator<Item = ProbeOutcome>) -> Self {
            Self {
                outcomes: outcomes.into_iter().collect(),
                targets: Vec::new(),
            }
        }
    }

    impl Probe for ScriptedProbe {
        fn probe(&mut self, target: &str) -> ProbeOutcome {
            self.targets.push(target.to_string());
            self.outcomes
                .pop_front()
                .unwrap_or_else(|| ProbeOutcome::ToolError("script exhausted".into()))
        }
    }

    fn gateway() -> Gateway<RecordingRunner> {
        Gateway::new(
            ExecMode::Execute,
            Rooting::Outside {
                target: PathBuf::from("/target"),
            },
            RecordingRunner::default(),
        )
    }

    #[test]
    fn table_covers_the_documented_cycle() {
        use ProbeEvent::*;
        use ProbeState::*;
        assert_eq!(next_state(ProbingPrimary, Reachable), Some(Ready));
        assert_eq!(next_state(ProbingPrimary, Unreachable), Some(ProbingSecondary));
        assert_eq!(next_state(ProbingSecondary, Unreachable), Some(AwaitingManualFix));
        assert_eq!(next_state(AwaitingManualFix, FixConfirmed), Some(ProbingPrimary));
        assert_eq!(next_state(Ready, Reachable), None);
    }

    #[test]
    fn primary_success_is_enough() {
        let mut probe = ScriptedProbe::new([ProbeOutcome::Reachable]);
        let mut gw = gateway();
        let mut prompter = ScriptedPrompter::default();

        wait_for_network(&mut probe, &mut gw, &mut prompter).unwrap();
        assert_eq!(probe.targets, [PRIMARY_TARGET]);
        assert!(gw.runner().commands.is_empty());
    }

    #[test]
    fn falls_back_to_secondary() {
        let mut probe = ScriptedProbe::new([ProbeOutcome::Unreachable, ProbeOutcome::Reachable]);
        let mut gw = gateway();
        let mut prompter = ScriptedPrompter::default();

        wait_for_network(&mut probe, &mut gw, &mut prompter).unwrap();
        assert_eq!(probe.targets, [PRIMARY_TARGET, SECONDARY_TARGET]);
    }

    #[test]
    fn operator_fix_loops_back_to_primary() {
        let mut probe = ScriptedProbe::new([
            ProbeOutcome::Unreachable,
            ProbeOutcome::Unreachable,
            ProbeOutcome::Unreachable,
            ProbeOutcome::Unreachable,
            ProbeOutcome::Reachable,
        ]);
        let mut gw = gateway();
        let mut prompter = ScriptedPrompter::new([Reply::text(""), Reply::text("")]);

        wait_for_network(&mut probe, &mut gw, &mut prompter).unwrap();
        assert_eq!(
            probe.targets,
            [
                PRIMARY_TARGET,
                SECONDARY_TARGET,
                PRIMARY_TARGET,
                SECONDARY_TARGET,
                PRIMARY_TARGET
            ]
        );
        assert_eq!(gw.runner().commands, [["nmtui"], ["nmtui"]]);
        assert_eq!(prompter.remaining(), 0);
    }

    #[test]
    fn tool_error_is_fatal() {
        let mut probe = ScriptedProbe::new([
            ProbeOutcome::Unreachable,
            ProbeOutcome::ToolError("ping: not found".into()),
        ]);
        let mut gw = gateway();
        let mut prompter = ScriptedPrompter::default();

        let err = wait_for_network(&mut probe, &mut gw, &mut prompter).unwrap_err();
        assert!(matches!(err, InstallerError::ProbeTool(_)));
        assert!(gw.runner().commands.is_empty());
    }
}
