//! SPICE deck rendering and batch output parsing.

use crate::adapter::{Measurement, Outcome};
use crate::error::SimError;
use crate::stimulus::{Probe, Stimulus};
use std::fmt::Write;

/// Measurement names written to the deck and looked up in the output.
pub const DELAY: &str = "delay";
/// Output transition measurement.
pub const TRANSITION: &str = "transition";
/// Sampled state voltage.
pub const STATE: &str = "state";

/// Simulator messages that indicate a convergence failure.
const NON_CONVERGENCE: &[&str] = &[
    "timestep too small",
    "singular matrix",
    "no convergence",
    "iteration limit reached",
    "gmin stepping failed",
];

/// Renders a self-contained batch deck for `stimulus`.
pub fn render(stimulus: &Stimulus) -> String {
    let mut deck = String::new();
    let vdd = stimulus.vdd();
    let vss = stimulus.vss();
    let volts = |high: bool| if high { vdd } else { vss };

    // writing to a String cannot fail
    let _ = writeln!(deck, "* cellchar: {}", stimulus.title);
    for model in &stimulus.circuit.models {
        let _ = writeln!(deck, ".include \"{}\"", model.display());
    }
    let _ = writeln!(deck, ".include \"{}\"", stimulus.circuit.netlist.display());
    let _ = writeln!(deck, ".temp {}", stimulus.temperature);
    deck.push('\n');

    for supply in &stimulus.supplies {
        let _ = writeln!(deck, "V{0} {0} 0 DC {1:e}", supply.node, supply.volts);
    }
    for source in &stimulus.sources {
        let _ = write!(deck, "V{0} {0} 0 PWL(", source.node);
        for (i, (time, high)) in source.breakpoints().into_iter().enumerate() {
            if i > 0 {
                deck.push(' ');
            }
            let _ = write!(deck, "{time:e} {:e}", volts(high));
        }
        deck.push_str(")\n");
    }
    for load in &stimulus.loads {
        let _ = writeln!(deck, "C{0} {0} 0 {1:e}", load.node, load.farads);
    }
    let _ = writeln!(
        deck,
        "Xdut {} {}",
        stimulus.circuit.pins.join(" "),
        stimulus.circuit.subcircuit
    );
    deck.push('\n');

    let mut pinned: Vec<(&str, bool)> = stimulus
        .initial
        .iter()
        .map(|(node, high)| (node.as_str(), *high))
        .collect();
    if stimulus.perturbed {
        pinned.extend(
            stimulus
                .sources
                .iter()
                .map(|s| (s.node.as_str(), s.initial_high)),
        );
    }
    if !pinned.is_empty() {
        deck.push_str(".ic");
        for (node, high) in pinned {
            let _ = write!(deck, " v({node})={:e}", volts(high));
        }
        deck.push('\n');
    }

    let step = stimulus.step.unwrap_or(stimulus.stop / 1000.0);
    let _ = writeln!(
        deck,
        ".tran {step:e} {:e}{}",
        stimulus.stop,
        if stimulus.perturbed { " uic" } else { "" }
    );

    match &stimulus.probe {
        Probe::Timing {
            trigger,
            target,
            after,
        } => {
            let edge = |rising: bool| if rising { "RISE" } else { "FALL" };
            let _ = writeln!(
                deck,
                ".measure tran {DELAY} TRIG v({}) VAL={:e} TD={after:e} {}=1 TARG v({}) VAL={:e} TD={after:e} {}=1",
                trigger.node,
                stimulus.level(stimulus.levels.delay(trigger.rising)),
                edge(trigger.rising),
                target.node,
                stimulus.level(stimulus.levels.delay(target.rising)),
                edge(target.rising),
            );
            let (from, to) = if target.rising {
                (stimulus.levels.slew_low, stimulus.levels.slew_high)
            } else {
                (stimulus.levels.slew_high, stimulus.levels.slew_low)
            };
            let _ = writeln!(
                deck,
                ".measure tran {TRANSITION} TRIG v({0}) VAL={1:e} TD={after:e} {3}=1 TARG v({0}) VAL={2:e} TD={after:e} {3}=1",
                target.node,
                stimulus.level(from),
                stimulus.level(to),
                edge(target.rising),
            );
        }
        Probe::StateCheck { node, at, .. } => {
            let _ = writeln!(deck, ".measure tran {STATE} FIND v({node}) AT={at:e}");
        }
    }
    deck.push_str(".end\n");
    deck
}

/// Extracts the value of measurement `name` from batch output.
///
/// Result lines look like `delay = 1.234e-10 targ= ... trig= ...`; a failed
/// measurement prints `failed` in place of the value. Non-finite values
/// count as missing.
pub fn measurement(output: &str, name: &str) -> Option<f64> {
    output.lines().find_map(|line| {
        let (key, rest) = line.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case(name) {
            return None;
        }
        let value: f64 = rest.split_whitespace().next()?.parse().ok()?;
        value.is_finite().then_some(value)
    })
}

/// Looks for a convergence complaint in simulator output.
pub fn non_convergence(output: &str) -> Option<&str> {
    output.lines().map(str::trim).find(|line| {
        let lower = line.to_ascii_lowercase();
        NON_CONVERGENCE.iter().any(|pattern| lower.contains(pattern))
    })
}

/// Reduces batch output to the outcome `stimulus` asked for.
pub fn outcome(stimulus: &Stimulus, output: &str) -> Result<Outcome, SimError> {
    let require = |name: &str| {
        measurement(output, name).ok_or_else(|| SimError::MissingMeasurement {
            name: name.to_string(),
        })
    };
    match &stimulus.probe {
        Probe::Timing { .. } => Ok(Outcome::Measured(Measurement {
            delay: require(DELAY)?,
            transition: require(TRANSITION)?.abs(),
        })),
        Probe::StateCheck { expected_high, .. } => {
            let volts = require(STATE)?;
            let high = volts > stimulus.level(0.5);
            Ok(Outcome::Registered(high == *expected_high))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stimulus::{Circuit, Crossing, Edge, Levels, Load, Source, Supply};
    use std::path::PathBuf;

    fn inverter(probe: Probe) -> Stimulus {
        Stimulus {
            title: "INV A rise -> Y fall".into(),
            circuit: Circuit {
                subcircuit: "INV".into(),
                netlist: PathBuf::from("/cells/inv.sp"),
                models: vec![PathBuf::from("/models/tt.lib")],
                pins: vec!["A".into(), "Y".into(), "VDD".into(), "VSS".into()],
            },
            supplies: vec![
                Supply {
                    node: "VDD".into(),
                    volts: 1.8,
                },
                Supply {
                    node: "VSS".into(),
                    volts: 0.0,
                },
            ],
            sources: vec![Source {
                node: "A".into(),
                initial_high: false,
                edges: vec![Edge {
                    start: 1e-9,
                    duration: 1e-10,
                    rising: true,
                }],
            }],
            loads: vec![Load {
                node: "Y".into(),
                farads: 1e-15,
            }],
            initial: vec![],
            levels: Levels {
                delay_rise: 0.5,
                delay_fall: 0.5,
                slew_low: 0.2,
                slew_high: 0.8,
            },
            probe,
            stop: 1e-8,
            step: None,
            temperature: 25.0,
            perturbed: false,
        }
    }

    fn timing() -> Probe {
        Probe::Timing {
            trigger: Crossing {
                node: "A".into(),
                rising: true,
            },
            target: Crossing {
                node: "Y".into(),
                rising: false,
            },
            after: 1e-9,
        }
    }

    #[test]
    fn deck_contains_circuit_and_measures() {
        let deck = render(&inverter(timing()));
        assert!(deck.starts_with("* cellchar: INV A rise -> Y fall\n"));
        assert!(deck.contains(".include \"/models/tt.lib\"\n.include \"/cells/inv.sp\""));
        assert!(deck.contains("VVDD VDD 0 DC 1.8e0"));
        assert!(deck.contains("VA A 0 PWL(0e0 0e0 1e-9 0e0"));
        assert!(deck.contains("CY Y 0 1e-15"));
        assert!(deck.contains("Xdut A Y VDD VSS INV"));
        assert!(deck.contains(".measure tran delay TRIG v(A) VAL=9e-1"));
        assert!(deck.contains("TARG v(Y) VAL=9e-1 TD=1e-9 FALL=1"));
        assert!(deck.contains(".measure tran transition TRIG v(Y)"));
        assert!(!deck.contains(".ic"));
        assert!(!deck.contains("uic"));
        assert!(deck.ends_with(".end\n"));
    }

    #[test]
    fn perturbed_deck_pins_driven_nodes() {
        let deck = render(&inverter(timing()).perturbed());
        assert!(deck.contains(".ic v(A)=0e0"));
        assert!(deck.contains(" uic\n"));
    }

    #[test]
    fn initial_state_is_pinned() {
        let mut stimulus = inverter(timing());
        stimulus.initial.push(("Q".into(), true));
        let deck = render(&stimulus);
        assert!(deck.contains(".ic v(Q)=1.8e0\n"));
    }

    #[test]
    fn parses_measurements() {
        let output = "\
Circuit: * cellchar
delay               =  4.210000e-11 targ=  1.092100e-09 trig=  1.050000e-09
transition          =  -3.300000e-11 targ=  1.1e-09 trig=  1.06e-09
";
        assert_eq!(measurement(output, "delay"), Some(4.21e-11));
        let stimulus = inverter(timing());
        let Outcome::Measured(m) = outcome(&stimulus, output).unwrap() else {
            panic!("expected a measurement");
        };
        assert_eq!(m.transition, 3.3e-11);
    }

    #[test]
    fn failed_measurement_is_missing() {
        let output = "delay = failed\ntransition = 1e-11\n";
        let err = outcome(&inverter(timing()), output).unwrap_err();
        assert!(matches!(err, SimError::MissingMeasurement { name } if name == "delay"));
    }

    #[test]
    fn non_finite_measurement_is_missing() {
        for value in ["nan", "inf", "-inf", "NaN"] {
            let output = format!("delay = {value}\ntransition = 1e-11\n");
            assert_eq!(measurement(&output, "delay"), None);
            let err = outcome(&inverter(timing()), &output).unwrap_err();
            assert!(matches!(err, SimError::MissingMeasurement { name } if name == "delay"));
        }
    }

    #[test]
    fn state_check_compares_to_mid_rail() {
        let probe = Probe::StateCheck {
            node: "Q".into(),
            expected_high: true,
            at: 5e-9,
        };
        let stimulus = inverter(probe);
        assert!(render(&stimulus).contains(".measure tran state FIND v(Q) AT=5e-9"));
        assert_eq!(
            outcome(&stimulus, "state = 1.79e0").unwrap(),
            Outcome::Registered(true)
        );
        assert_eq!(
            outcome(&stimulus, "state = 2.0e-3").unwrap(),
            Outcome::Registered(false)
        );
    }

    #[test]
    fn detects_non_convergence() {
        let output = "Warning: v(a) ...\nError: Timestep too small; time = 1e-9\n";
        assert_eq!(
            non_convergence(output),
            Some("Error: Timestep too small; time = 1e-9")
        );
        assert_eq!(non_convergence("all good"), None);
    }
}
