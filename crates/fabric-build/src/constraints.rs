//! Pin and timing constraint files.
//!
//! Vivado reads XDC, ISE reads UCF. Both are rendered from the claimed
//! signals of an elaborated design and its period constraints; only claimed
//! pins appear.

use fabric_core::{ElaboratedDesign, Signal};

/// Port name of bit `i` of a signal, as the top-level netlist exposes it.
fn port_name(signal: &Signal, i: usize) -> String {
    if signal.width() == 1 {
        signal.name.clone()
    } else {
        format!("{}[{i}]", signal.name)
    }
}

fn signals(design: &ElaboratedDesign) -> impl Iterator<Item = &Signal> {
    design.io.iter().flat_map(|b| b.signals.iter())
}

/// Render an XDC file. Board platform commands are appended verbatim.
pub fn render_xdc(design: &ElaboratedDesign, platform_commands: &[String]) -> String {
    let mut out = String::new();
    for signal in signals(design) {
        out.push_str(&format!("\n# {}\n", signal.name));
        for (i, pin) in signal.pins.iter().enumerate() {
            let mut props = format!("PACKAGE_PIN {pin} IOSTANDARD {}", signal.io_standard);
            for misc in &signal.misc {
                props.push(' ');
                props.push_str(&misc.replacen('=', " ", 1));
            }
            out.push_str(&format!(
                "set_property -dict {{{props}}} [get_ports {{{}}}]\n",
                port_name(signal, i)
            ));
        }
    }

    if !design.constraints.is_empty() {
        out.push_str("\n# Clock constraints\n");
        for c in &design.constraints {
            out.push_str(&format!(
                "create_clock -name {0} -period {1:.3} [get_ports {0}]\n",
                c.signal, c.period_ns
            ));
        }
    }

    if !platform_commands.is_empty() {
        out.push_str("\n# Platform commands\n");
        for cmd in platform_commands {
            out.push_str(cmd);
            out.push('\n');
        }
    }
    out
}

/// Render a UCF file.
pub fn render_ucf(design: &ElaboratedDesign, platform_commands: &[String]) -> String {
    let mut out = String::new();
    for signal in signals(design) {
        for (i, pin) in signal.pins.iter().enumerate() {
            let port = if signal.width() == 1 {
                signal.name.clone()
            } else {
                format!("{}({i})", signal.name)
            };
            let mut line = format!(
                "NET \"{port}\" LOC = {pin} | IOSTANDARD = {}",
                signal.io_standard
            );
            for misc in &signal.misc {
                line.push_str(" | ");
                line.push_str(misc);
            }
            out.push_str(&line);
            out.push_str(";\n");
        }
    }

    for c in &design.constraints {
        out.push_str(&format!(
            "\nNET \"{0}\" TNM_NET = \"PRD{0}\";\nTIMESPEC \"TS{0}\" = PERIOD \"PRD{0}\" {1:.3} ns HIGH 50%;\n",
            c.signal, c.period_ns
        ));
    }

    for cmd in platform_commands {
        out.push_str(cmd);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_boards::Board;
    use fabric_core::{elaborate, SocConfig};

    #[test]
    fn xdc_has_pins_and_clock() {
        let board = Board::alchitry_au();
        let design = elaborate(&board, &SocConfig::for_board(&board)).unwrap();
        let xdc = render_xdc(&design, &board.platform_commands);
        assert!(xdc.contains("set_property -dict {PACKAGE_PIN N14 IOSTANDARD LVCMOS33} [get_ports {clk1000}]"));
        assert!(xdc.contains("[get_ports {ddram0_dq[15]}]"));
        assert!(xdc.contains("SLEW FAST"));
        assert!(xdc.contains("create_clock -name clk1000 -period 10.000 [get_ports clk1000]"));
        assert!(xdc.contains("INTERNAL_VREF"));
    }

    #[test]
    fn ucf_for_spartan6() {
        let board = Board::mojo_v3();
        let design = elaborate(&board, &SocConfig::for_board(&board)).unwrap();
        let ucf = render_ucf(&design, &board.platform_commands);
        assert!(ucf.contains("TIMESPEC \"TSclk500\" = PERIOD \"PRDclk500\" 20.000 ns HIGH 50%;"));
        assert!(ucf.contains("NET \"serial0_tx\" LOC = "));
        assert!(ucf.contains("NET \"sdram0_dq(7)\""));
    }

    #[test]
    fn unclaimed_pins_left_out() {
        let board = Board::alchitry_au();
        let config = SocConfig::for_board(&board)
            .with_order(vec![fabric_core::Slot::Bridge]);
        let design = elaborate(&board, &config).unwrap();
        let xdc = render_xdc(&design, &[]);
        assert!(!xdc.contains("user_led"));
        assert!(!xdc.contains("ddram"));
    }
}
