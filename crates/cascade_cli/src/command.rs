//! Line commands read from stdin

use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use cascade_core::{OrderSequence, StageId};
use cascade_dsp::ChainParams;

pub const HELP: &str = "\
commands:
  order <stage>...          set the whole chain, e.g. `order 4 3 2 1 0` or `order ladder phaser`
  move <from> <to>          drag the stage in slot <from> to slot <to>
  swap <a> <b>              swap two slots
  disable <stage>           take a stage out of the chain
  enable <stage> <slot>     put a stage into a slot
  reset                     default order
  set <param name> = <v>    set a parameter (choice params take a label or index)
  bypass on|off
  volume <0..2>
  show                      print order, meters and parameters
  help
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Order(OrderSequence),
    Move { from: usize, to: usize },
    Swap { a: usize, b: usize },
    Disable(StageId),
    Enable { stage: StageId, slot: usize },
    Reset,
    Set { name: String, value: String },
    Bypass(bool),
    Volume(f32),
    Show,
    Help,
    Quit,
}

impl FromStr for CliCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match word.to_ascii_lowercase().as_str() {
            "order" => CliCommand::Order(parse_order(&args)?),
            "move" => {
                let [from, to] = two_indices(&args, "move <from> <to>")?;
                CliCommand::Move { from, to }
            }
            "swap" => {
                let [a, b] = two_indices(&args, "swap <a> <b>")?;
                CliCommand::Swap { a, b }
            }
            "disable" => match args.as_slice() {
                [stage] => CliCommand::Disable(stage.parse()?),
                _ => bail!("usage: disable <stage>"),
            },
            "enable" => match args.as_slice() {
                [stage, slot] => CliCommand::Enable {
                    stage: stage.parse()?,
                    slot: parse_index(slot)?,
                },
                _ => bail!("usage: enable <stage> <slot>"),
            },
            "reset" => CliCommand::Reset,
            "set" => {
                let (name, value) = rest
                    .split_once('=')
                    .ok_or_else(|| anyhow!("usage: set <param name> = <value>"))?;
                let (name, value) = (name.trim(), value.trim());
                if name.is_empty() || value.is_empty() {
                    bail!("usage: set <param name> = <value>");
                }
                CliCommand::Set {
                    name: name.to_string(),
                    value: value.to_string(),
                }
            }
            "bypass" => match args.as_slice() {
                [state] if state.eq_ignore_ascii_case("on") => CliCommand::Bypass(true),
                [state] if state.eq_ignore_ascii_case("off") => CliCommand::Bypass(false),
                _ => bail!("usage: bypass on|off"),
            },
            "volume" => match args.as_slice() {
                [v] => CliCommand::Volume(
                    v.parse()
                        .with_context(|| format!("invalid volume '{}'", v))?,
                ),
                _ => bail!("usage: volume <0..2>"),
            },
            "show" => CliCommand::Show,
            "help" | "?" => CliCommand::Help,
            "quit" | "exit" | "q" => CliCommand::Quit,
            other => bail!("unknown command '{}' (try `help`)", other),
        };
        Ok(command)
    }
}

/// Stage names or indices, first slot first; missing slots stay empty
pub fn parse_order(args: &[&str]) -> anyhow::Result<OrderSequence> {
    if args.is_empty() {
        bail!("usage: order <stage>...");
    }
    let stages = args
        .iter()
        .map(|arg| arg.parse::<StageId>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(OrderSequence::from_stages(&stages)?)
}

fn parse_index(arg: &str) -> anyhow::Result<usize> {
    arg.parse()
        .with_context(|| format!("invalid slot '{}'", arg))
}

fn two_indices(args: &[&str], usage: &str) -> anyhow::Result<[usize; 2]> {
    match args {
        [a, b] => Ok([parse_index(a)?, parse_index(b)?]),
        _ => bail!("usage: {}", usage),
    }
}

/// Apply `set <name> = <value>` to the parameter store
///
/// Float parameters take a number. Choice parameters take a label
/// ("HPF24", "notch") or an index.
pub fn apply_set(params: &ChainParams, name: &str, value: &str) -> anyhow::Result<()> {
    if let Ok(number) = value.parse::<f32>() {
        params.set_by_name(name, number)?;
        return Ok(());
    }

    let labels = if params.ladder.mode.name().eq_ignore_ascii_case(name) {
        params.ladder.mode.labels()
    } else if params.general_filter.mode.name().eq_ignore_ascii_case(name) {
        params.general_filter.mode.labels()
    } else if params.float_param(name).is_some() {
        bail!("'{}' needs a number, got '{}'", name, value);
    } else {
        bail!("unknown parameter '{}'", name);
    };

    let index = labels
        .iter()
        .position(|label| label.eq_ignore_ascii_case(value))
        .ok_or_else(|| anyhow!("'{}' is not one of {}", value, labels.join(", ")))?;
    params.set_choice_index(name, index)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> CliCommand {
        line.parse().unwrap()
    }

    #[test]
    fn test_order_by_index_and_name() {
        assert_eq!(
            parse("order 4 3 2 1 0"),
            CliCommand::Order(OrderSequence::default().reversed())
        );
        assert_eq!(
            parse("order ladder phaser"),
            CliCommand::Order(
                OrderSequence::from_stages(&[StageId::LadderFilter, StageId::Phaser]).unwrap()
            )
        );
    }

    #[test]
    fn test_order_rejects_duplicates_and_junk() {
        assert!("order 1 1".parse::<CliCommand>().is_err());
        assert!("order 0 1 2 3 4 0".parse::<CliCommand>().is_err());
        assert!("order wah".parse::<CliCommand>().is_err());
        assert!("order".parse::<CliCommand>().is_err());
    }

    #[test]
    fn test_parse_order_shared_with_command() {
        let order = parse_order(&["overdrive", "0"]).unwrap();
        assert_eq!(
            order,
            OrderSequence::from_stages(&[StageId::Overdrive, StageId::Phaser]).unwrap()
        );
        assert_eq!(parse("order overdrive 0"), CliCommand::Order(order));

        assert!(parse_order(&[]).is_err());
        assert!(parse_order(&["chorus", "chorus"]).is_err());
    }

    #[test]
    fn test_slot_commands() {
        assert_eq!(parse("move 0 4"), CliCommand::Move { from: 0, to: 4 });
        assert_eq!(parse("  SWAP 1   2 "), CliCommand::Swap { a: 1, b: 2 });
        assert_eq!(parse("disable chorus"), CliCommand::Disable(StageId::Chorus));
        assert_eq!(
            parse("enable general_filter 0"),
            CliCommand::Enable {
                stage: StageId::GeneralFilter,
                slot: 0
            }
        );
        assert!("move 1".parse::<CliCommand>().is_err());
        assert!("swap a b".parse::<CliCommand>().is_err());
        assert!("enable chorus".parse::<CliCommand>().is_err());
    }

    #[test]
    fn test_set_keeps_spaces_in_name() {
        assert_eq!(
            parse("set Phaser Center FreqHz = 440"),
            CliCommand::Set {
                name: "Phaser Center FreqHz".to_string(),
                value: "440".to_string()
            }
        );
        assert!("set Phaser RateHz".parse::<CliCommand>().is_err());
        assert!("set = 3".parse::<CliCommand>().is_err());
    }

    #[test]
    fn test_toggles_and_misc() {
        assert_eq!(parse("bypass on"), CliCommand::Bypass(true));
        assert_eq!(parse("bypass OFF"), CliCommand::Bypass(false));
        assert!("bypass maybe".parse::<CliCommand>().is_err());
        assert_eq!(parse("volume 0.5"), CliCommand::Volume(0.5));
        assert!("volume loud".parse::<CliCommand>().is_err());
        assert_eq!(parse("show"), CliCommand::Show);
        assert_eq!(parse("reset"), CliCommand::Reset);
        assert_eq!(parse("help"), CliCommand::Help);
        assert_eq!(parse("quit"), CliCommand::Quit);
        assert!("dance".parse::<CliCommand>().is_err());
    }

    #[test]
    fn test_apply_set_float() {
        let params = ChainParams::new();
        apply_set(&params, "phaser rateHz", "1.5").unwrap();
        assert_eq!(params.phaser.rate_hz.get(), 1.5);

        // Clamped to range
        apply_set(&params, "Overdrive Saturation", "1000").unwrap();
        assert_eq!(params.overdrive.saturation.get(), 100.0);
    }

    #[test]
    fn test_apply_set_choice_by_label_or_index() {
        let params = ChainParams::new();
        apply_set(&params, "Ladder Filter Mode", "hpf24").unwrap();
        assert_eq!(params.choice_index("Ladder Filter Mode"), Some(4));

        apply_set(&params, "General Filter Mode", "2").unwrap();
        assert_eq!(params.choice_index("General Filter Mode"), Some(2));

        assert!(apply_set(&params, "General Filter Mode", "shelf").is_err());
        assert!(apply_set(&params, "General Filter Mode", "9").is_err());
    }

    #[test]
    fn test_apply_set_errors() {
        let params = ChainParams::new();
        assert!(apply_set(&params, "Flanger Rate", "1").is_err());
        assert!(apply_set(&params, "Chorus Mix %", "lots").is_err());
    }
}
