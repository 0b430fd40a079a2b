use pendulum_core::{ControlIntent, EditField, ParameterDefinition};
use std::path::PathBuf;

pub const HELP: &str = "\
commands:
  add <name> [min] [max] [freq]   add a parameter (defaults 0 1 1)
  remove <name>                   remove a parameter
  edit <name> <field> <value>     field: name | min | max | freq
  list                            show the parameter set
  start | stop                    control the animation loop
  load <path> | save <path>       settings file (json)
  help | quit";

#[derive(Debug, PartialEq)]
pub enum Command {
    Intent(ControlIntent),
    Help,
    Quit,
    Empty,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Command::Empty);
    };
    let rest: Vec<&str> = words.collect();

    let intent = match verb.to_ascii_lowercase().as_str() {
        "help" | "?" => return Ok(Command::Help),
        "quit" | "exit" => return Ok(Command::Quit),
        "start" => ControlIntent::Start,
        "stop" => ControlIntent::Stop,
        "list" | "ls" => ControlIntent::List,
        "add" => {
            let name = arg(&rest, 0, "name")?;
            let min = number_or(&rest, 1, "min", 0.0)?;
            let max = number_or(&rest, 2, "max", 1.0)?;
            let freq = number_or(&rest, 3, "freq", 1.0)?;
            ControlIntent::Add(ParameterDefinition::new(name, min, max, freq))
        }
        "remove" | "rm" => ControlIntent::Remove(arg(&rest, 0, "name")?.to_string()),
        "edit" => {
            let name = arg(&rest, 0, "name")?.to_string();
            let field = arg(&rest, 1, "field")?;
            let value = arg(&rest, 2, "value")?;
            let field = match field.to_ascii_lowercase().as_str() {
                "name" => EditField::Name(value.to_string()),
                "min" => EditField::Min(parse_number(value, "min")?),
                "max" => EditField::Max(parse_number(value, "max")?),
                "freq" | "frequency" => EditField::Frequency(parse_number(value, "freq")?),
                other => return Err(format!("unknown field {other:?} (name, min, max, freq)")),
            };
            ControlIntent::Edit { name, field }
        }
        "load" => ControlIntent::Load(path_arg(&rest)?),
        "save" => ControlIntent::Save(path_arg(&rest)?),
        other => return Err(format!("unknown command {other:?}, try `help`")),
    };
    Ok(Command::Intent(intent))
}

fn arg<'a>(rest: &[&'a str], idx: usize, what: &str) -> Result<&'a str, String> {
    rest.get(idx).copied().ok_or_else(|| format!("missing {what}"))
}

/// The rest of the line, so paths may contain spaces.
fn path_arg(rest: &[&str]) -> Result<PathBuf, String> {
    if rest.is_empty() {
        return Err("missing path".to_string());
    }
    Ok(PathBuf::from(rest.join(" ")))
}

fn number_or(rest: &[&str], idx: usize, what: &str, default: f64) -> Result<f64, String> {
    match rest.get(idx) {
        Some(raw) => parse_number(raw, what),
        None => Ok(default),
    }
}

fn parse_number(raw: &str, what: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .map_err(|_| format!("{what} is not a number: {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_with_defaults() {
        assert_eq!(
            parse_command("add Smile").unwrap(),
            Command::Intent(ControlIntent::Add(ParameterDefinition::new("Smile", 0.0, 1.0, 1.0)))
        );
        assert_eq!(
            parse_command("  add Brow -1 1 2.5 ").unwrap(),
            Command::Intent(ControlIntent::Add(ParameterDefinition::new("Brow", -1.0, 1.0, 2.5)))
        );
    }

    #[test]
    fn edit_fields() {
        assert_eq!(
            parse_command("edit Smile freq 3").unwrap(),
            Command::Intent(ControlIntent::Edit {
                name: "Smile".to_string(),
                field: EditField::Frequency(3.0),
            })
        );
        assert!(parse_command("edit Smile colour red").is_err());
        assert!(parse_command("edit Smile max lots").is_err());
    }

    #[test]
    fn misc_commands() {
        assert_eq!(parse_command("").unwrap(), Command::Empty);
        assert_eq!(parse_command("QUIT").unwrap(), Command::Quit);
        assert_eq!(
            parse_command("save out.json").unwrap(),
            Command::Intent(ControlIntent::Save(PathBuf::from("out.json")))
        );
        assert!(parse_command("load").is_err());
        assert_eq!(
            parse_command("save my settings.json").unwrap(),
            Command::Intent(ControlIntent::Save(PathBuf::from("my settings.json")))
        );
        assert!(parse_command("dance").is_err());
    }
}
