//! Parsing of interactive `play` commands.

use std::str::FromStr;

/// A line typed at the `play` prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Pick an ingredient by id or variable name.
    Ingredient(String),
    /// Select a tool by id or function name.
    Tool(String),
    /// Place the picked ingredient into a slot (0-based).
    Place(usize),
    /// Clear one slot (0-based), or every slot.
    Clear(Option<usize>),
    /// Run the selected tool.
    Run,
    /// Ask the chef for a hint.
    Hint,
    /// Show the current order and workstation.
    Status,
    /// List ingredients.
    Pantry,
    /// List tools.
    Tools,
    /// Show the command reference.
    Help,
    /// Leave the game.
    Quit,
}

/// Why a line could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandParseError {
    /// Nothing was typed.
    #[error("empty command")]
    Empty,

    /// The first word is not a command.
    #[error("unknown command '{0}' (type 'help' for a list)")]
    Unknown(String),

    /// A required argument is missing.
    #[error("'{command}' needs {what}")]
    MissingArgument {
        /// The command word.
        command: String,
        /// Description of the missing argument.
        what: &'static str,
    },

    /// A slot number is not a positive integer.
    #[error("'{0}' is not a slot number (slots start at 1)")]
    BadSlot(String),
}

/// Help text printed by the `help` command.
pub const HELP: &str = "\
Commands:
  pantry                 list ingredients
  tools                  list tools
  tool <name>            select a tool (e.g. 'tool add')
  take <name>            pick an ingredient (e.g. 'take price_a')
  place <slot>           put the picked ingredient into argument <slot> (1-based)
  clear [slot]           clear one argument, or all of them
  run                    cook! run the tool and check the order
  hint                   ask the chef for advice
  status                 show the order and your workstation
  help                   show this list
  quit                   leave the kitchen";

fn parse_slot(raw: &str) -> Result<usize, CommandParseError> {
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(CommandParseError::BadSlot(raw.to_string())),
    }
}

impl FromStr for Command {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Err(CommandParseError::Empty);
        };
        let argument = words.next();
        let keyword = word.to_lowercase();

        let required = |what: &'static str| {
            argument.ok_or_else(|| CommandParseError::MissingArgument {
                command: keyword.clone(),
                what,
            })
        };

        match keyword.as_str() {
            "take" | "ingredient" | "i" => Ok(Self::Ingredient(required("an ingredient name")?.to_string())),
            "tool" | "t" => Ok(Self::Tool(required("a tool name")?.to_string())),
            "place" | "p" => Ok(Self::Place(parse_slot(required("a slot number")?)?)),
            "clear" | "c" => argument.map(parse_slot).transpose().map(Self::Clear),
            "run" | "r" | "cook" => Ok(Self::Run),
            "hint" | "h" => Ok(Self::Hint),
            "status" | "s" => Ok(Self::Status),
            "pantry" => Ok(Self::Pantry),
            "tools" => Ok(Self::Tools),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            _ => Err(CommandParseError::Unknown(word.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "take price_a".parse::<Command>().unwrap(),
            Command::Ingredient("price_a".to_string())
        );
        assert_eq!(
            "TOOL add".parse::<Command>().unwrap(),
            Command::Tool("add".to_string())
        );
        assert_eq!("place 2".parse::<Command>().unwrap(), Command::Place(1));
        assert_eq!("clear".parse::<Command>().unwrap(), Command::Clear(None));
        assert_eq!("clear 1".parse::<Command>().unwrap(), Command::Clear(Some(0)));
        assert_eq!("  run  ".parse::<Command>().unwrap(), Command::Run);
        assert_eq!("q".parse::<Command>().unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Command>(), Err(CommandParseError::Empty));
        assert_eq!(
            "bake".parse::<Command>(),
            Err(CommandParseError::Unknown("bake".to_string()))
        );
        assert_eq!(
            "place 0".parse::<Command>(),
            Err(CommandParseError::BadSlot("0".to_string()))
        );
        assert!(matches!(
            "tool".parse::<Command>(),
            Err(CommandParseError::MissingArgument { what: "a tool name", .. })
        ));
    }
}
