//! `:` commands and their autocomplete.

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "stock",
    aliases: &["s", "st"],
    description: "Current stock",
  },
  Command {
    name: "orders",
    aliases: &["o", "bc", "bons"],
    description: "Bons de commande",
  },
  Command {
    name: "history",
    aliases: &["h", "hist"],
    description: "Recent activity",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit abattoir-dash",
  },
];

/// How well `input` matches `cmd`; lower is better.
fn rank(cmd: &Command, input: &str) -> Option<u8> {
  let alias = |pred: &dyn Fn(&str) -> bool| cmd.aliases.iter().any(|a| pred(a));
  if cmd.name == input {
    Some(0)
  } else if alias(&|a| a == input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if alias(&|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if alias(&|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

/// Commands matching `input`, best first. Empty input lists everything.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&'static Command, u8)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &input).map(|r| (cmd, r)))
    .collect();
  matches.sort_by_key(|(_, r)| *r);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}
