/// A line typed into the interactive session.
///
/// Anything that does not start with `/` is a search query. Offer indices are
/// 1-based, matching the numbers printed next to each card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search(String),
    Cancel,
    Scope(Vec<String>),
    Compare(usize),
    Save(usize),
    Uncompare(usize),
    Unsave(usize),
    Compared,
    Saved,
    Recent,
    Forget(String),
    Help,
    Exit,
    Invalid(String),
}

impl Command {
    /// Returns `None` for blank input.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Self::Search(line.to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match name {
            "cancel" => Self::Cancel,
            "scope" => Self::Scope(
                arg.split(',')
                    .map(str::trim)
                    .filter(|source| !source.is_empty())
                    .map(ToString::to_string)
                    .collect(),
            ),
            "compare" => index_arg(arg, Self::Compare),
            "save" => index_arg(arg, Self::Save),
            "uncompare" => index_arg(arg, Self::Uncompare),
            "unsave" => index_arg(arg, Self::Unsave),
            "compared" => Self::Compared,
            "saved" => Self::Saved,
            "recent" => Self::Recent,
            "forget" if !arg.is_empty() => Self::Forget(arg.to_string()),
            "forget" => Self::Invalid("usage: /forget <search>".to_string()),
            "help" => Self::Help,
            "exit" | "quit" => Self::Exit,
            other => Self::Invalid(format!("unknown command: /{other}")),
        };
        Some(command)
    }
}

fn index_arg(arg: &str, build: fn(usize) -> Command) -> Command {
    match arg.parse::<usize>() {
        Ok(index) if index > 0 => build(index),
        _ => Command::Invalid(format!("expected a positive number, got {arg:?}")),
    }
}
