use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Attach(PathBuf),
    /// One-based position in the pending file list.
    Detach(usize),
    Export,
    Clear,
    /// One-based code block number; `None` copies the last block.
    Copy(Option<usize>),
    /// `None` lists the templates.
    Template(Option<String>),
    Help,
}

pub const HELP: &[(&str, &str)] = &[
    ("/attach <path>", "upload a file for the next message"),
    ("/detach <n>", "remove pending file n"),
    ("/export", "save the conversation as JSON"),
    ("/clear", "clear the conversation"),
    ("/copy [n]", "copy code block n (default: last)"),
    ("/template [name]", "list templates or apply one"),
    ("/help", "show this list"),
];

pub fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(raw)),
        None => PathBuf::from(raw),
    }
}

fn position(arg: &str, what: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("{} must be a positive number", what)),
    }
}

/// `None` when `input` is an ordinary message.
pub fn parse(input: &str) -> Option<Result<SlashCommand, String>> {
    let body = input.trim().strip_prefix('/')?;
    let (name, arg) = match body.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (body, ""),
    };

    let command = match name {
        "attach" if arg.is_empty() => Err("Usage: /attach <path>".to_string()),
        "attach" => Ok(SlashCommand::Attach(expand_home(arg.trim_matches('"')))),
        "detach" => position(arg, "File number").map(SlashCommand::Detach),
        "export" => Ok(SlashCommand::Export),
        "clear" => Ok(SlashCommand::Clear),
        "copy" if arg.is_empty() => Ok(SlashCommand::Copy(None)),
        "copy" => position(arg, "Block number").map(|n| SlashCommand::Copy(Some(n))),
        "template" if arg.is_empty() => Ok(SlashCommand::Template(None)),
        "template" => Ok(SlashCommand::Template(Some(arg.to_string()))),
        "help" | "?" => Ok(SlashCommand::Help),
        other => Err(format!("Unknown command /{}, try /help", other)),
    };
    Some(command)
}
