#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Reset,
    Scenarios,
    /// One-based scenario index; `None` when missing or not a number.
    Run(Option<usize>),
    Health,
    Status,
    Log,
    Quit,
    Unknown(String),
}

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.split_whitespace();
    let command = parts.next().unwrap_or(trimmed).to_string();

    let parsed = match command.as_str() {
        "/help" => SlashCommand::Help,
        "/reset" => SlashCommand::Reset,
        "/scenarios" => SlashCommand::Scenarios,
        "/run" => SlashCommand::Run(
            parts
                .next()
                .and_then(|value| value.parse::<usize>().ok())
                .filter(|index| *index > 0),
        ),
        "/health" => SlashCommand::Health,
        "/status" => SlashCommand::Status,
        "/log" => SlashCommand::Log,
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command),
    };

    Some(parsed)
}
