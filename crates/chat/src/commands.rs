//! REPL command parsing

/// Reprinted under every answer
pub const COMMAND_BAR: &str = "Commands:  [exit] [quit] [history] [help] [query:<text>]";

/// Command names and what they do, in help order
pub const COMMANDS: &[(&str, &str)] = &[
    ("exit", "Quit the chatbot"),
    ("quit", "Quit the chatbot"),
    ("history", "Show recent conversation history"),
    ("help", "Show this list of commands"),
    ("query", "Run a document query (example: 'query: <your query>')"),
];

const QUERY_PREFIX: &str = "query:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Help,
    History,
    /// Run the document pipeline directly
    Query(String),
    /// Free text for the conversational path
    Message(String),
    Empty,
}

impl Command {
    /// Commands are matched case-insensitively on the trimmed line
    pub fn parse(line: &str) -> Self {
        let input = line.trim();
        let lowered = input.to_lowercase();

        match lowered.as_str() {
            "" => Command::Empty,
            "exit" | "quit" => Command::Exit,
            "help" => Command::Help,
            "history" => Command::History,
            _ => match strip_query_prefix(input) {
                Some(query) => Command::Query(query.trim().to_string()),
                None => Command::Message(input.to_string()),
            },
        }
    }
}

fn strip_query_prefix(input: &str) -> Option<&str> {
    let prefix = input.get(..QUERY_PREFIX.len())?;
    prefix
        .eq_ignore_ascii_case(QUERY_PREFIX)
        .then(|| &input[QUERY_PREFIX.len()..])
}

/// Help text listing every command
pub fn help_text() -> String {
    COMMANDS
        .iter()
        .map(|(name, description)| format!("  {} - {}", name, description))
        .collect::<Vec<_>>()
        .join("\n")
}
