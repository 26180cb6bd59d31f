pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
}

pub fn all_commands() -> &'static [CommandSpec] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static CommandSpec> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

/// Usage line printed when a verb is missing its argument.
pub fn usage_for(name: &str) -> String {
    match name {
        "call" => "Usage: call <tool_name> {\"optional\": \"json\"}".to_string(),
        "plan" => "Usage: plan <goal description>".to_string(),
        other => match find_command(other) {
            Some(command) => format!("Usage: {}", command.usage),
            None => format!("Usage: {other}"),
        },
    }
}

/// The reference printed by `help`, one aligned row per command.
pub fn help_text() -> String {
    let width = all_commands()
        .iter()
        .map(|command| command.usage.len())
        .max()
        .unwrap_or(0);
    let mut text = String::from("Commands:");
    for command in all_commands() {
        text.push_str(&format!(
            "\n  {:<width$}   {}",
            command.usage,
            command.help,
            width = width
        ));
    }
    text
}

const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "tools",
        usage: "tools",
        help: "Refresh and list advertised tools",
    },
    CommandSpec {
        name: "call",
        usage: "call <name> [json]",
        help: "Invoke a tool with optional JSON args",
    },
    CommandSpec {
        name: "chat",
        usage: "chat <message>",
        help: "Send a free-form prompt to Ollama",
    },
    CommandSpec {
        name: "plan",
        usage: "plan <goal>",
        help: "Ask Ollama to draft a plan using known tools",
    },
    CommandSpec {
        name: "status",
        usage: "status",
        help: "Hit the Metasploit MCP /healthz endpoint",
    },
    CommandSpec {
        name: "help",
        usage: "help",
        help: "Show this message",
    },
    CommandSpec {
        name: "exit",
        usage: "exit",
        help: "Close the client",
    },
];
