#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "image",
    action: "set_image",
}];

pub(crate) const OPTIONAL_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "export",
    action: "export",
}];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "clear_image",
        action: "clear_image",
    },
    CommandSpec {
        command: "history",
        action: "history",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub(crate) const COMPOSE_COMMAND: CommandSpec = CommandSpec {
    command: "compose",
    action: "compose",
};

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/image <path>",
    "/clear_image",
    "/detail",
    "/objects",
    "/ocr",
    "/rate",
    "/compose <text|table|list|json> <task>",
    "/history",
    "/export [path]",
    "/help",
    "/quit",
];
